//! Books repository for PostgreSQL

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::{like_pattern, search_term, BookCounts, BooksRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookSummary, NewBook, UpdateBook},
        PageRequest,
    },
};

const DUPLICATE_ISBN: &str = "ISBN already exists";

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn search(&self, query: &BookQuery, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let pattern = search_term(&query.search).map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1)
              AND ($2::text IS NULL OR genre = $2)
            "#,
        )
        .bind(&pattern)
        .bind(query.genre)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1 OR isbn ILIKE $1)
              AND ($2::text IS NULL OR genre = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&pattern)
        .bind(query.genre)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn get_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<BookSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries = sqlx::query_as::<_, BookSummary>(
            "SELECT id, title, author, isbn FROM books WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn create(&self, book: NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, title, author, isbn, published_year, genre,
                total_copies, copies_available, description, added_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.published_year)
        .bind(book.genre)
        .bind(book.total_copies)
        .bind(book.copies_available)
        .bind(&book.description)
        .bind(book.added_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_write(e, DUPLICATE_ISBN))
    }

    async fn update(&self, id: Uuid, changes: &UpdateBook) -> AppResult<Book> {
        // Right-hand sides read the row as it was before the update, so the
        // on-loan count is preserved against concurrent borrows
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                published_year = COALESCE($5, published_year),
                genre = COALESCE($6, genre),
                description = CASE WHEN $7::text IS NULL THEN description ELSE NULLIF($7, '') END,
                copies_available = COALESCE($9, copies_available + (COALESCE($8, total_copies) - total_copies)),
                total_copies = COALESCE($8, total_copies)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.isbn)
        .bind(changes.published_year)
        .bind(changes.genre)
        .bind(&changes.description)
        .bind(changes.total_copies)
        .bind(changes.copies_available)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_write(e, DUPLICATE_ISBN))?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        Ok(())
    }

    async fn counts(&self) -> AppResult<BookCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_books,
                   COALESCE(SUM(total_copies), 0)::bigint AS total_copies,
                   COALESCE(SUM(copies_available), 0)::bigint AS available_copies
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(BookCounts {
            total_books: row.get("total_books"),
            total_copies: row.get("total_copies"),
            available_copies: row.get("available_copies"),
        })
    }
}
