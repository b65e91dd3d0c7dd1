//! Lending operations for PostgreSQL.
//!
//! Borrow and return run in one transaction covering the member's ledger and
//! the book's copy counter. The member row is locked first, so changes to one
//! member's ledger are serialized; the counter only moves through conditional
//! updates, so it cannot leave `[0, total_copies]` under concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{LoanCounts, LoansRepository};
use crate::{
    error::{AppError, AppResult},
    models::member::BorrowRecord,
};

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the member row and return its active flag
    async fn lock_member(tx: &mut Transaction<'_, Postgres>, member_id: Uuid) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT is_active FROM members WHERE id = $1 FOR UPDATE")
            .bind(member_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))
    }
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn borrow(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        borrowed_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let is_active = Self::lock_member(&mut tx, member_id).await?;

        let taken = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE books SET copies_available = copies_available - 1
            WHERE id = $1 AND copies_available > 0
            RETURNING id
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        if taken.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(book_id)
                .fetch_one(&mut *tx)
                .await?;

            return Err(if exists {
                AppError::Conflict("No copies available".to_string())
            } else {
                AppError::NotFound("Book not found".to_string())
            });
        }

        if !is_active {
            return Err(AppError::Conflict("Member is not active".to_string()));
        }

        let record = BorrowRecord::new(book_id, borrowed_date, due_date);
        sqlx::query(
            r#"
            INSERT INTO borrow_records (id, member_id, book_id, borrowed_date, due_date, returned)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(record.id)
        .bind(member_id)
        .bind(record.book_id)
        .bind(record.borrowed_date)
        .bind(record.due_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn return_record(
        &self,
        member_id: Uuid,
        record_id: Uuid,
        returned_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        Self::lock_member(&mut tx, member_id).await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT id, book_id, borrowed_date, due_date, returned, returned_date
            FROM borrow_records
            WHERE id = $1 AND member_id = $2
            "#,
        )
        .bind(record_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Borrow record not found".to_string()))?;

        if record.returned {
            return Err(AppError::Conflict("Book already returned".to_string()));
        }

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records SET returned = TRUE, returned_date = $2
            WHERE id = $1
            RETURNING id, book_id, borrowed_date, due_date, returned, returned_date
            "#,
        )
        .bind(record_id)
        .bind(returned_date)
        .fetch_one(&mut *tx)
        .await?;

        // No row when the book was deleted in the meantime
        sqlx::query(
            r#"
            UPDATE books SET copies_available = LEAST(copies_available + 1, total_copies)
            WHERE id = $1
            "#,
        )
        .bind(record.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn counts(&self, now: DateTime<Utc>) -> AppResult<LoanCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE NOT returned) AS active,
                   COUNT(*) FILTER (WHERE NOT returned AND due_date < $1) AS overdue
            FROM borrow_records
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(LoanCounts {
            active: row.get("active"),
            overdue: row.get("overdue"),
        })
    }
}
