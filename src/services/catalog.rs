//! Book catalog service

use uuid::Uuid;

use super::audit::AuditUsers;
use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, BookView, CreateBook, NewBook, UpdateBook},
        PageRequest, Principal,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Attach the accounts that added the books
    async fn views(&self, books: Vec<Book>) -> AppResult<Vec<BookView>> {
        let audit = AuditUsers::load(&self.repository, books.iter().map(|b| b.added_by)).await?;
        Ok(books
            .into_iter()
            .map(|book| BookView { added_by: audit.get(book.added_by), book })
            .collect())
    }

    async fn view(&self, book: Book) -> AppResult<BookView> {
        let audit = AuditUsers::load(&self.repository, [book.added_by]).await?;
        Ok(BookView { added_by: audit.get(book.added_by), book })
    }

    /// Search books with pagination
    pub async fn search_books(&self, query: &BookQuery, page: PageRequest) -> AppResult<(Vec<BookView>, i64)> {
        let (books, total) = self.repository.books.search(query, page).await?;
        Ok((self.views(books).await?, total))
    }

    pub async fn get_book(&self, id: Uuid) -> AppResult<BookView> {
        let book = self.repository.books.get_by_id(id).await?;
        self.view(book).await
    }

    pub async fn create_book(&self, principal: &Principal, request: CreateBook) -> AppResult<BookView> {
        let book = NewBook::from_request(request, principal.user_id)?;
        let book = self.repository.books.create(book).await?;
        tracing::info!(book_id = %book.id, isbn = %book.isbn, added_by = %principal.user_id, "Book created");
        self.view(book).await
    }

    pub async fn update_book(&self, id: Uuid, changes: UpdateBook) -> AppResult<BookView> {
        let changes = changes.normalized()?;
        let book = self.repository.books.update(id, &changes).await?;
        tracing::info!(book_id = %book.id, "Book updated");
        self.view(book).await
    }

    /// Delete a book; borrow records keep pointing at it and show a placeholder
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }
}
