//! Repository layer: storage traits and their PostgreSQL and in-memory backends

pub mod books;
pub mod loans;
pub mod members;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, BookSummary, NewBook, UpdateBook},
        member::{BorrowRecord, Member, MemberQuery, NewMember, UpdateMember},
        user::{NewUser, User, UserSummary},
        PageRequest, Role,
    },
};

/// Inventory counters over all books
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookCounts {
    pub total_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberCounts {
    pub total: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanCounts {
    pub active: i64,
    pub overdue: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BooksRepository: Send + Sync {
    /// Newest first, with the total number of matches
    async fn search(&self, query: &BookQuery, page: PageRequest) -> AppResult<(Vec<Book>, i64)>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Book>;
    /// Summaries of the books that still exist among `ids`
    async fn get_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<BookSummary>>;
    async fn create(&self, book: NewBook) -> AppResult<Book>;
    /// Partial update; counters are recomputed atomically against the stored row
    async fn update(&self, id: Uuid, changes: &UpdateBook) -> AppResult<Book>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn counts(&self) -> AppResult<BookCounts>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembersRepository: Send + Sync {
    async fn search(&self, query: &MemberQuery, page: PageRequest) -> AppResult<(Vec<Member>, i64)>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Member>;
    async fn create(&self, member: NewMember) -> AppResult<Member>;
    async fn update(&self, id: Uuid, changes: &UpdateMember) -> AppResult<Member>;
    /// Fails with Conflict while the member has unreturned books
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    async fn counts(&self) -> AppResult<MemberCounts>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansRepository: Send + Sync {
    /// Append a borrow record and take one copy of the book, atomically.
    ///
    /// NotFound for a missing member or book, Conflict for an inactive member
    /// or a book without available copies.
    async fn borrow(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        borrowed_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord>;

    /// Mark a borrow record returned and give the copy back, atomically.
    ///
    /// NotFound for a missing member or record, Conflict if already returned.
    async fn return_record(
        &self,
        member_id: Uuid,
        record_id: Uuid,
        returned_date: DateTime<Utc>,
    ) -> AppResult<BorrowRecord>;

    async fn counts(&self, now: DateTime<Utc>) -> AppResult<LoanCounts>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<User>;
    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Summaries of the accounts that exist among `ids`
    async fn get_summaries(&self, ids: &[Uuid]) -> AppResult<Vec<UserSummary>>;
    async fn create(&self, user: NewUser) -> AppResult<User>;
    async fn update_credentials(
        &self,
        id: Uuid,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> AppResult<User>;
}

/// Main repository struct holding the storage backends
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BooksRepository>,
    pub members: Arc<dyn MembersRepository>,
    pub loans: Arc<dyn LoansRepository>,
    pub users: Arc<dyn UsersRepository>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            members: Arc::new(members::PgMembersRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository backed by a process-local store
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::default();
        Self {
            pool: None,
            books: Arc::new(store.clone()),
            members: Arc::new(store.clone()),
            loans: Arc::new(store.clone()),
            users: Arc::new(store),
        }
    }

    /// Check that the storage backend answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}

/// Case-insensitive `LIKE` pattern matching `term` anywhere
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Search term or `None` when blank
pub(crate) fn search_term(search: &Option<String>) -> Option<&str> {
    search.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
