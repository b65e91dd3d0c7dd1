//! Library-wide counters

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, repository::Repository};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LibraryStats {
    pub total_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub total_members: i64,
    pub active_members: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_stats(&self) -> AppResult<LibraryStats> {
        let books = self.repository.books.counts().await?;
        let members = self.repository.members.counts().await?;
        let loans = self.repository.loans.counts(Utc::now()).await?;

        Ok(LibraryStats {
            total_books: books.total_books,
            total_copies: books.total_copies,
            available_copies: books.available_copies,
            total_members: members.total,
            active_members: members.active,
            active_loans: loans.active,
            overdue_loans: loans.overdue,
        })
    }
}
