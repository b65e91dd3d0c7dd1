//! Data models for Librarium

pub mod book;
pub mod enums;
pub mod member;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookQuery, BookSummary, BookView};
pub use enums::{Genre, MembershipType, Role};
pub use member::{Address, BorrowRecord, Member, MemberDetails, MemberQuery, MemberView};
pub use user::{Principal, User, UserClaims, UserSummary};

/// Page window resolved from `page`/`limit` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;
    /// Highest page whose offset still fits in an i64 at the largest limit
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_LIMIT;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(1).min(Self::MAX_PAGE),
            limit: limit
                .filter(|l| *l >= 1)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` entries
    pub fn pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}
