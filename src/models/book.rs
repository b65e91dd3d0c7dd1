//! Book (inventory record) model and related types

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::Genre;
use super::user::UserSummary;
use crate::error::{AppError, AppResult};

/// ISBN-10 or ISBN-13 once separators are stripped
static ISBN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{9}[0-9X]|[0-9]{13})$").expect("valid ISBN regex"));

/// Title shown for borrow records whose book no longer exists
pub const UNKNOWN_BOOK_TITLE: &str = "Unknown Book";

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: Genre,
    pub total_copies: i32,
    pub copies_available: i32,
    pub description: Option<String>,
    /// Exposed through `BookView` as the resolved account
    #[serde(skip_serializing)]
    pub added_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Book with the account that added it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookView {
    #[serde(flatten)]
    pub book: Book,
    pub added_by: UserSummary,
}

impl Book {
    /// Number of copies currently lent out
    pub fn on_loan(&self) -> i32 {
        self.total_copies - self.copies_available
    }

    /// Copy counters after applying an update.
    ///
    /// An explicit `copies_available` wins; otherwise a change of `total_copies`
    /// keeps the number of copies on loan unchanged.
    pub fn counters_after(&self, changes: &UpdateBook) -> (i32, i32) {
        let total = changes.total_copies.unwrap_or(self.total_copies);
        let available = changes
            .copies_available
            .unwrap_or(self.copies_available + (total - self.total_copies));
        (total, available)
    }
}

/// Checks `0 <= available <= total`
pub fn check_counters(total: i32, available: i32) -> AppResult<()> {
    if total < 1 {
        return Err(AppError::Validation("Must have at least one copy".to_string()));
    }
    if available < 0 || available > total {
        return Err(AppError::Conflict(format!(
            "Copies available ({}) must be between 0 and total copies ({})",
            available, total
        )));
    }
    Ok(())
}

/// Strip separators from an ISBN and check its shape
pub fn normalize_isbn(raw: &str) -> AppResult<String> {
    let isbn: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if ISBN_REGEX.is_match(&isbn) {
        Ok(isbn)
    } else {
        Err(AppError::Validation(format!("Invalid ISBN: {}", raw.trim())))
    }
}

/// Published year cannot lie in the future
pub fn check_published_year(year: i32) -> AppResult<()> {
    let current = Utc::now().year();
    if year > current {
        return Err(AppError::Validation("Year cannot be in the future".to_string()));
    }
    Ok(())
}

/// Minimal book projection used in borrow records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
}

impl BookSummary {
    /// Placeholder for a reference to a deleted book
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            title: UNKNOWN_BOOK_TITLE.to_string(),
            author: String::new(),
            isbn: String::new(),
        }
    }
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
        }
    }
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive search in title, author and ISBN
    pub search: Option<String>,
    pub genre: Option<Genre>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title is required and at most 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author is required and at most 255 characters"))]
    pub author: String,
    #[validate(length(min = 10, max = 20, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(range(min = 1000, message = "Year must be valid"))]
    pub published_year: i32,
    pub genre: Genre,
    #[validate(range(min = 1, message = "Must have at least one copy"))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0, message = "Copies cannot be negative"))]
    pub copies_available: Option<i32>,
    #[validate(length(max = 4000, message = "Description is too long"))]
    pub description: Option<String>,
}

/// Update book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be 1 to 255 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 10, max = 20, message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    #[validate(range(min = 1000, message = "Year must be valid"))]
    pub published_year: Option<i32>,
    pub genre: Option<Genre>,
    #[validate(range(min = 1, message = "Must have at least one copy"))]
    pub total_copies: Option<i32>,
    #[validate(range(min = 0, message = "Copies cannot be negative"))]
    pub copies_available: Option<i32>,
    /// A blank description clears the stored one
    #[validate(length(max = 4000, message = "Description is too long"))]
    pub description: Option<String>,
}

/// Validated book ready to be stored
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: Genre,
    pub total_copies: i32,
    pub copies_available: i32,
    pub description: Option<String>,
    pub added_by: Uuid,
}

impl NewBook {
    /// Validate and normalize a create request
    pub fn from_request(request: CreateBook, added_by: Uuid) -> AppResult<Self> {
        request.validate()?;
        check_published_year(request.published_year)?;

        let copies_available = request.copies_available.unwrap_or(request.total_copies);
        check_counters(request.total_copies, copies_available)?;

        Ok(Self {
            title: request.title.trim().to_string(),
            author: request.author.trim().to_string(),
            isbn: normalize_isbn(&request.isbn)?,
            published_year: request.published_year,
            genre: request.genre,
            total_copies: request.total_copies,
            copies_available,
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            added_by,
        })
    }

    pub fn into_book(self, id: Uuid, created_at: DateTime<Utc>) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            published_year: self.published_year,
            genre: self.genre,
            total_copies: self.total_copies,
            copies_available: self.copies_available,
            description: self.description,
            added_by: self.added_by,
            created_at,
        }
    }
}

impl UpdateBook {
    /// Validate and normalize an update request
    pub fn normalized(mut self) -> AppResult<Self> {
        self.validate()?;
        if let Some(year) = self.published_year {
            check_published_year(year)?;
        }
        if let Some(ref isbn) = self.isbn {
            self.isbn = Some(normalize_isbn(isbn)?);
        }
        self.title = self.title.map(|t| t.trim().to_string());
        self.author = self.author.map(|a| a.trim().to_string());
        // Some("") reaches storage as a request to clear the description
        self.description = self.description.map(|d| d.trim().to_string());
        Ok(self)
    }

    /// Description to store once the update is applied to `current`
    pub fn description_after(&self, current: Option<String>) -> Option<String> {
        match self.description {
            Some(ref d) if d.is_empty() => None,
            Some(ref d) => Some(d.clone()),
            None => current,
        }
    }
}
