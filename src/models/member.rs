//! Member model, embedded borrow records and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::book::BookSummary;
use super::enums::MembershipType;
use super::user::UserSummary;
use crate::error::AppResult;

/// Postal address of a member
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.state.is_none() && self.zip_code.is_none()
    }

    /// Trim every part and drop blank ones; `None` when nothing is left
    fn cleaned(self) -> Option<Self> {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let address = Self {
            street: clean(self.street),
            city: clean(self.city),
            state: clean(self.state),
            zip_code: clean(self.zip_code),
        };
        (!address.is_empty()).then_some(address)
    }
}

/// One lending event of one book to one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: Uuid,
    pub book_id: Uuid,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned: bool,
    pub returned_date: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    pub fn new(book_id: Uuid, borrowed_date: DateTime<Utc>, due_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            borrowed_date,
            due_date,
            returned: false,
            returned_date: None,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.returned && self.due_date < now
    }
}

/// Member model with its borrow ledger
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<Address>,
    pub membership_date: DateTime<Utc>,
    pub membership_type: MembershipType,
    pub is_active: bool,
    /// Exposed through `MemberView` as the resolved account
    #[serde(skip_serializing)]
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub books_borrowed: Vec<BorrowRecord>,
}

/// Member with the account that registered it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: Member,
    pub created_by: UserSummary,
}

impl Member {
    pub fn has_outstanding_loans(&self) -> bool {
        self.books_borrowed.iter().any(|r| !r.returned)
    }
}

/// Member row as stored in the `members` table
#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub addr_street: Option<String>,
    pub addr_city: Option<String>,
    pub addr_state: Option<String>,
    pub addr_zip_code: Option<String>,
    pub membership_date: DateTime<Utc>,
    pub membership_type: MembershipType,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl MemberRow {
    pub fn into_member(self, books_borrowed: Vec<BorrowRecord>) -> Member {
        let address = Address {
            street: self.addr_street,
            city: self.addr_city,
            state: self.addr_state,
            zip_code: self.addr_zip_code,
        };
        Member {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: (!address.is_empty()).then_some(address),
            membership_date: self.membership_date,
            membership_type: self.membership_type,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
            books_borrowed,
        }
    }
}

/// Borrow record joined with the book it refers to
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowedBook {
    pub id: Uuid,
    pub book: BookSummary,
    pub borrowed_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned: bool,
    pub returned_date: Option<DateTime<Utc>>,
    pub is_overdue: bool,
}

/// Member with borrow records resolved for display
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberDetails {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<Address>,
    pub membership_date: DateTime<Utc>,
    pub membership_type: MembershipType,
    pub is_active: bool,
    pub created_by: UserSummary,
    pub created_at: DateTime<Utc>,
    pub books_borrowed: Vec<BorrowedBook>,
}

impl MemberDetails {
    /// Join a member with its creator and book summaries; `resolve` returns
    /// `None` for deleted books
    pub fn project<F>(member: Member, created_by: UserSummary, now: DateTime<Utc>, resolve: F) -> Self
    where
        F: Fn(Uuid) -> Option<BookSummary>,
    {
        let books_borrowed = member
            .books_borrowed
            .into_iter()
            .map(|record| BorrowedBook {
                is_overdue: record.is_overdue(now),
                book: resolve(record.book_id).unwrap_or_else(|| BookSummary::unknown(record.book_id)),
                id: record.id,
                borrowed_date: record.borrowed_date,
                due_date: record.due_date,
                returned: record.returned,
                returned_date: record.returned_date,
            })
            .collect();

        Self {
            id: member.id,
            first_name: member.first_name,
            last_name: member.last_name,
            email: member.email,
            phone: member.phone,
            address: member.address,
            membership_date: member.membership_date,
            membership_type: member.membership_type,
            is_active: member.is_active,
            created_by,
            created_at: member.created_at,
            books_borrowed,
        }
    }
}

/// Member query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MemberQuery {
    /// Case-insensitive search in first name, last name and email
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"), length(max = 255, message = "Email is too long"))]
    pub email: String,
    #[validate(length(min = 3, max = 30, message = "Phone number is required"))]
    pub phone: String,
    pub address: Option<Address>,
    pub membership_type: Option<MembershipType>,
    pub is_active: Option<bool>,
}

/// Update member request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"), length(max = 255, message = "Email is too long"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 30, message = "Phone number cannot be empty"))]
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub membership_type: Option<MembershipType>,
    pub is_active: Option<bool>,
}

/// Validated member ready to be stored
#[derive(Debug, Clone)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<Address>,
    pub membership_type: MembershipType,
    pub is_active: bool,
    pub created_by: Uuid,
}

/// Emails are compared trimmed and lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl NewMember {
    pub fn from_request(request: CreateMember, created_by: Uuid) -> AppResult<Self> {
        let request = CreateMember {
            email: normalize_email(&request.email),
            ..request
        };
        request.validate()?;

        Ok(Self {
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            phone: request.phone.trim().to_string(),
            address: request.address.and_then(Address::cleaned),
            membership_type: request.membership_type.unwrap_or_default(),
            is_active: request.is_active.unwrap_or(true),
            created_by,
        })
    }

    pub fn into_member(self, id: Uuid, now: DateTime<Utc>) -> Member {
        Member {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            membership_date: now,
            membership_type: self.membership_type,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: now,
            books_borrowed: Vec::new(),
        }
    }
}

impl UpdateMember {
    /// Validate and normalize an update request
    pub fn normalized(mut self) -> AppResult<Self> {
        self.email = self.email.as_deref().map(normalize_email);
        self.validate()?;
        self.first_name = self.first_name.map(|s| s.trim().to_string());
        self.last_name = self.last_name.map(|s| s.trim().to_string());
        self.phone = self.phone.map(|s| s.trim().to_string());
        // An address in an update replaces the stored one; an empty object clears it
        self.address = self.address.map(|a| a.cleaned().unwrap_or_default());
        Ok(self)
    }

    /// Apply the changes to a member in place
    pub fn apply(&self, member: &mut Member) {
        if let Some(ref v) = self.first_name {
            member.first_name = v.clone();
        }
        if let Some(ref v) = self.last_name {
            member.last_name = v.clone();
        }
        if let Some(ref v) = self.email {
            member.email = v.clone();
        }
        if let Some(ref v) = self.phone {
            member.phone = v.clone();
        }
        if let Some(ref v) = self.address {
            member.address = (!v.is_empty()).then(|| v.clone());
        }
        if let Some(v) = self.membership_type {
            member.membership_type = v;
        }
        if let Some(v) = self.is_active {
            member.is_active = v;
        }
    }
}
