//! Lending endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::MemberDetails,
    AppState,
};

use super::AuthenticatedUser;

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Book to lend
    pub book_id: Uuid,
    /// Loan period in days (default: 14)
    pub due_days: Option<i64>,
}

/// Return request
#[derive(Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Borrow record to close
    pub borrow_id: Uuid,
}

/// Member projection after a lending operation
#[derive(Serialize, ToSchema)]
pub struct LendingResponse {
    pub message: String,
    pub member: MemberDetails,
}

/// Lend a book to a member
#[utoipa::path(
    post,
    path = "/members/{id}/borrow",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = BorrowRequest,
    responses(
        (status = 200, description = "Book borrowed", body = LendingResponse),
        (status = 400, description = "Invalid loan period", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Member or book not found", body = ErrorResponse),
        (status = 409, description = "No copies available or member inactive", body = ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(member_id): Path<Uuid>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<Json<LendingResponse>> {
    let principal = user.principal();
    principal.require_admin()?;

    let member = state
        .services
        .loans
        .borrow(&principal, member_id, request.book_id, request.due_days)
        .await?;

    Ok(Json(LendingResponse {
        message: "Book borrowed successfully".to_string(),
        member,
    }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/members/{id}/return",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = LendingResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 404, description = "Member or borrow record not found", body = ErrorResponse),
        (status = 409, description = "Book already returned", body = ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(member_id): Path<Uuid>,
    Json(request): Json<ReturnRequest>,
) -> AppResult<Json<LendingResponse>> {
    let principal = user.principal();
    principal.require_admin()?;

    let member = state
        .services
        .loans
        .return_book(&principal, member_id, request.borrow_id)
        .await?;

    Ok(Json(LendingResponse {
        message: "Book returned successfully".to_string(),
        member,
    }))
}
