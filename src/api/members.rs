//! Member management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppResult, ErrorResponse},
    models::{
        member::{CreateMember, MemberDetails, MemberQuery, MemberView, UpdateMember},
        PageRequest,
    },
    AppState,
};

use super::{AuthenticatedUser, MemberPage, MessageResponse, PaginatedResponse};

#[derive(Serialize, ToSchema)]
pub struct MemberResponse {
    pub message: String,
    pub member: MemberView,
}

/// List members with search, activity filter and pagination
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(MemberQuery),
    responses(
        (status = 200, description = "List of members", body = MemberPage),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MemberQuery>,
) -> AppResult<Json<PaginatedResponse<MemberView>>> {
    let page = PageRequest::new(query.page, query.limit);
    let (members, total) = state.services.members.search_members(&query, page).await?;
    Ok(Json(PaginatedResponse::new(members, total, page)))
}

/// Get a member with borrow records resolved to books
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = MemberDetails),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 504, description = "Read timed out", body = ErrorResponse)
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MemberDetails>> {
    let member = state.services.members.get_member_details(id).await?;
    Ok(Json(member))
}

/// Register a member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = MemberResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not an admin", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<MemberResponse>)> {
    let principal = user.principal();
    principal.require_admin()?;

    let member = state.services.members.create_member(&principal, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            message: "Member created successfully".to_string(),
            member,
        }),
    ))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse)
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<UpdateMember>,
) -> AppResult<Json<MemberResponse>> {
    user.principal().require_admin()?;

    let member = state.services.members.update_member(id, changes).await?;
    Ok(Json(MemberResponse {
        message: "Member updated successfully".to_string(),
        member,
    }))
}

/// Delete a member without outstanding loans
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member deleted", body = MessageResponse),
        (status = 404, description = "Member not found", body = ErrorResponse),
        (status = 409, description = "Member has borrowed books", body = ErrorResponse)
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    user.principal().require_admin()?;

    state.services.members.delete_member(id).await?;
    Ok(Json(MessageResponse {
        message: "Member deleted successfully".to_string(),
    }))
}
