//! Statistics endpoints

use axum::{extract::State, Json};

use crate::{
    error::{AppResult, ErrorResponse},
    services::stats::LibraryStats,
    AppState,
};

use super::AuthenticatedUser;

/// Get library-wide counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library statistics", body = LibraryStats),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<LibraryStats>> {
    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}
