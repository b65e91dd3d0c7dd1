//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, members, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Librarium API",
        version = "0.3.0",
        description = "Library lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        // Lending
        loans::borrow_book,
        loans::return_book,
        // Stats
        stats::get_stats,
    ),
    components(
        schemas(
            // Auth
            auth::TokenResponse,
            auth::UserResponse,
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::enums::Role,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::BookView,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::enums::Genre,
            books::BookResponse,
            super::BookPage,
            // Members
            crate::models::member::Member,
            crate::models::member::MemberDetails,
            crate::models::member::MemberView,
            crate::models::member::Address,
            crate::models::member::BorrowRecord,
            crate::models::member::BorrowedBook,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::models::enums::MembershipType,
            members::MemberResponse,
            super::MemberPage,
            // Lending
            loans::BorrowRequest,
            loans::ReturnRequest,
            loans::LendingResponse,
            // Stats
            crate::services::stats::LibraryStats,
            // Health
            health::HealthResponse,
            // Common
            super::MessageResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "members", description = "Member management"),
        (name = "lending", description = "Borrow and return"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_lending_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/members/{id}/borrow"));
        assert!(doc.paths.paths.contains_key("/members/{id}/return"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
