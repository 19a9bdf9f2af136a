//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, checkouts, health, users};

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Schoolib API",
        version = "0.3.0",
        description = "School library REST API: accounts, books, checkouts and search"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::refresh,
        auth::logout,
        auth::whoami,
        // Users
        users::list_users,
        users::get_user,
        users::create_users,
        users::update_user,
        users::change_password,
        users::delete_user,
        users::user_checkouts,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::upload_image,
        books::get_image,
        // Checkouts
        checkouts::create_checkout,
        checkouts::update_return_date,
        checkouts::return_book,
        checkouts::return_date,
        checkouts::debtors,
        // Admin
        admin::reindex,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RefreshRequest,
            auth::AccessTokenResponse,
            // Users
            crate::models::user::Rights,
            crate::models::user::User,
            crate::models::user::NewUserEntry,
            crate::models::user::CreatedCredentials,
            crate::models::user::UpdateUser,
            crate::models::user::ChangePassword,
            crate::api::UserPage,
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::api::BookPage,
            // Checkouts
            crate::models::checkout::Checkout,
            crate::models::checkout::CheckoutDetails,
            crate::models::checkout::CreateCheckout,
            crate::models::checkout::UpdateReturnDate,
            crate::models::checkout::ReturnDateResponse,
            crate::models::checkout::Debtor,
            // Admin
            crate::services::search::RebuildReport,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "books", description = "Book catalog"),
        (name = "checkouts", description = "Giving and returning books"),
        (name = "admin", description = "Maintenance")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_security() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/books/{id}"));
        assert!(doc.paths.paths.contains_key("/checkouts/debtors"));
        assert!(doc.paths.paths.contains_key("/admin/reindex"));

        let upload = doc.paths.paths["/books/{id}/image"]
            .operations
            .get(&utoipa::openapi::PathItemType::Put)
            .expect("image upload operation");
        let body = upload.request_body.as_ref().expect("image upload body");
        assert!(body.content.contains_key("multipart/form-data"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("BookPage"));
    }
}
