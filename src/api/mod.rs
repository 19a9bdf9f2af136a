//! API handlers for Schoolib REST endpoints

pub mod admin;
pub mod auth;
pub mod books;
pub mod checkouts;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::PaginationConfig,
    error::AppError,
    models::{book::Book, user::User, CurrentUser},
    AppState,
};

/// Extractor for the authenticated caller.
///
/// The access token is validated, then the user is reloaded so that rights
/// changes and deletions take effect immediately.
pub struct AuthenticatedUser(pub CurrentUser);

/// Token of a `Bearer` authorization header value
pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            AppError::Authentication("Invalid authorization header format".to_string())
        })?;

        let user = state.services.auth.authenticate(token).await?;
        Ok(AuthenticatedUser(user))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(BookPage = PaginatedResponse<Book>, UserPage = PaginatedResponse<User>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number, starting at 1
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

/// Highest page number accepted; larger requests are clamped
const MAX_PAGE: i64 = 1_000_000;

/// Resolved page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    /// Clamp the requested page to sane bounds
    pub fn new(page: Option<i64>, per_page: Option<i64>, config: &PaginationConfig) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page
                .unwrap_or(config.default_per_page)
                .clamp(1, config.max_per_page),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> PaginatedResponse<T>
    where
        T: for<'a> ToSchema<'a>,
    {
        PaginatedResponse {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        let config = PaginationConfig::default();

        let page = Page::new(None, None, &config);
        assert_eq!(page, Page { page: 1, per_page: 10 });
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(3), Some(25), &config);
        assert_eq!(page.offset(), 50);
        assert_eq!(page.limit(), 25);

        let page = Page::new(Some(0), Some(100_000), &config);
        assert_eq!(page, Page { page: 1, per_page: 100 });

        let page = Page::new(Some(-4), Some(0), &config);
        assert_eq!(page, Page { page: 1, per_page: 1 });
    }

    #[test]
    fn test_huge_page_number_is_clamped() {
        let config = PaginationConfig::default();

        let page = Page::new(Some(i64::MAX), Some(100), &config);
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * 100);
        assert!(page.offset() > 0);
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
