//! Authentication endpoints

use axum::{extract::State, http::header::AUTHORIZATION, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::user::User,
    AppState,
};

use super::AuthenticatedUser;

/// Name of the http-only cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/api/v1/auth")
        .build()
}

/// Login with login and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, refresh token also set as cookie", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<(CookieJar, [(axum::http::HeaderName, String); 1], Json<LoginResponse>)> {
    let (tokens, _user) = state
        .services
        .auth
        .login(&request.login, &request.password)
        .await?;

    let jar = jar.add(refresh_cookie(tokens.refresh.clone()));
    let header = [(AUTHORIZATION, format!("Bearer {}", tokens.access))];

    Ok((
        jar,
        header,
        Json(LoginResponse {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            token_type: "bearer".to_string(),
        }),
    ))
}

/// Exchange a refresh token (cookie or body) for a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body(content = RefreshRequest, description = "Optional when the refresh cookie is set"),
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Missing, invalid or expired refresh token", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<([(axum::http::HeaderName, String); 1], Json<AccessTokenResponse>)> {
    let token = body
        .map(|Json(body)| body.refresh_token)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|cookie| cookie.value().to_string()))
        .ok_or_else(|| AppError::Authentication("Missing refresh token".to_string()))?;

    let access = state.services.auth.refresh(&token).await?;

    Ok((
        [(AUTHORIZATION, format!("Bearer {}", access))],
        Json(AccessTokenResponse {
            access_token: access,
            token_type: "bearer".to_string(),
        }),
    ))
}

/// Forget the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Refresh cookie removed")
    )
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let cookie = Cookie::build(REFRESH_COOKIE).path("/api/v1/auth").build();
    (jar.remove(cookie), StatusCode::NO_CONTENT)
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/auth/whoami",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn whoami(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(caller.id).await?;
    Ok(Json(user))
}
