//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        checkout::CheckoutDetails,
        user::{ChangePassword, CreatedCredentials, NewUserEntry, UpdateUser, User, UserQuery},
    },
    AppState,
};

use super::{AuthenticatedUser, Page, UserPage};

/// Search users by text or filters
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Matching users", body = UserPage),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserPage>> {
    caller.require_librarian()?;

    let page = Page::new(query.page, query.per_page, &state.config.pagination);
    let (users, total) = state
        .services
        .users
        .search(&query, caller.is_admin(), page.limit(), page.offset())
        .await?;

    Ok(Json(page.wrap(users, total)))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 403, description = "Another user's profile"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    caller.require_self_or_librarian(id)?;

    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Create accounts in bulk; logins and passwords are generated
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = Vec<NewUserEntry>,
    responses(
        (status = 201, description = "Accounts created, passwords shown only once", body = Vec<CreatedCredentials>),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn create_users(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(entries): Json<Vec<NewUserEntry>>,
) -> AppResult<(StatusCode, Json<Vec<CreatedCredentials>>)> {
    caller.require_admin()?;

    if entries.is_empty() {
        return Err(AppError::Validation("At least one user is required".to_string()));
    }
    for entry in &entries {
        entry.validate()?;
    }

    let created = state.services.users.create_many(entries).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an existing user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    caller.require_admin()?;
    data.validate()?;

    let user = state.services.users.update(id, &data).await?;
    Ok(Json(user))
}

/// Set a user's password
#[utoipa::path(
    put,
    path = "/users/{id}/password",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    request_body = ChangePassword,
    responses(
        (status = 204, description = "Password changed"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ChangePassword>,
) -> AppResult<StatusCode> {
    caller.require_admin()?;
    data.validate()?;

    state.services.users.change_password(id, &data.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "User not found"),
        (status = 422, description = "User still holds books")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    caller.require_admin()?;

    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Books a user currently holds
#[utoipa::path(
    get,
    path = "/users/{id}/checkouts",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Active checkouts", body = Vec<CheckoutDetails>),
        (status = 403, description = "Another user's checkouts"),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_checkouts(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<CheckoutDetails>>> {
    caller.require_self_or_librarian(id)?;

    let checkouts = state.services.checkouts.user_books(id).await?;
    Ok(Json(checkouts))
}
