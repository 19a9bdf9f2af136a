//! Checkout endpoints: giving and returning books

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::checkout::{
        Checkout, CreateCheckout, Debtor, DebtorsQuery, ReturnDateQuery, ReturnDateResponse,
        UpdateReturnDate,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Give a book to a user
#[utoipa::path(
    post,
    path = "/checkouts",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    request_body = CreateCheckout,
    responses(
        (status = 201, description = "Book checked out", body = Checkout),
        (status = 403, description = "Librarian privileges required"),
        (status = 404, description = "User or book not found"),
        (status = 422, description = "No copy in stock")
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Json(data): Json<CreateCheckout>,
) -> AppResult<(StatusCode, Json<Checkout>)> {
    caller.require_librarian()?;

    let checkout = state.services.checkouts.give(&data).await?;
    Ok((StatusCode::CREATED, Json(checkout)))
}

/// Change the return date of an active checkout
#[utoipa::path(
    put,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    request_body = UpdateReturnDate,
    responses(
        (status = 200, description = "Return date changed", body = Checkout),
        (status = 403, description = "Librarian privileges required"),
        (status = 404, description = "No active checkout with this ID")
    )
)]
pub async fn update_return_date(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateReturnDate>,
) -> AppResult<Json<Checkout>> {
    caller.require_librarian()?;

    let checkout = state
        .services
        .checkouts
        .change_return_date(id, data.return_date)
        .await?;
    Ok(Json(checkout))
}

/// Return a book
#[utoipa::path(
    delete,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = Checkout),
        (status = 403, description = "Librarian privileges required"),
        (status = 404, description = "No active checkout with this ID")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Checkout>> {
    caller.require_librarian()?;

    let checkout = state.services.checkouts.return_book(id).await?;
    Ok(Json(checkout))
}

/// Due date of a book held by a user
#[utoipa::path(
    get,
    path = "/checkouts/return-date",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(ReturnDateQuery),
    responses(
        (status = 200, description = "Due date", body = ReturnDateResponse),
        (status = 403, description = "Another user's checkout"),
        (status = 404, description = "The user does not hold this book")
    )
)]
pub async fn return_date(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<ReturnDateQuery>,
) -> AppResult<Json<ReturnDateResponse>> {
    caller.require_self_or_librarian(query.user_id)?;

    let return_date = state
        .services
        .checkouts
        .return_date(query.user_id, query.book_id)
        .await?;
    Ok(Json(ReturnDateResponse { return_date }))
}

/// Users holding books past their due date
#[utoipa::path(
    get,
    path = "/checkouts/debtors",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(DebtorsQuery),
    responses(
        (status = 200, description = "Debtors with their overdue checkouts", body = Vec<Debtor>),
        (status = 403, description = "Librarian privileges required")
    )
)]
pub async fn debtors(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<DebtorsQuery>,
) -> AppResult<Json<Vec<Debtor>>> {
    caller.require_librarian()?;

    let debtors = state.services.checkouts.debtors(query.before).await?;
    Ok(Json(debtors))
}
