//! Checkout model: one row per lending of a book to a user

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::Book;
use super::user::User;

/// Checkout as stored. `returned_at` is unset while the book is out.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Checkout {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    /// Due date
    pub return_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Checkout {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_active() && self.return_date < today
    }
}

/// Active checkout with its book
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutDetails {
    pub id: i32,
    pub return_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub book: Book,
}

/// Give a book to a user
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCheckout {
    pub user_id: i32,
    pub book_id: i32,
    pub return_date: NaiveDate,
}

/// Change the due date of an active checkout
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReturnDate {
    pub return_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnDateQuery {
    pub user_id: i32,
    pub book_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReturnDateResponse {
    pub return_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DebtorsQuery {
    /// Due dates strictly before this day count as debts (default: today)
    pub before: Option<NaiveDate>,
}

/// A user holding books past their due date
#[derive(Debug, Serialize, ToSchema)]
pub struct Debtor {
    pub user: User,
    pub checkouts: Vec<Checkout>,
}
