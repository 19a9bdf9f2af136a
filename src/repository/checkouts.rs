//! Checkouts repository for database operations

use chrono::NaiveDate;
use sqlx::{FromRow, Pool, Postgres, Row};

use super::books::BOOK_COLUMNS;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        checkout::{Checkout, CheckoutDetails, CreateCheckout},
    },
};

#[derive(Clone)]
pub struct CheckoutsRepository {
    pool: Pool<Postgres>,
}

impl CheckoutsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Give a book to a user. Fails when no copy is in stock.
    pub async fn create(&self, checkout: &CreateCheckout) -> AppResult<Checkout> {
        let mut tx = self.pool.begin().await?;

        let user: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(checkout.user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(AppError::NotFound(format!(
                "User with id {} not found",
                checkout.user_id
            )));
        }

        // Serializes checkouts of the same book
        let amount: i32 = sqlx::query_scalar("SELECT amount FROM books WHERE id = $1 FOR UPDATE")
            .bind(checkout.book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Book with id {} not found", checkout.book_id))
            })?;

        let out: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM checkouts WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(checkout.book_id)
        .fetch_one(&mut *tx)
        .await?;

        if out >= amount as i64 {
            return Err(AppError::BusinessRule("No copies of this book in stock".to_string()));
        }

        let created = sqlx::query_as::<_, Checkout>(
            r#"
            INSERT INTO checkouts (user_id, book_id, return_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(checkout.user_id)
        .bind(checkout.book_id)
        .bind(checkout.return_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Change the due date of an active checkout
    pub async fn update_return_date(&self, id: i32, return_date: NaiveDate) -> AppResult<Checkout> {
        sqlx::query_as::<_, Checkout>(
            r#"
            UPDATE checkouts SET return_date = $2
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(return_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Active checkout with id {} not found", id)))
    }

    /// Mark the book as returned. The row is kept as history.
    pub async fn close(&self, id: i32) -> AppResult<Checkout> {
        sqlx::query_as::<_, Checkout>(
            r#"
            UPDATE checkouts SET returned_at = NOW()
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Active checkout with id {} not found", id)))
    }

    /// Books a user currently holds, earliest due first
    pub async fn active_for_user(&self, user_id: i32) -> AppResult<Vec<CheckoutDetails>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT co.id AS checkout_id, co.return_date, co.created_at AS checkout_created_at,
                   {}
            FROM checkouts co
            JOIN books b ON b.id = co.book_id
            WHERE co.user_id = $1 AND co.returned_at IS NULL
            ORDER BY co.return_date, co.id
            "#,
            BOOK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            result.push(CheckoutDetails {
                id: row.get("checkout_id"),
                return_date: row.get("return_date"),
                created_at: row.get("checkout_created_at"),
                book: Book::from_row(&row)?,
            });
        }

        Ok(result)
    }

    /// Due date of the earliest active checkout of `book_id` by `user_id`
    pub async fn return_date(&self, user_id: i32, book_id: i32) -> AppResult<NaiveDate> {
        sqlx::query_scalar(
            r#"
            SELECT return_date FROM checkouts
            WHERE user_id = $1 AND book_id = $2 AND returned_at IS NULL
            ORDER BY return_date, id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User does not hold this book".to_string()))
    }

    /// Active checkouts due strictly before `before`, grouped by user
    pub async fn overdue(&self, before: NaiveDate) -> AppResult<Vec<Checkout>> {
        let checkouts = sqlx::query_as::<_, Checkout>(
            r#"
            SELECT * FROM checkouts
            WHERE returned_at IS NULL AND return_date < $1
            ORDER BY user_id, return_date, id
            "#,
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(checkouts)
    }
}
