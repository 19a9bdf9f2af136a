//! Checkouts service: giving, extending and returning books

use chrono::{NaiveDate, Utc};

use crate::{
    error::AppResult,
    models::checkout::{Checkout, CheckoutDetails, CreateCheckout, Debtor},
    repository::Repository,
};

#[derive(Clone)]
pub struct CheckoutsService {
    repository: Repository,
}

impl CheckoutsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Give a book to a user
    pub async fn give(&self, data: &CreateCheckout) -> AppResult<Checkout> {
        let checkout = self.repository.checkouts.create(data).await?;
        tracing::info!(
            checkout_id = checkout.id,
            user_id = checkout.user_id,
            book_id = checkout.book_id,
            return_date = %checkout.return_date,
            "Book checked out"
        );
        Ok(checkout)
    }

    pub async fn change_return_date(&self, id: i32, return_date: NaiveDate) -> AppResult<Checkout> {
        self.repository.checkouts.update_return_date(id, return_date).await
    }

    /// Close the checkout; the book is back in stock
    pub async fn return_book(&self, id: i32) -> AppResult<Checkout> {
        let checkout = self.repository.checkouts.close(id).await?;
        tracing::info!(checkout_id = id, book_id = checkout.book_id, "Book returned");
        Ok(checkout)
    }

    pub async fn return_date(&self, user_id: i32, book_id: i32) -> AppResult<NaiveDate> {
        self.repository.checkouts.return_date(user_id, book_id).await
    }

    /// Books the user currently holds. Unknown users are reported missing.
    pub async fn user_books(&self, user_id: i32) -> AppResult<Vec<CheckoutDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.checkouts.active_for_user(user_id).await
    }

    /// Users with books due before `before` (default: today)
    pub async fn debtors(&self, before: Option<NaiveDate>) -> AppResult<Vec<Debtor>> {
        let before = before.unwrap_or_else(|| Utc::now().date_naive());
        let overdue = self.repository.checkouts.overdue(before).await?;

        let mut user_ids: Vec<i32> = overdue.iter().map(|c| c.user_id).collect();
        user_ids.dedup();
        let users = self.repository.users.get_by_ids(&user_ids).await?;

        Ok(group_debtors(users, overdue, before))
    }
}

/// Attach checkouts overdue at `before` to their users, in the checkouts'
/// user order. Returned checkouts are left out.
fn group_debtors(users: Vec<crate::models::User>, overdue: Vec<Checkout>, before: NaiveDate) -> Vec<Debtor> {
    let mut debtors: Vec<Debtor> = Vec::new();
    for checkout in overdue.into_iter().filter(|c| c.is_overdue(before)) {
        match debtors.last_mut() {
            Some(debtor) if debtor.user.id == checkout.user_id => debtor.checkouts.push(checkout),
            _ => {
                if let Some(user) = users.iter().find(|u| u.id == checkout.user_id) {
                    debtors.push(Debtor {
                        user: user.clone(),
                        checkouts: vec![checkout],
                    });
                }
            }
        }
    }
    debtors
}
