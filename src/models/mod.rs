//! Data models for Schoolib

pub mod book;
pub mod checkout;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use checkout::{Checkout, CheckoutDetails};
pub use user::{CurrentUser, Rights, User};

/// Case-insensitive substring filter, as the SQL listings apply with ILIKE.
/// A missing or blank filter matches everything.
pub(crate) fn text_filter_matches(value: Option<&str>, filter: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        None => true,
        Some(filter) => value.is_some_and(|v| v.to_lowercase().contains(&filter.to_lowercase())),
    }
}
