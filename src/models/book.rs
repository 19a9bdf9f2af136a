//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::text_filter_matches;
use crate::search::{EntityKind, IndexDocument, Indexable};

/// Book as stored, with its current availability
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub authors: String,
    pub description: String,
    pub edition_year: Option<i32>,
    /// Copies owned by the library
    pub amount: i32,
    /// Copies not currently checked out
    pub in_stock: i64,
    pub is_private: bool,
    /// Stored image file name
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Private books exist only for librarians
    pub fn visible_to(&self, librarian: bool) -> bool {
        !self.is_private || librarian
    }
}

impl Indexable for Book {
    const KIND: EntityKind = EntityKind::Book;

    fn to_document(&self) -> IndexDocument {
        IndexDocument::new(self.id)
            .field("title", self.title.as_str())
            .field("description", self.description.as_str())
            .field("authors", self.authors.as_str())
    }
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Full-text search over title, description and authors. The other
    /// filters narrow its matches; at most `search.max_candidates` are ranked.
    pub q: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub edition_year: Option<i32>,
    /// Only books with at least one copy in stock
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    /// Field filters applied to a book fetched for a text search, with the
    /// same meaning as in the database listing
    pub fn matches(&self, book: &Book) -> bool {
        text_filter_matches(Some(book.title.as_str()), self.title.as_deref())
            && text_filter_matches(Some(book.authors.as_str()), self.authors.as_deref())
            && self
                .edition_year
                .map_or(true, |year| book.edition_year == Some(year))
            && (self.available != Some(true) || book.in_stock > 0)
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 512, message = "Title must be 1-512 characters"))]
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = 9999, message = "Invalid edition year"))]
    pub edition_year: Option<i32>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    #[serde(default = "default_amount")]
    pub amount: i32,
    #[serde(default)]
    pub is_private: bool,
}

fn default_amount() -> i32 {
    1
}

/// Update book request. Unset fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 512, message = "Title must be 1-512 characters"))]
    pub title: Option<String>,
    pub authors: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 9999, message = "Invalid edition year"))]
    pub edition_year: Option<i32>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: Option<i32>,
    pub is_private: Option<bool>,
}

impl UpdateBook {
    /// True when an indexed field is part of the update
    pub fn touches_index(&self) -> bool {
        self.title.is_some() || self.authors.is_some() || self.description.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(is_private: bool) -> Book {
        Book {
            id: 2,
            title: "Solaris".into(),
            authors: "Stanisław Lem".into(),
            description: "Ocean".into(),
            edition_year: Some(1961),
            amount: 3,
            in_stock: 3,
            is_private,
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_private_visibility() {
        assert!(book(false).visible_to(false));
        assert!(!book(true).visible_to(false));
        assert!(book(true).visible_to(true));
    }

    #[test]
    fn test_book_document_fields() {
        let doc = book(false).to_document();
        assert_eq!(doc.id, 2);
        let names: Vec<_> = doc.fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, EntityKind::Book.text_fields());
    }

    #[test]
    fn test_query_filters_narrow_text_matches() {
        let solaris = book(false);

        assert!(BookQuery::default().matches(&solaris));
        assert!(BookQuery { authors: Some("lem".into()), ..Default::default() }.matches(&solaris));
        assert!(!BookQuery { title: Some("Dune".into()), ..Default::default() }.matches(&solaris));
        assert!(BookQuery { edition_year: Some(1961), ..Default::default() }.matches(&solaris));
        assert!(!BookQuery { edition_year: Some(1970), ..Default::default() }.matches(&solaris));

        let mut all_out = book(false);
        all_out.in_stock = 0;
        let available = BookQuery { available: Some(true), ..Default::default() };
        assert!(available.matches(&solaris));
        assert!(!available.matches(&all_out));
    }

    #[test]
    fn test_create_book_validation() {
        let body: CreateBook =
            serde_json::from_value(serde_json::json!({ "title": "", "amount": 1 })).unwrap();
        assert!(body.validate().is_err());

        let body: CreateBook =
            serde_json::from_value(serde_json::json!({ "title": "Dune", "amount": -1 })).unwrap();
        assert!(body.validate().is_err());

        let body: CreateBook =
            serde_json::from_value(serde_json::json!({ "title": "Dune" })).unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.amount, 1);
        assert!(!body.is_private);
    }

    #[test]
    fn test_update_touches_index() {
        assert!(!UpdateBook { amount: Some(4), ..Default::default() }.touches_index());
        assert!(UpdateBook { title: Some("New".into()), ..Default::default() }.touches_index());
    }
}
