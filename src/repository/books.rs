//! Books repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

/// Columns of `Book`, read from a relation aliased `b`
pub(crate) const BOOK_COLUMNS: &str = r#"
    b.id, b.title, b.authors, b.description, b.edition_year, b.amount,
    (b.amount - (SELECT COUNT(*) FROM checkouts c
                 WHERE c.book_id = b.id AND c.returned_at IS NULL))::BIGINT AS in_stock,
    b.is_private, b.image, b.created_at, b.updated_at
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID, private or not
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books b WHERE b.id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Books with the given ids, in no particular order. Unknown ids are skipped,
    /// as are private books unless `include_private`.
    pub async fn get_by_ids(&self, ids: &[i32], include_private: bool) -> AppResult<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = ANY($1) AND ($2 OR NOT b.is_private)",
            BOOK_COLUMNS
        ))
        .bind(ids)
        .bind(include_private)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &BookQuery, include_private: bool) {
        builder.push(" WHERE TRUE");

        if !include_private {
            builder.push(" AND NOT b.is_private");
        }

        let text_filters = [("b.title", &query.title), ("b.authors", &query.authors)];
        for (column, value) in text_filters {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                builder
                    .push(format!(" AND {} ILIKE ", column))
                    .push_bind(format!("%{}%", value.trim()));
            }
        }

        if let Some(year) = query.edition_year {
            builder.push(" AND b.edition_year = ").push_bind(year);
        }

        if query.available == Some(true) {
            builder.push(
                " AND b.amount > (SELECT COUNT(*) FROM checkouts c \
                 WHERE c.book_id = b.id AND c.returned_at IS NULL)",
            );
        }
    }

    /// Filtered listing with pagination
    pub async fn list(
        &self,
        query: &BookQuery,
        include_private: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b");
        Self::push_filters(&mut count, query, include_private);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books b", BOOK_COLUMNS));
        Self::push_filters(&mut select, query, include_private);
        select
            .push(" ORDER BY b.title, b.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// All books including private ones, for index rebuilds
    pub async fn list_all(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books b ORDER BY b.id", BOOK_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(&format!(
            r#"
            WITH b AS (
                INSERT INTO books (title, authors, description, edition_year, amount, is_private)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {} FROM b
            "#,
            BOOK_COLUMNS
        ))
        .bind(&book.title)
        .bind(&book.authors)
        .bind(&book.description)
        .bind(book.edition_year)
        .bind(book.amount)
        .bind(book.is_private)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Partial update. The amount cannot drop below the copies currently out.
    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i32> = sqlx::query_scalar("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        if let Some(amount) = data.amount {
            let out: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM checkouts WHERE book_id = $1 AND returned_at IS NULL",
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if (amount as i64) < out {
                return Err(AppError::BusinessRule(format!(
                    "{} copies are checked out, amount cannot be {}",
                    out, amount
                )));
            }
        }

        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            WITH b AS (
                UPDATE books SET
                    title = COALESCE($2, title),
                    authors = COALESCE($3, authors),
                    description = COALESCE($4, description),
                    edition_year = COALESCE($5, edition_year),
                    amount = COALESCE($6, amount),
                    is_private = COALESCE($7, is_private),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {} FROM b
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.authors)
        .bind(&data.description)
        .bind(data.edition_year)
        .bind(data.amount)
        .bind(data.is_private)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    /// Set the stored image file name; returns the previous one
    pub async fn set_image(&self, id: i32, image: Option<&str>) -> AppResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT image FROM books WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let previous =
            previous.ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        sqlx::query("UPDATE books SET image = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(image)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// Delete a book with no copy out; returns the deleted row
    pub async fn delete(&self, id: i32) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(&format!(
            "SELECT {} FROM books b WHERE b.id = $1 FOR UPDATE OF b",
            BOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM checkouts WHERE book_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            return Err(AppError::BusinessRule(
                "Book is still checked out".to_string(),
            ));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(book)
    }
}
