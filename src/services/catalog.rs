//! Catalog management service

use std::sync::Arc;

use super::media::MediaStore;
use super::search::{candidate_ids, order_by_rank, page_of};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
    search::{mirror_index, mirror_reindex, mirror_unindex, SearchIndex},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    index: Arc<dyn SearchIndex>,
    media: MediaStore,
    max_candidates: usize,
}

impl CatalogService {
    pub fn new(
        repository: Repository,
        index: Arc<dyn SearchIndex>,
        media: MediaStore,
        max_candidates: usize,
    ) -> Self {
        Self {
            repository,
            index,
            media,
            max_candidates,
        }
    }

    /// Get book by ID. Private books are reported missing to non-librarians.
    pub async fn get_book(&self, id: i32, librarian: bool) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        if !book.visible_to(librarian) {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(book)
    }

    /// Search books. With `q`, candidates come from the index and are
    /// re-read from the database, which drops private books for
    /// non-librarians; otherwise the database filters apply.
    pub async fn search_books(
        &self,
        query: &BookQuery,
        librarian: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Book>, i64)> {
        let text = query.q.as_deref().unwrap_or("");
        if text.trim().is_empty() {
            return self.repository.books.list(query, librarian, limit, offset).await;
        }

        let ids = candidate_ids(self.index.as_ref(), text, self.max_candidates).await?;
        let mut books = self.repository.books.get_by_ids(&ids, librarian).await?;
        books.retain(|book| query.matches(book));

        let ranked = order_by_rank(&ids, books, |book| book.id);
        Ok(page_of(ranked, limit, offset))
    }

    /// Create a new book
    pub async fn create_book(&self, data: &CreateBook) -> AppResult<Book> {
        let book = self.repository.books.create(data).await?;
        mirror_index(self.index.as_ref(), &book).await;
        tracing::info!(book_id = book.id, "Book created");
        Ok(book)
    }

    /// Update book fields
    pub async fn update_book(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        let book = self.repository.books.update(id, data).await?;
        if data.touches_index() {
            mirror_reindex(self.index.as_ref(), &book).await;
        }
        Ok(book)
    }

    /// Delete a book with no copy checked out, and its image
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let book = self.repository.books.delete(id).await?;
        mirror_unindex(self.index.as_ref(), id).await;
        if let Some(ref image) = book.image {
            self.media.remove(image).await;
        }
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    /// Store a new cover image, replacing the previous one
    pub async fn set_image(&self, id: i32, content: &[u8]) -> AppResult<Book> {
        let name = self.media.save(content).await?;

        let previous = match self.repository.books.set_image(id, Some(&name)).await {
            Ok(previous) => previous,
            Err(e) => {
                self.media.remove(&name).await;
                return Err(e);
            }
        };
        if let Some(ref old) = previous {
            self.media.remove(old).await;
        }

        self.repository.books.get_by_id(id).await
    }

    /// Cover image bytes
    pub async fn image(&self, id: i32, librarian: bool) -> AppResult<Vec<u8>> {
        let book = self.get_book(id, librarian).await?;
        let name = book
            .image
            .ok_or_else(|| AppError::NotFound("Book has no image".to_string()))?;
        self.media.read(&name).await
    }
}
