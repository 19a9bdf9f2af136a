//! Full-text index mirror for books and users
//!
//! The database is the source of truth. Every searchable entity type owns one
//! directory-backed index holding a projection of a few text fields, updated
//! after each committed write. Queries return identifiers only: callers
//! re-read the rows from the database and apply authorization there.

pub mod tantivy_index;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SearchConfig;

pub use tantivy_index::TantivyIndex;

/// Searchable entity types, one index each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Book,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Book => "book",
            EntityKind::User => "user",
        }
    }

    /// Text fields of the index document, in schema order
    pub fn text_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Book => &["title", "description", "authors"],
            EntityKind::User => &["name", "middlename", "surname", "login"],
        }
    }

    fn dir_name(&self) -> &'static str {
        match self {
            EntityKind::Book => "books",
            EntityKind::User => "users",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search-only projection of an entity
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub id: i32,
    pub fields: Vec<(&'static str, String)>,
}

impl IndexDocument {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    /// Unset values are indexed as empty text
    pub fn optional_field(self, name: &'static str, value: Option<&str>) -> Self {
        self.field(name, value.unwrap_or_default())
    }
}

/// Entities that have a document in one of the indexes
pub trait Indexable {
    const KIND: EntityKind;

    fn to_document(&self) -> IndexDocument;
}

/// A ranked match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: i32,
    pub score: f32,
}

/// Errors that can occur during index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Cannot open index: {0}")]
    Open(String),
    #[error("Index write failed: {0}")]
    Write(String),
    #[error("Search failed: {0}")]
    Query(String),
    #[error("Unknown field '{0}' for this index")]
    UnknownField(String),
}

/// One text index per entity type.
///
/// Writes become visible to `query` once they are committed and the reader is
/// reloaded; both happen before the write call returns. Searchers opened before
/// that point keep seeing the previous state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchIndex: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Insert a document. An existing document with the same id is replaced.
    async fn index(&self, doc: IndexDocument) -> Result<(), IndexError>;

    /// Replace the document with the same id. Logs and does nothing when no
    /// such document exists.
    async fn reindex(&self, doc: IndexDocument) -> Result<(), IndexError>;

    /// Remove a document by id. No-op when absent.
    async fn unindex(&self, id: i32) -> Result<(), IndexError>;

    /// Fuzzy match over the text fields, best score first. Blank text matches
    /// nothing.
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError>;

    /// Drop every document and index `docs` instead. Returns the new count.
    async fn rebuild(&self, docs: Vec<IndexDocument>) -> Result<usize, IndexError>;

    fn num_docs(&self) -> u64;
}

/// The process-wide index handles, opened once at startup
#[derive(Clone)]
pub struct SearchIndexes {
    pub books: Arc<dyn SearchIndex>,
    pub users: Arc<dyn SearchIndex>,
}

impl SearchIndexes {
    /// Open (or create) the on-disk indexes under `config.index_dir`
    pub fn open(config: &SearchConfig) -> Result<Self, IndexError> {
        let open = |kind: EntityKind| {
            TantivyIndex::open(
                kind,
                &config.index_dir.join(kind.dir_name()),
                config.writer_memory_bytes,
            )
        };

        Ok(Self {
            books: Arc::new(open(EntityKind::Book)?),
            users: Arc::new(open(EntityKind::User)?),
        })
    }

    /// Volatile indexes, used by tests and tooling
    pub fn in_ram() -> Result<Self, IndexError> {
        Ok(Self {
            books: Arc::new(TantivyIndex::in_ram(EntityKind::Book)?),
            users: Arc::new(TantivyIndex::in_ram(EntityKind::User)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Best-effort mirroring
//
// These run after the database commit. A failure leaves the index stale but
// the write stands; it is logged for the reconciliation job and never returned.
// ---------------------------------------------------------------------------

fn report_drift(index: &dyn SearchIndex, id: i32, op: &str, error: &IndexError) {
    tracing::error!(
        entity = %index.kind(),
        id,
        op,
        error = %error,
        "Index mirror failed after commit, search results are stale until the next reindex"
    );
}

pub async fn mirror_index<T: Indexable>(index: &dyn SearchIndex, entity: &T) {
    debug_assert_eq!(T::KIND, index.kind());
    let doc = entity.to_document();
    let id = doc.id;
    match index.index(doc).await {
        Ok(()) => tracing::debug!(entity = %index.kind(), id, "Indexed"),
        Err(e) => report_drift(index, id, "index", &e),
    }
}

pub async fn mirror_reindex<T: Indexable>(index: &dyn SearchIndex, entity: &T) {
    debug_assert_eq!(T::KIND, index.kind());
    let doc = entity.to_document();
    let id = doc.id;
    match index.reindex(doc).await {
        Ok(()) => tracing::debug!(entity = %index.kind(), id, "Reindexed"),
        Err(e) => report_drift(index, id, "reindex", &e),
    }
}

pub async fn mirror_unindex(index: &dyn SearchIndex, id: i32) {
    match index.unindex(id).await {
        Ok(()) => tracing::debug!(entity = %index.kind(), id, "Unindexed"),
        Err(e) => report_drift(index, id, "unindex", &e),
    }
}
