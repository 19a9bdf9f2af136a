//! Tantivy-backed search index
//!
//! One index per entity type, stored in its own directory. The id is an
//! indexed i64 field used as the document key; every text field uses the
//! default tokenizer (split on non-alphanumerics, lowercased), which handles
//! Cyrillic titles and names as well as Latin ones.
//!
//! Matching strategy, per analyzed query token and per text field:
//! - exact term, boosted (BM25 scored)
//! - Levenshtein distance 1 with transpositions, for tokens of 4+ chars
//! - prefix match, for tokens of 3+ chars
//!
//! All clauses are `Should`, so documents matching more tokens rank higher.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, INDEXED, STORED, TEXT};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::Mutex;

use super::{EntityKind, IndexDocument, IndexError, SearchHit, SearchIndex};

const EXACT_BOOST: f32 = 2.0;
const FUZZY_MIN_CHARS: usize = 4;
const PREFIX_MIN_CHARS: usize = 3;

/// Default writer budget for volatile indexes
const IN_RAM_WRITER_BYTES: usize = 15_000_000;

pub struct TantivyIndex {
    kind: EntityKind,
    index: Index,
    /// Reloaded by hand after each commit
    reader: IndexReader,
    /// Tantivy allows a single writer per index
    writer: Mutex<IndexWriter>,
    id_field: Field,
    text_fields: Vec<(&'static str, Field)>,
}

impl TantivyIndex {
    fn schema(kind: EntityKind) -> (Schema, Field, Vec<(&'static str, Field)>) {
        let mut builder = Schema::builder();
        let id_field = builder.add_i64_field("id", INDEXED | STORED);
        let text_fields = kind
            .text_fields()
            .iter()
            .map(|name| (*name, builder.add_text_field(name, TEXT | STORED)))
            .collect();
        (builder.build(), id_field, text_fields)
    }

    /// Open the index stored in `path`, creating it on first use
    pub fn open(kind: EntityKind, path: &Path, writer_memory_bytes: usize) -> Result<Self, IndexError> {
        std::fs::create_dir_all(path)
            .map_err(|e| IndexError::Open(format!("{}: {}", path.display(), e)))?;
        let directory =
            MmapDirectory::open(path).map_err(|e| IndexError::Open(e.to_string()))?;

        let (schema, id_field, text_fields) = Self::schema(kind);
        let index = Index::open_or_create(directory, schema)
            .map_err(|e| IndexError::Open(e.to_string()))?;

        let this = Self::with_index(kind, index, id_field, text_fields, writer_memory_bytes)?;
        tracing::info!(
            entity = %kind,
            path = %path.display(),
            documents = this.num_docs(),
            "Search index opened"
        );
        Ok(this)
    }

    /// Volatile index for tests and tooling
    pub fn in_ram(kind: EntityKind) -> Result<Self, IndexError> {
        let (schema, id_field, text_fields) = Self::schema(kind);
        let index = Index::create_in_ram(schema);
        Self::with_index(kind, index, id_field, text_fields, IN_RAM_WRITER_BYTES)
    }

    fn with_index(
        kind: EntityKind,
        index: Index,
        id_field: Field,
        text_fields: Vec<(&'static str, Field)>,
        writer_memory_bytes: usize,
    ) -> Result<Self, IndexError> {
        // Fails with LockBusy when another process holds the writer
        let writer: IndexWriter = index
            .writer(writer_memory_bytes)
            .map_err(|e| IndexError::Open(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| IndexError::Open(e.to_string()))?;

        Ok(Self {
            kind,
            index,
            reader,
            writer: Mutex::new(writer),
            id_field,
            text_fields,
        })
    }

    fn id_term(&self, id: i32) -> Term {
        Term::from_field_i64(self.id_field, id as i64)
    }

    fn to_tantivy(&self, doc: &IndexDocument) -> Result<TantivyDocument, IndexError> {
        let mut out = TantivyDocument::new();
        out.add_i64(self.id_field, doc.id as i64);
        for (name, value) in &doc.fields {
            let field = self
                .text_fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, f)| *f)
                .ok_or_else(|| IndexError::UnknownField(name.to_string()))?;
            out.add_text(field, value);
        }
        Ok(out)
    }

    fn contains(&self, id: i32) -> Result<bool, IndexError> {
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        let count = self
            .reader
            .searcher()
            .search(&query, &Count)
            .map_err(|e| IndexError::Query(e.to_string()))?;
        Ok(count > 0)
    }

    /// Commit pending operations and make them visible to new searchers
    fn commit(&self, writer: &mut IndexWriter) -> Result<(), IndexError> {
        writer
            .commit()
            .map_err(|e| IndexError::Write(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| IndexError::Write(e.to_string()))
    }

    /// Split query text the way the text fields were analyzed
    fn analyze(&self, text: &str) -> Result<Vec<String>, IndexError> {
        let Some((_, field)) = self.text_fields.first() else {
            return Ok(Vec::new());
        };
        let mut analyzer = self
            .index
            .tokenizer_for_field(*field)
            .map_err(|e| IndexError::Query(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        let mut stream = analyzer.token_stream(text);
        while stream.advance() {
            let token = stream.token().text.clone();
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }

    fn build_query(&self, tokens: &[String]) -> BooleanQuery {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for token in tokens {
            let chars = token.chars().count();
            for (_, field) in &self.text_fields {
                let term = Term::from_field_text(*field, token);

                let exact = TermQuery::new(term.clone(), IndexRecordOption::WithFreqs);
                clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(exact), EXACT_BOOST))));

                if chars >= FUZZY_MIN_CHARS {
                    clauses.push((Occur::Should, Box::new(FuzzyTermQuery::new(term.clone(), 1, true))));
                }
                if chars >= PREFIX_MIN_CHARS {
                    clauses.push((Occur::Should, Box::new(FuzzyTermQuery::new_prefix(term, 0, true))));
                }
            }
        }

        BooleanQuery::new(clauses)
    }
}

#[async_trait]
impl SearchIndex for TantivyIndex {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn index(&self, doc: IndexDocument) -> Result<(), IndexError> {
        let document = self.to_tantivy(&doc)?;
        let mut writer = self.writer.lock().await;

        writer.delete_term(self.id_term(doc.id));
        writer
            .add_document(document)
            .map_err(|e| IndexError::Write(e.to_string()))?;
        self.commit(&mut writer)
    }

    async fn reindex(&self, doc: IndexDocument) -> Result<(), IndexError> {
        let document = self.to_tantivy(&doc)?;
        let mut writer = self.writer.lock().await;

        // The reader is reloaded under this lock, so it reflects every commit
        if !self.contains(doc.id)? {
            tracing::warn!(entity = %self.kind, id = doc.id, "Reindex skipped: document not in index");
            return Ok(());
        }

        writer.delete_term(self.id_term(doc.id));
        writer
            .add_document(document)
            .map_err(|e| IndexError::Write(e.to_string()))?;
        self.commit(&mut writer)
    }

    async fn unindex(&self, id: i32) -> Result<(), IndexError> {
        let mut writer = self.writer.lock().await;

        if !self.contains(id)? {
            return Ok(());
        }

        writer.delete_term(self.id_term(id));
        self.commit(&mut writer)
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let tokens = self.analyze(text)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.build_query(&tokens);
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| IndexError::Query(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| IndexError::Query(e.to_string()))?;
            match doc.get_first(self.id_field).and_then(|v| v.as_i64()) {
                Some(id) => hits.push(SearchHit {
                    id: id as i32,
                    score,
                }),
                None => tracing::warn!(entity = %self.kind, "Indexed document without id"),
            }
        }

        Ok(hits)
    }

    async fn rebuild(&self, docs: Vec<IndexDocument>) -> Result<usize, IndexError> {
        let start = std::time::Instant::now();
        let mut writer = self.writer.lock().await;

        writer
            .delete_all_documents()
            .map_err(|e| IndexError::Write(e.to_string()))?;

        let count = docs.len();
        for doc in &docs {
            let document = self.to_tantivy(doc)?;
            writer
                .add_document(document)
                .map_err(|e| IndexError::Write(e.to_string()))?;
        }
        self.commit(&mut writer)?;

        tracing::info!(
            entity = %self.kind,
            documents = count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index rebuilt"
        );
        Ok(count)
    }

    fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i32, title: &str, authors: &str) -> IndexDocument {
        IndexDocument::new(id)
            .field("title", title)
            .field("description", "")
            .field("authors", authors)
    }

    fn user(id: i32, name: &str, surname: &str, login: &str) -> IndexDocument {
        IndexDocument::new(id)
            .field("name", name)
            .field("middlename", "")
            .field("surname", surname)
            .field("login", login)
    }

    async fn ids(index: &TantivyIndex, text: &str) -> Vec<i32> {
        index
            .query(text, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|hit| hit.id)
            .collect()
    }

    #[tokio::test]
    async fn test_indexed_document_is_found_by_title() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "public_book", "Nobody")).await.unwrap();

        assert_eq!(ids(&index, "public_book").await, vec![1]);
        assert_eq!(ids(&index, "nobody").await, vec![1]);
    }

    #[tokio::test]
    async fn test_better_match_ranks_first() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "private_book", "")).await.unwrap();
        index.index(book(2, "public_book", "")).await.unwrap();

        let found = ids(&index, "public_book").await;
        assert_eq!(found.first(), Some(&2));
        assert!(found.contains(&1), "shared token should still match");
    }

    #[tokio::test]
    async fn test_fuzzy_and_prefix_matching() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(5, "Harry Potter", "Rowling")).await.unwrap();

        assert_eq!(ids(&index, "hary").await, vec![5]);
        assert_eq!(ids(&index, "pott").await, vec![5]);
        assert!(ids(&index, "zzz").await.is_empty());
    }

    #[tokio::test]
    async fn test_cyrillic_user_fields() {
        let index = TantivyIndex::in_ram(EntityKind::User).unwrap();
        index.index(user(3, "Иван", "Иванов", "sch20243")).await.unwrap();
        index.index(user(4, "Акакий", "Братишкин", "sch20244")).await.unwrap();

        assert_eq!(ids(&index, "Иванов").await, vec![3]);

        // One edit away from the other login, so both match; exact ranks first
        let found = ids(&index, "sch20244").await;
        assert_eq!(found.first(), Some(&4));
        assert!(found.contains(&3));
    }

    #[tokio::test]
    async fn test_blank_query_matches_nothing() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "Dune", "Herbert")).await.unwrap();

        assert!(ids(&index, "").await.is_empty());
        assert!(ids(&index, "   ").await.is_empty());
        assert!(index.query("dune", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_twice_is_an_upsert() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "First title", "")).await.unwrap();
        index.index(book(1, "Second title", "")).await.unwrap();

        assert_eq!(index.num_docs(), 1);
        assert!(ids(&index, "first").await.is_empty());
        assert_eq!(ids(&index, "second").await, vec![1]);
    }

    #[tokio::test]
    async fn test_reindex_replaces_fields() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(9, "editable book", "")).await.unwrap();
        index.reindex(book(9, "edited volume", "")).await.unwrap();

        assert!(ids(&index, "editable").await.is_empty());
        assert_eq!(ids(&index, "volume").await, vec![9]);
        assert_eq!(index.num_docs(), 1);
    }

    #[tokio::test]
    async fn test_reindex_missing_document_is_noop() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.reindex(book(11, "ghost", "")).await.unwrap();

        assert_eq!(index.num_docs(), 0);
        assert!(ids(&index, "ghost").await.is_empty());
    }

    #[tokio::test]
    async fn test_unindex_removes_and_is_idempotent() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "still alive", "")).await.unwrap();
        assert_eq!(ids(&index, "alive").await, vec![1]);

        index.unindex(1).await.unwrap();
        assert!(ids(&index, "alive").await.is_empty());

        index.unindex(1).await.unwrap();
        index.unindex(12345).await.unwrap();
        assert_eq!(index.num_docs(), 0);
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        let doc = IndexDocument::new(1).field("login", "nope");

        let err = index.index(doc).await.unwrap_err();
        assert!(matches!(err, IndexError::UnknownField(f) if f == "login"));
        assert_eq!(index.num_docs(), 0);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_everything() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        index.index(book(1, "orphan", "")).await.unwrap();

        let count = index
            .rebuild(vec![book(2, "Solaris", "Lem"), book(3, "Eden", "Lem")])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(index.num_docs(), 2);
        assert!(ids(&index, "orphan").await.is_empty());

        let mut lem = ids(&index, "lem").await;
        lem.sort();
        assert_eq!(lem, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_reader_snapshot_predates_later_commit() {
        let index = TantivyIndex::in_ram(EntityKind::Book).unwrap();
        let before = index.reader.searcher();

        index.index(book(1, "Roadside Picnic", "")).await.unwrap();

        assert_eq!(before.num_docs(), 0);
        assert_eq!(index.reader.searcher().num_docs(), 1);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books");

        {
            let index = TantivyIndex::open(EntityKind::Book, &path, 15_000_000).unwrap();
            index.index(book(21, "Persistent title", "")).await.unwrap();
        }

        let index = TantivyIndex::open(EntityKind::Book, &path, 15_000_000).unwrap();
        assert_eq!(index.num_docs(), 1);
        assert_eq!(ids(&index, "persistent").await, vec![21]);
    }

    #[tokio::test]
    async fn test_second_writer_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users");

        let _first = TantivyIndex::open(EntityKind::User, &path, 15_000_000).unwrap();
        let second = TantivyIndex::open(EntityKind::User, &path, 15_000_000);

        assert!(matches!(second, Err(IndexError::Open(_))));
    }
}
