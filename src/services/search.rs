//! Search read path and index reconciliation

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    repository::Repository,
    search::{Indexable, SearchIndex, SearchIndexes},
};

/// Candidate ids for `text`, best first. Blank text yields none.
pub async fn candidate_ids(index: &dyn SearchIndex, text: &str, limit: usize) -> AppResult<Vec<i32>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let hits = index.query(text, limit).await?;
    Ok(hits.into_iter().map(|hit| hit.id).collect())
}

/// Arrange store rows in index rank order. Ids the store no longer returns
/// (deleted, or filtered out by authorization) are dropped.
pub fn order_by_rank<T>(ranked: &[i32], rows: Vec<T>, id_of: impl Fn(&T) -> i32) -> Vec<T> {
    let mut by_id: HashMap<i32, T> = rows.into_iter().map(|row| (id_of(&row), row)).collect();
    ranked.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// One page of an in-memory result list, with the total
pub fn page_of<T>(items: Vec<T>, limit: i64, offset: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect();
    (page, total)
}

/// Documents written by a full rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RebuildReport {
    pub books: usize,
    pub users: usize,
}

/// Rebuilds the index mirror from the database
#[derive(Clone)]
pub struct SearchService {
    repository: Repository,
    indexes: SearchIndexes,
}

impl SearchService {
    pub fn new(repository: Repository, indexes: SearchIndexes) -> Self {
        Self { repository, indexes }
    }

    pub fn indexes(&self) -> &SearchIndexes {
        &self.indexes
    }

    /// Replace every index's content with the current database rows.
    ///
    /// Writes racing with a rebuild may be overwritten by the snapshot taken
    /// here; the next rebuild repairs them.
    pub async fn rebuild_all(&self) -> AppResult<RebuildReport> {
        let books = self.repository.books.list_all().await?;
        let books = self
            .indexes
            .books
            .rebuild(books.iter().map(Indexable::to_document).collect())
            .await?;

        let users = self.repository.users.list_all().await?;
        let users = self
            .indexes
            .users
            .rebuild(users.iter().map(Indexable::to_document).collect())
            .await?;

        let report = RebuildReport { books, users };
        tracing::info!(books = report.books, users = report.users, "Search indexes rebuilt");
        Ok(report)
    }

    /// Rebuild every `period` until the process exits
    pub async fn run_periodic(self, period: Duration) {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the first immediate tick
        timer.tick().await;

        tracing::info!(period_secs = period.as_secs(), "Periodic reindex started");

        loop {
            timer.tick().await;
            if let Err(e) = self.rebuild_all().await {
                tracing::warn!(error = %e, "Periodic reindex failed (non-fatal)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{IndexError, MockSearchIndex, SearchHit};

    #[test]
    fn test_order_by_rank_drops_missing() {
        let rows = vec![(1, "a"), (2, "b"), (3, "c")];
        let ordered = order_by_rank(&[3, 9, 1], rows, |row| row.0);
        assert_eq!(ordered, vec![(3, "c"), (1, "a")]);
    }

    #[test]
    fn test_page_of() {
        let (page, total) = page_of((1..=25).collect::<Vec<_>>(), 10, 20);
        assert_eq!(page, vec![21, 22, 23, 24, 25]);
        assert_eq!(total, 25);

        let (page, total) = page_of(vec![1, 2], 10, 40);
        assert!(page.is_empty());
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_blank_text_skips_index() {
        let mut index = MockSearchIndex::new();
        index.expect_query().never();

        assert!(candidate_ids(&index, "  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_candidate_ids_keep_rank() {
        let mut index = MockSearchIndex::new();
        index.expect_query().times(1).returning(|_, _| {
            Ok(vec![
                SearchHit { id: 4, score: 3.5 },
                SearchHit { id: 2, score: 1.0 },
            ])
        });

        assert_eq!(candidate_ids(&index, "lem", 10).await.unwrap(), vec![4, 2]);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let mut index = MockSearchIndex::new();
        index
            .expect_query()
            .returning(|_, _| Err(IndexError::Query("corrupt segment".into())));

        assert!(candidate_ids(&index, "lem", 10).await.is_err());
    }
}
