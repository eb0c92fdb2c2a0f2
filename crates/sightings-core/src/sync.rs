//! Synchronizer: keeps the record store and the search index in step.
//!
//! Every write runs as a two-step pipeline:
//!
//! 1. **commit**: apply the change to the [`RecordStore`]. A failure here
//!    fails the whole operation and the index is never touched.
//! 2. **propagate**: mirror the change into the [`SearchIndex`]. A failure
//!    here is logged, counted, and otherwise dropped. The caller still sees
//!    success and nothing retries it.
//!
//! The index therefore lags the store whenever propagation fails, until the
//! next successful write to the same id replaces the stale document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, IdentityConflict, Result};
use crate::models::Sighting;
use crate::page::{Page, PageRequest};
use crate::query::translate_query;
use crate::store::{RecordStore, SearchIndex};

/// Snapshot of the propagation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropagationStats {
    pub attempted: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempted: AtomicU64,
    failed: AtomicU64,
}

/// Outcome of the second pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    Applied,
    /// The index rejected the change; the message was logged and dropped.
    Absorbed(String),
}

impl Propagation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Propagation::Applied)
    }
}

enum IndexOp<'a> {
    Upsert(&'a Sighting),
    Remove(&'a str),
}

pub struct Synchronizer {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    counters: Counters,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<dyn SearchIndex>) -> Self {
        Self {
            store,
            index,
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Persist a new sighting and mirror it into the index.
    pub async fn create(&self, sighting: &Sighting) -> Result<Sighting> {
        debug!(?sighting, "request to create sighting");
        if sighting.is_persisted() {
            return Err(IdentityConflict::AlreadyAssigned.into());
        }
        sighting.validate()?;

        let saved = self.store.create(sighting).await?;
        self.propagate(IndexOp::Upsert(&saved)).await;
        Ok(saved)
    }

    /// Replace an existing sighting and mirror it into the index.
    pub async fn update(&self, sighting: &Sighting) -> Result<Sighting> {
        debug!(?sighting, "request to update sighting");
        if !sighting.is_persisted() {
            return Err(IdentityConflict::Missing.into());
        }
        sighting.validate()?;

        let saved = self.store.update(sighting).await?;
        self.propagate(IndexOp::Upsert(&saved)).await;
        Ok(saved)
    }

    /// Remove a sighting from the store, then from the index.
    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "request to delete sighting");
        self.store.delete(id).await?;
        self.propagate(IndexOp::Remove(id)).await;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Sighting> {
        debug!(id, "request to get sighting");
        self.store.get(id).await
    }

    pub async fn list_page(&self, request: &PageRequest) -> Result<Page<Sighting>> {
        debug!(
            page = request.page,
            size = request.size,
            "request to list sightings"
        );
        self.store.list_page(request).await
    }

    /// Free-text search against the index. Results reflect the index, which
    /// may lag the store.
    pub async fn search(&self, raw: &str, request: &PageRequest) -> Result<Page<Sighting>> {
        debug!(
            query = raw,
            page = request.page,
            size = request.size,
            "request to search sightings"
        );
        let query = translate_query(raw)?;
        self.index.search(&query, request).await
    }

    pub fn stats(&self) -> PropagationStats {
        PropagationStats {
            attempted: self.counters.attempted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    async fn propagate(&self, op: IndexOp<'_>) -> Propagation {
        self.counters.attempted.fetch_add(1, Ordering::Relaxed);
        let (id, result) = match op {
            IndexOp::Upsert(sighting) => {
                let id = sighting.id().unwrap_or_default();
                (id, self.index.index(sighting).await)
            }
            IndexOp::Remove(id) => (id, self.index.delete(id).await),
        };

        match result {
            Ok(()) => Propagation::Applied,
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let err = match err {
                    Error::IndexPropagation(_) => err,
                    other => Error::IndexPropagation(other.to_string()),
                };
                warn!(id, error = %err, "search index out of step with record store");
                Propagation::Absorbed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Heading;
    use crate::page::{SortField, SortOrder};
    use crate::query::SearchQuery;
    use crate::store::memory::{InMemoryRecordStore, InMemorySearchIndex};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    /// Index that refuses every write and counts how often it was asked.
    #[derive(Default)]
    struct FailingIndex {
        calls: AtomicU64,
    }

    #[async_trait]
    impl SearchIndex for FailingIndex {
        async fn index(&self, _sighting: &Sighting) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::IndexPropagation("index unavailable".into()))
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Storage("disk full".into()))
        }

        async fn search(&self, _q: &SearchQuery, _r: &PageRequest) -> Result<Page<Sighting>> {
            Err(Error::IndexPropagation("index unavailable".into()))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn create(&self, _s: &Sighting) -> Result<Sighting> {
            Err(Error::Storage("connection refused".into()))
        }
        async fn update(&self, _s: &Sighting) -> Result<Sighting> {
            Err(Error::Storage("connection refused".into()))
        }
        async fn get(&self, id: &str) -> Result<Sighting> {
            Err(Error::NotFound(id.to_string()))
        }
        async fn delete(&self, _id: &str) -> Result<()> {
            Err(Error::Storage("connection refused".into()))
        }
        async fn list_page(&self, _r: &PageRequest) -> Result<Page<Sighting>> {
            Err(Error::Storage("connection refused".into()))
        }
        async fn count(&self) -> Result<u64> {
            Err(Error::Storage("connection refused".into()))
        }
    }

    fn in_memory() -> (Synchronizer, Arc<InMemoryRecordStore>, Arc<InMemorySearchIndex>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        (Synchronizer::new(store.clone(), index.clone()), store, index)
    }

    fn sample() -> Sighting {
        Sighting::new(0, 0, DateTime::<Utc>::UNIX_EPOCH, 1.0, 1.0)
            .with_count(0)
            .with_heading(Heading::Stationary)
            .with_notes("AAAAAAAAAA")
    }

    fn first_page(size: u32) -> PageRequest {
        PageRequest::new(0, size).unwrap()
    }

    #[tokio::test]
    async fn create_get_delete_scenario() {
        let (sync, _, index) = in_memory();
        let created = sync.create(&sample()).await.unwrap();
        let id = created.id().unwrap().to_string();

        let fetched = sync.get(&id).await.unwrap();
        assert!(fetched.same_fields(&sample().with_id(id.clone())));
        assert_eq!(index.len(), 1);

        sync.delete(&id).await.unwrap();
        assert_eq!(sync.get(&id).await.unwrap_err().code(), "not_found");
        assert!(index.is_empty());
        assert_eq!(sync.stats(), PropagationStats { attempted: 2, failed: 0 });
    }

    #[tokio::test]
    async fn create_with_id_touches_neither_store() {
        let (sync, store, index) = in_memory();
        let err = sync.create(&sample().with_id("x")).await.unwrap_err();
        assert_eq!(err.code(), "idexists");
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(index.is_empty());
        assert_eq!(sync.stats().attempted, 0);
    }

    #[tokio::test]
    async fn update_without_id_is_rejected() {
        let (sync, store, _) = in_memory();
        sync.create(&sample()).await.unwrap();
        let err = sync.update(&sample()).await.unwrap_err();
        assert_eq!(err.code(), "idnull");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_record_is_rejected_before_commit() {
        let (sync, store, _) = in_memory();
        let mut bad = sample();
        bad.latitude = f64::NAN;
        let err = sync.create(&bad).await.unwrap_err();
        assert_eq!(err.code(), "validation");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_is_searchable_by_new_term() {
        let (sync, _, _) = in_memory();
        let mut created = sync.create(&sample()).await.unwrap();
        created.notes = Some("pterodactyl".into());
        sync.update(&created).await.unwrap();

        let page = sync.search("notes:pterodactyl", &first_page(10)).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0], created);

        let stale = sync.search("AAAAAAAAAA", &first_page(10)).await.unwrap();
        assert_eq!(stale.total_elements, 0);
    }

    #[tokio::test]
    async fn failing_index_is_absorbed() {
        let store = Arc::new(InMemoryRecordStore::new());
        let index = Arc::new(FailingIndex::default());
        let sync = Synchronizer::new(store.clone(), index.clone());

        let created = sync.create(&sample()).await.unwrap();
        let id = created.id().unwrap().to_string();
        assert_eq!(store.count().await.unwrap(), 1);

        let mut changed = created.clone();
        changed.count = Some(7);
        sync.update(&changed).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().count, Some(7));

        sync.delete(&id).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        assert_eq!(sync.stats(), PropagationStats { attempted: 3, failed: 3 });
        // one call per write, never retried
        assert_eq!(index.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagate_reports_absorbed_failure() {
        let sync = Synchronizer::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(FailingIndex::default()),
        );
        let outcome = sync.propagate(IndexOp::Remove("abc")).await;
        assert!(!outcome.is_applied());
        assert!(matches!(outcome, Propagation::Absorbed(ref msg) if msg.contains("disk full")));
    }

    #[tokio::test]
    async fn failing_store_leaves_index_untouched() {
        let index = Arc::new(InMemorySearchIndex::new());
        let sync = Synchronizer::new(Arc::new(FailingStore), index.clone());

        assert_eq!(sync.create(&sample()).await.unwrap_err().code(), "storage");
        assert_eq!(
            sync.update(&sample().with_id("a")).await.unwrap_err().code(),
            "storage"
        );

        index.index(&sample().with_id("kept")).await.unwrap();
        assert_eq!(sync.delete("kept").await.unwrap_err().code(), "storage");
        assert!(index.document("kept").is_some());
        assert_eq!(sync.stats().attempted, 0);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let (sync, _, _) = in_memory();
        assert_eq!(sync.delete("missing").await.unwrap_err().code(), "not_found");
        assert_eq!(sync.stats().attempted, 0);
    }

    #[tokio::test]
    async fn page_boundary_over_n_plus_one_records() {
        let (sync, _, _) = in_memory();
        let n = 4;
        for subject in 0..=n {
            let mut s = sample();
            s.subject_id = subject;
            sync.create(&s).await.unwrap();
        }
        let sort = vec![SortOrder::asc(SortField::SubjectId)];

        let first = sync
            .list_page(&first_page(n as u32).with_sort(sort.clone()))
            .await
            .unwrap();
        assert_eq!(first.content.len(), n as usize);
        assert_eq!(first.total_elements, n as u64 + 1);

        let second = sync
            .list_page(&PageRequest::new(1, n as u32).unwrap().with_sort(sort))
            .await
            .unwrap();
        assert_eq!(second.content.len(), 1);
        assert_eq!(second.content[0].subject_id, n);
    }

    #[tokio::test]
    async fn search_after_delete_finds_nothing() {
        let (sync, _, _) = in_memory();
        let created = sync.create(&sample()).await.unwrap();
        sync.delete(created.id().unwrap()).await.unwrap();
        let page = sync.search("AAAAAAAAAA", &first_page(10)).await.unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 0);
    }

    #[tokio::test]
    async fn blank_search_is_a_syntax_error() {
        let (sync, _, _) = in_memory();
        assert_eq!(
            sync.search("  ", &first_page(10)).await.unwrap_err().code(),
            "query_syntax"
        );
    }
}
