//! In-memory [`RecordStore`] and [`SearchIndex`] implementations.
//!
//! Maps behind `parking_lot::RwLock` for thread safety. Used by tests and
//! by embedders that do not need durability.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, IdentityConflict, Result};
use crate::models::Sighting;
use crate::page::{compare_by, Page, PageRequest, SortField};
use crate::query::SearchQuery;

use super::matcher::{DocMap, IndexedDoc, Matcher};
use super::{RecordStore, SearchIndex};

/// In-memory record store. Ids are UUID v4 strings.
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, Sighting>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, sighting: &Sighting) -> Result<Sighting> {
        if sighting.is_persisted() {
            return Err(IdentityConflict::AlreadyAssigned.into());
        }
        let id = Uuid::new_v4().to_string();
        let stored = sighting.clone().with_id(id.clone());
        self.records.write().insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, sighting: &Sighting) -> Result<Sighting> {
        let id = sighting.id().ok_or(IdentityConflict::Missing)?;
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(existing) => {
                *existing = sighting.clone();
                Ok(existing.clone())
            }
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn get(&self, id: &str) -> Result<Sighting> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.records.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn list_page(&self, request: &PageRequest) -> Result<Page<Sighting>> {
        let mut all: Vec<Sighting> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| compare_by(&request.sort, a, b));
        Ok(Page::from_sorted(all, request))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().len() as u64)
    }
}

/// In-memory search index using [`Matcher`] for query evaluation.
pub struct InMemorySearchIndex {
    docs: RwLock<DocMap>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// The indexed copy of `id`, if any.
    pub fn document(&self, id: &str) -> Option<Sighting> {
        self.docs.read().get(id).map(|(s, _)| s.clone())
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn index(&self, sighting: &Sighting) -> Result<()> {
        let id = sighting.id().ok_or(IdentityConflict::Missing)?;
        let doc = IndexedDoc::new(sighting);
        self.docs
            .write()
            .insert(id.to_string(), (sighting.clone(), doc));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.docs.write().remove(id);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery, request: &PageRequest) -> Result<Page<Sighting>> {
        let matcher = match query {
            SearchQuery::MatchAll => None,
            SearchQuery::Native(text) => Some(Matcher::parse(text)?),
        };

        let mut hits: Vec<(u32, Sighting)> = self
            .docs
            .read()
            .values()
            .filter_map(|(sighting, doc)| match &matcher {
                None => Some((0, sighting.clone())),
                Some(m) => {
                    let score = m.score(doc);
                    (score > 0).then(|| (score, sighting.clone()))
                }
            })
            .collect();

        hits.sort_by(|(score_a, a), (score_b, b)| {
            request
                .sort
                .iter()
                .map(|o| o.compare(a, b))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| score_b.cmp(score_a))
                .then_with(|| SortField::Id.compare(a, b))
        });

        Ok(Page::from_sorted(
            hits.into_iter().map(|(_, s)| s).collect(),
            request,
        ))
    }
}
