//! Storage abstraction for Sightings.
//!
//! Two independent backends hold every record:
//!
//! | Trait | Role | Consistency |
//! |-------|------|-------------|
//! | [`RecordStore`] | source of truth, identity and pagination | durable on return |
//! | [`SearchIndex`] | denormalised copy, free-text relevance search | eventually consistent |
//!
//! Nothing here keeps the two in step; that is the job of the
//! [`Synchronizer`](crate::sync::Synchronizer).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod matcher;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{format_timestamp, Sighting};
use crate::page::{Page, PageRequest};
use crate::query::SearchQuery;

/// Primary durable store of sightings.
///
/// # Operations
///
/// | Method | Failure |
/// |--------|---------|
/// | [`create`](RecordStore::create) | id already set |
/// | [`update`](RecordStore::update) | id unset, or unknown id (`NotFound`) |
/// | [`get`](RecordStore::get) | unknown id (`NotFound`) |
/// | [`delete`](RecordStore::delete) | unknown id (`NotFound`) |
/// | [`list_page`](RecordStore::list_page) | backend failure only |
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it with its assigned id.
    async fn create(&self, sighting: &Sighting) -> Result<Sighting>;

    /// Replace every field of an existing record.
    async fn update(&self, sighting: &Sighting) -> Result<Sighting>;

    async fn get(&self, id: &str) -> Result<Sighting>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// One page ordered by the request's sort terms, then by id.
    async fn list_page(&self, request: &PageRequest) -> Result<Page<Sighting>>;

    async fn count(&self) -> Result<u64>;
}

/// Secondary free-text index of sightings.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the document for `sighting.id`.
    async fn index(&self, sighting: &Sighting) -> Result<()>;

    /// Remove the document for `id`; absent ids are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Ranked page of matches, ordered by the request's sort terms first
    /// when any are given, then by relevance, then by id.
    async fn search(&self, query: &SearchQuery, request: &PageRequest) -> Result<Page<Sighting>>;
}

/// Column names of the free-text document, in index order.
pub const SEARCH_COLUMNS: [&str; 8] = [
    "subjectId",
    "observerId",
    "occurredAt",
    "latitude",
    "longitude",
    "count",
    "heading",
    "notes",
];

/// The text each search column holds for a record. Unset optional fields
/// index as empty text.
pub fn searchable_text(sighting: &Sighting) -> [String; 8] {
    [
        sighting.subject_id.to_string(),
        sighting.observer_id.to_string(),
        format_timestamp(&sighting.occurred_at),
        format!("{:?}", sighting.latitude),
        format!("{:?}", sighting.longitude),
        sighting.count.map(|c| c.to_string()).unwrap_or_default(),
        sighting
            .heading
            .map(|h| h.as_str().to_string())
            .unwrap_or_default(),
        sighting.notes.clone().unwrap_or_default(),
    ]
}
