//! # Sightings Core
//!
//! Runtime-agnostic logic for Sightings: the record model and its
//! validation, the pagination engine, the query translator, the store and
//! index traits with in-memory implementations, and the [`Synchronizer`]
//! that keeps the two stores in step.
//!
//! This crate contains no sqlx, HTTP, or filesystem I/O. The `sightings`
//! crate supplies SQLite backends, configuration, the CLI, and the server.

pub mod error;
pub mod models;
pub mod page;
pub mod query;
pub mod store;
pub mod sync;
pub mod validate;

pub use error::{Error, IdentityConflict, Result, ValidationError};
pub use models::{Heading, Sighting, SightingId};
pub use page::{Direction, Page, PageRequest, PaginationHeaders, SortField, SortOrder};
pub use query::{translate_query, SearchQuery};
pub use store::{RecordStore, SearchIndex};
pub use sync::{PropagationStats, Synchronizer};
