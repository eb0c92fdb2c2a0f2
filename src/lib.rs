//! # Sightings
//!
//! Sighting records kept in a relational store and mirrored into a
//! free-text search index.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐   commit    ┌──────────────┐
//!  CLI / HTTP ───▶│ Synchronizer │────────────▶│ Record store │  sighting
//!                 │              │             └──────────────┘
//!                 │              │  propagate  ┌──────────────┐
//!                 │              │────────────▶│ Search index │  sighting_fts
//!                 └──────────────┘             └──────────────┘
//! ```
//!
//! Writes commit to the record store first; the index follows, and a
//! failed index write is logged and counted but never surfaced or retried.
//! Lists and lookups read the record store, free-text search reads the
//! index.
//!
//! ## Quick Start
//!
//! ```bash
//! sightings init
//! sightings create '{"subjectId":1,"observerId":2,"occurredAt":"2024-05-01T12:00:00Z","latitude":51.5,"longitude":-0.1,"notes":"two by the river"}'
//! sightings search 'notes:river'
//! sightings serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite record store |
//! | [`sqlite_index`] | SQLite FTS5 search index |
//! | [`backend`] | Synchronizer over both SQLite backends |
//! | [`records`] | CLI record commands |
//! | [`search`] | CLI search command |
//! | [`server`] | HTTP server |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! Model, validation, pagination, and synchronization logic live in the
//! `sightings-core` crate.

pub mod backend;
pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod records;
pub mod search;
pub mod server;
pub mod sqlite_index;
pub mod sqlite_store;
