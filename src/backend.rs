//! Wiring of the SQLite record store and search index into a
//! [`Synchronizer`].

use anyhow::Result;
use std::sync::Arc;

use sightings_core::sync::Synchronizer;

use crate::config::Config;
use crate::db;
use crate::migrate::{migrate_index, migrate_records};
use crate::sqlite_index::SqliteSearchIndex;
use crate::sqlite_store::SqliteRecordStore;

/// Connect both databases, ensure their schemas, and return a synchronizer
/// over them.
pub async fn open(config: &Config) -> Result<Synchronizer> {
    let records = db::connect(&config.db.path).await?;
    migrate_records(&records).await?;

    let index = db::connect(&config.index.path).await?;
    migrate_index(&index).await?;

    tracing::debug!(
        db = %config.db.path.display(),
        index = %config.index.path.display(),
        "opened record store and search index"
    );

    Ok(Synchronizer::new(
        Arc::new(SqliteRecordStore::new(records)),
        Arc::new(SqliteSearchIndex::new(index)),
    ))
}
