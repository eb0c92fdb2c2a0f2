//! Schema creation for the record store and the search index.
//!
//! Both are idempotent. The record store and the index live in separate
//! database files, each with its own schema.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create both schemas from config.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let records = db::connect(&config.db.path).await?;
    migrate_records(&records).await?;
    records.close().await;

    let index = db::connect(&config.index.path).await?;
    migrate_index(&index).await?;
    index.close().await;
    Ok(())
}

pub async fn migrate_records(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sighting (
            id TEXT PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            observer_id INTEGER NOT NULL,
            occurred_at TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            count INTEGER,
            heading TEXT,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sighting_occurred_at ON sighting(occurred_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sighting_subject_id ON sighting(subject_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn migrate_index(pool: &SqlitePool) -> Result<()> {
    // Typed copy of each document, used for sorting and for returning hits
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sighting_documents (
            id TEXT PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            observer_id INTEGER NOT NULL,
            occurred_at TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            count INTEGER,
            heading TEXT,
            notes TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='sighting_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        // Column names match the JSON field names so `field:term` filters
        // can be passed straight through.
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE sighting_fts USING fts5(
                id UNINDEXED,
                subjectId,
                observerId,
                occurredAt,
                latitude,
                longitude,
                "count",
                heading,
                notes
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}
