//! SQLite FTS5-backed [`SearchIndex`] implementation.
//!
//! Lives in its own database file. Each record is held twice:
//!
//! - `sighting_documents`: typed columns, used for sorting and for
//!   returning hits;
//! - `sighting_fts`: an FTS5 table whose columns carry the JSON field
//!   names, so the engine's `field:term` filter syntax works unchanged.
//!
//! Hits are ranked by FTS5 `rank` (BM25, lower is better). Sort terms in
//! the request take precedence over rank.

use async_trait::async_trait;
use sqlx::SqlitePool;

use sightings_core::error::{Error, IdentityConflict, Result};
use sightings_core::models::{format_timestamp, Sighting};
use sightings_core::page::{Page, PageRequest};
use sightings_core::query::SearchQuery;
use sightings_core::store::{searchable_text, SearchIndex};

use crate::sqlite_store::{
    limit_offset, order_terms, sighting_from_row, storage_err, SIGHTING_COLUMNS,
};

/// SQLite implementation of the [`SearchIndex`] trait.
pub struct SqliteSearchIndex {
    pool: SqlitePool,
}

impl SqliteSearchIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn match_all(&self, request: &PageRequest) -> Result<Page<Sighting>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sighting_documents")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut order = order_terms(&request.sort, "");
        order.push("\"id\" ASC".to_string());
        let sql = format!(
            "SELECT {} FROM sighting_documents ORDER BY {} LIMIT ? OFFSET ?",
            SIGHTING_COLUMNS,
            order.join(", ")
        );

        let (limit, offset) = limit_offset(request);
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let content = rows
            .iter()
            .map(sighting_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, request, total.max(0) as u64))
    }

    async fn native(&self, query: &str, request: &PageRequest) -> Result<Page<Sighting>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sighting_fts WHERE sighting_fts MATCH ?")
                .bind(query)
                .fetch_one(&self.pool)
                .await
                .map_err(query_err)?;

        let mut order = order_terms(&request.sort, "d.");
        order.push("m.score ASC".to_string());
        order.push("d.\"id\" ASC".to_string());

        let columns = SIGHTING_COLUMNS
            .split(", ")
            .map(|c| format!("d.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {}
            FROM (
                SELECT id, rank AS score
                FROM sighting_fts
                WHERE sighting_fts MATCH ?
            ) m
            JOIN sighting_documents d ON d.id = m.id
            ORDER BY {}
            LIMIT ? OFFSET ?
            "#,
            columns,
            order.join(", ")
        );

        let (limit, offset) = limit_offset(request);
        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        let content = rows
            .iter()
            .map(sighting_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(content, request, total.max(0) as u64))
    }
}

/// FTS5 reports malformed MATCH expressions as ordinary database errors;
/// separate those from backend failures.
fn query_err(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        let msg = db.message();
        if is_match_syntax_message(msg) {
            return Error::QuerySyntax(msg.to_string());
        }
    }
    storage_err(err)
}

fn is_match_syntax_message(msg: &str) -> bool {
    ["fts5", "no such column", "unterminated string", "malformed MATCH"]
        .iter()
        .any(|needle| msg.contains(needle))
}

#[async_trait]
impl SearchIndex for SqliteSearchIndex {
    async fn index(&self, sighting: &Sighting) -> Result<()> {
        let id = sighting.id().ok_or(IdentityConflict::Missing)?;
        let text = searchable_text(sighting);

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO sighting_documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                observer_id = excluded.observer_id,
                occurred_at = excluded.occurred_at,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                count = excluded.count,
                heading = excluded.heading,
                notes = excluded.notes
            "#,
            SIGHTING_COLUMNS
        ))
        .bind(id)
        .bind(sighting.subject_id)
        .bind(sighting.observer_id)
        .bind(format_timestamp(&sighting.occurred_at))
        .bind(sighting.latitude)
        .bind(sighting.longitude)
        .bind(sighting.count)
        .bind(sighting.heading.map(|h| h.as_str()))
        .bind(&sighting.notes)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query("DELETE FROM sighting_fts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        let mut insert = sqlx::query(
            r#"
            INSERT INTO sighting_fts
                (id, subjectId, observerId, occurredAt, latitude, longitude, "count", heading, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id);
        for value in text {
            insert = insert.bind(value);
        }
        insert.execute(&mut *tx).await.map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query("DELETE FROM sighting_fts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM sighting_documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery, request: &PageRequest) -> Result<Page<Sighting>> {
        match query {
            SearchQuery::MatchAll => self.match_all(request).await,
            SearchQuery::Native(text) => self.native(text, request).await,
        }
    }
}
