//! SQLite-backed [`RecordStore`] implementation.
//!
//! One row per sighting in the `sighting` table. Timestamps are stored as
//! fixed-width RFC 3339 text so that lexical order equals time order.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use sightings_core::error::{Error, IdentityConflict, Result};
use sightings_core::models::{format_timestamp, parse_timestamp, Heading, Sighting};
use sightings_core::page::{Page, PageRequest, SortOrder};
use sightings_core::store::RecordStore;

/// Columns shared by the record table and the index document table.
pub(crate) const SIGHTING_COLUMNS: &str =
    "id, subject_id, observer_id, occurred_at, latitude, longitude, count, heading, notes";

/// SQLite implementation of the [`RecordStore`] trait.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn storage_err(err: sqlx::Error) -> Error {
    Error::Storage(err.to_string())
}

/// `ORDER BY` terms for the requested sort, each column qualified with
/// `prefix` (e.g. `"d."`).
pub(crate) fn order_terms(sort: &[SortOrder], prefix: &str) -> Vec<String> {
    sort.iter()
        .map(|o| {
            format!(
                "{}\"{}\" {}",
                prefix,
                o.field.column(),
                o.direction.as_sql()
            )
        })
        .collect()
}

pub(crate) fn limit_offset(request: &PageRequest) -> (i64, i64) {
    let limit = i64::try_from(request.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(request.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

pub(crate) fn sighting_from_row(row: &SqliteRow) -> Result<Sighting> {
    let occurred_at: String = row.try_get("occurred_at").map_err(storage_err)?;
    let heading: Option<String> = row.try_get("heading").map_err(storage_err)?;

    Ok(Sighting {
        id: Some(row.try_get("id").map_err(storage_err)?),
        subject_id: row.try_get("subject_id").map_err(storage_err)?,
        observer_id: row.try_get("observer_id").map_err(storage_err)?,
        occurred_at: parse_timestamp(&occurred_at)
            .map_err(|e| Error::Storage(format!("corrupt occurred_at: {}", e)))?,
        latitude: row.try_get("latitude").map_err(storage_err)?,
        longitude: row.try_get("longitude").map_err(storage_err)?,
        count: row.try_get("count").map_err(storage_err)?,
        heading: heading
            .map(|h| h.parse::<Heading>())
            .transpose()
            .map_err(|e| Error::Storage(format!("corrupt heading: {}", e)))?,
        notes: row.try_get("notes").map_err(storage_err)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, sighting: &Sighting) -> Result<Sighting> {
        if sighting.is_persisted() {
            return Err(IdentityConflict::AlreadyAssigned.into());
        }
        let stored = sighting.clone().with_id(Uuid::new_v4().to_string());

        sqlx::query(&format!(
            "INSERT INTO sighting ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SIGHTING_COLUMNS
        ))
        .bind(&stored.id)
        .bind(stored.subject_id)
        .bind(stored.observer_id)
        .bind(format_timestamp(&stored.occurred_at))
        .bind(stored.latitude)
        .bind(stored.longitude)
        .bind(stored.count)
        .bind(stored.heading.map(|h| h.as_str()))
        .bind(&stored.notes)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(stored)
    }

    async fn update(&self, sighting: &Sighting) -> Result<Sighting> {
        let id = sighting.id().ok_or(IdentityConflict::Missing)?;

        let result = sqlx::query(
            r#"
            UPDATE sighting SET
                subject_id = ?,
                observer_id = ?,
                occurred_at = ?,
                latitude = ?,
                longitude = ?,
                count = ?,
                heading = ?,
                notes = ?
            WHERE id = ?
            "#,
        )
        .bind(sighting.subject_id)
        .bind(sighting.observer_id)
        .bind(format_timestamp(&sighting.occurred_at))
        .bind(sighting.latitude)
        .bind(sighting.longitude)
        .bind(sighting.count)
        .bind(sighting.heading.map(|h| h.as_str()))
        .bind(&sighting.notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(sighting.clone())
    }

    async fn get(&self, id: &str) -> Result<Sighting> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sighting WHERE id = ?",
            SIGHTING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => sighting_from_row(&row),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sighting WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_page(&self, request: &PageRequest) -> Result<Page<Sighting>> {
        let total = self.count().await?;

        let mut order = order_terms(&request.sort, "");
        order.push("\"id\" ASC".to_string());
        let sql = format!(
            "SELECT {} FROM sighting ORDER BY {} LIMIT ? OFFSET ?",
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
        Ok(Page::new(content, request, total))
    }

    async fn count(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sighting")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(total.max(0) as u64)
    }
}
