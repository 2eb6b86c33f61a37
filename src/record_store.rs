//! Deduplicating persistence for raw candidate records.
//!
//! The `records` table is owned exclusively by this store. Rows are immutable
//! once inserted and keyed by fingerprint, so re-inserting an already-seen
//! record is a silent no-op rather than an error.

use chrono::DateTime;
use sqlx::{Row, SqlitePool};

use crate::error::PipelineError;
use crate::models::RawRecord;

#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the records whose fingerprints are not yet present, all in one
    /// transaction. Returns the subset actually inserted, preserving input
    /// order. Duplicates are skipped silently; only storage faults error.
    pub async fn insert_if_absent(
        &self,
        records: &[RawRecord],
    ) -> Result<Vec<RawRecord>, PipelineError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::new();

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO records
                    (fingerprint, source, external_id, title, body, url, published_at, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.fingerprint)
            .bind(&record.source)
            .bind(&record.external_id)
            .bind(&record.title)
            .bind(&record.body)
            .bind(&record.url)
            .bind(record.published_at.timestamp())
            .bind(record.fetched_at.timestamp())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted.push(record.clone());
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Records with no insight row for `model`, oldest published first so the
    /// backlog drains in order.
    pub async fn unanalyzed(
        &self,
        model: &str,
        limit: usize,
    ) -> Result<Vec<RawRecord>, PipelineError> {
        let rows = sqlx::query(
            r#"
            SELECT r.fingerprint, r.source, r.external_id, r.title, r.body, r.url,
                   r.published_at, r.fetched_at
            FROM records r
            LEFT JOIN insights i ON i.fingerprint = r.fingerprint AND i.model = ?
            WHERE i.fingerprint IS NULL
            ORDER BY r.published_at ASC
            LIMIT ?
            "#,
        )
        .bind(model)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<RawRecord>, PipelineError> {
        let row = sqlx::query("SELECT * FROM records WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_record))
    }

    pub async fn count(&self) -> Result<i64, PipelineError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> RawRecord {
    RawRecord {
        fingerprint: row.get("fingerprint"),
        source: row.get("source"),
        external_id: row.get("external_id"),
        title: row.get("title"),
        body: row.get("body"),
        url: row.get("url"),
        published_at: DateTime::from_timestamp(row.get("published_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
        fetched_at: DateTime::from_timestamp(row.get("fetched_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
    }
}
