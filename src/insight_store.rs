//! Persistence for analysis results and their delivery status.
//!
//! The `insights` table is owned exclusively by this store; it is the only
//! writer of the `status` column. Status transitions are forward only, which
//! the guarded `UPDATE` in [`InsightStore::set_status`] enforces: a row that
//! reached `delivered` (or `skipped`) never changes again.

use chrono::DateTime;
use sqlx::{Row, SqlitePool};

use crate::error::PipelineError;
use crate::models::{DeliveryStatus, InsightPayload, InsightRecord};

#[derive(Clone)]
pub struct InsightStore {
    pool: SqlitePool,
}

impl InsightStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one analysis result. A duplicate (fingerprint, model) pair is
    /// a [`PipelineError::Conflict`]; callers treat it as already done.
    pub async fn save(&self, insight: &InsightRecord) -> Result<(), PipelineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO insights
                (fingerprint, model, opportunities, directions, innovations, generated_at, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&insight.fingerprint)
        .bind(&insight.model)
        .bind(json_list(&insight.payload.opportunities))
        .bind(json_list(&insight.payload.directions))
        .bind(json_list(&insight.payload.innovations))
        .bind(insight.generated_at.timestamp())
        .bind(insight.status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(PipelineError::Conflict {
                    fingerprint: insight.fingerprint.clone(),
                    model: insight.model.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insights awaiting delivery (`pending` or `failed`), oldest generated
    /// first.
    pub async fn pending_for_delivery(
        &self,
        limit: i64,
    ) -> Result<Vec<InsightRecord>, PipelineError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM insights
            WHERE status IN ('pending', 'failed')
            ORDER BY generated_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_insight).collect())
    }

    /// Bulk status transition for one model, in one transaction. Rows that
    /// already reached a terminal state (`delivered`, `skipped`) are left
    /// untouched.
    pub async fn set_status(
        &self,
        fingerprints: &[String],
        model: &str,
        status: DeliveryStatus,
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await?;

        for fingerprint in fingerprints {
            sqlx::query(
                r#"
                UPDATE insights SET status = ?
                WHERE fingerprint = ? AND model = ? AND status IN ('pending', 'failed')
                "#,
            )
            .bind(status.as_str())
            .bind(fingerprint)
            .bind(model)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(
        &self,
        fingerprint: &str,
        model: &str,
    ) -> Result<Option<InsightRecord>, PipelineError> {
        let row = sqlx::query("SELECT * FROM insights WHERE fingerprint = ? AND model = ?")
            .bind(fingerprint)
            .bind(model)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_insight))
    }

    pub async fn count(&self) -> Result<i64, PipelineError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM insights")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn parse_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn row_to_insight(row: &sqlx::sqlite::SqliteRow) -> InsightRecord {
    let status: String = row.get("status");
    InsightRecord {
        fingerprint: row.get("fingerprint"),
        model: row.get("model"),
        payload: InsightPayload {
            opportunities: parse_list(row.get("opportunities")),
            directions: parse_list(row.get("directions")),
            innovations: parse_list(row.get("innovations")),
        },
        generated_at: DateTime::from_timestamp(row.get("generated_at"), 0)
            .unwrap_or(DateTime::UNIX_EPOCH),
        status: DeliveryStatus::parse(&status).unwrap_or(DeliveryStatus::Pending),
    }
}
