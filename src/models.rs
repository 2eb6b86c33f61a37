//! Core data models used throughout the pipeline.
//!
//! These types represent the candidate records and analysis results that
//! flow through the fetch, analyze, and delivery stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw item produced by a source adapter before normalization.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// Normalized candidate record stored in SQLite. Immutable once inserted.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub fingerprint: String,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl RawRecord {
    /// Normalize a source item into a record, computing its fingerprint.
    pub fn from_item(source: &str, item: SourceItem, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: fingerprint(source, &item.external_id),
            source: source.to_string(),
            external_id: item.external_id,
            title: item.title,
            body: item.body,
            url: item.url,
            published_at: item.published_at,
            fetched_at,
        }
    }
}

/// Deduplication key: lowercase hex SHA-256 of `"{source}:{external_id}"`.
pub fn fingerprint(source: &str, external_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(external_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Structured analysis output for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightPayload {
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub directions: Vec<String>,
    #[serde(default)]
    pub innovations: Vec<String>,
}

/// Analysis result for one record under one model, plus its delivery state.
/// At most one row exists per (fingerprint, model) pair.
#[derive(Debug, Clone)]
pub struct InsightRecord {
    pub fingerprint: String,
    pub model: String,
    pub payload: InsightPayload,
    pub generated_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

/// Delivery state of an insight. Transitions are forward only:
/// `Pending → Delivered` is terminal, `Pending → Failed → Pending` allows a
/// retry on the next run, and a `Delivered` row never changes again.
/// `Skipped` marks a record whose analysis result was unusable for this
/// model; it is terminal and never eligible for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "delivered" => Some(Self::Delivered),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}
