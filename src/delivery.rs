//! Delivery: the channel trait, the static channel registry, and the
//! coordinator that updates delivery status.
//!
//! Every configured channel receives the same digest. Delivery is complete
//! only when every channel confirms; if any channel fails after its retries,
//! the whole pending set is marked `failed` and re-sent on the next run.
//! Channels must therefore tolerate re-delivery of entries they have already
//! seen: the guarantee is at-least-once, never silently-lost.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::deliver_report::ReportDeliverer;
use crate::deliver_webhook::WebhookDeliverer;
use crate::error::PipelineError;
use crate::insight_store::InsightStore;
use crate::models::{DeliveryStatus, InsightRecord};
use crate::record_store::RecordStore;
use crate::retry::RetryPolicy;

/// One insight joined with its raw record, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct DigestEntry {
    pub fingerprint: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub opportunities: Vec<String>,
    pub directions: Vec<String>,
    pub innovations: Vec<String>,
}

/// The payload every configured channel receives for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub generated_at: String,
    pub entries: Vec<DigestEntry>,
}

/// A delivery channel. Success or failure is reported for the digest as a
/// unit.
#[async_trait]
pub trait Deliverer: Send + Sync {
    fn channel(&self) -> &str;

    async fn deliver(&self, digest: &Digest) -> Result<(), PipelineError>;
}

/// Compiled-in channels enabled by the config file. No runtime code loading.
pub struct DelivererRegistry {
    deliverers: Vec<Box<dyn Deliverer>>,
}

impl DelivererRegistry {
    pub fn new() -> Self {
        Self {
            deliverers: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if let Some(cfg) = &config.delivery.webhook {
            registry.register(Box::new(WebhookDeliverer::new(cfg.clone())));
        }
        if let Some(cfg) = &config.delivery.report {
            registry.register(Box::new(ReportDeliverer::new(cfg.clone())));
        }

        registry
    }

    pub fn register(&mut self, deliverer: Box<dyn Deliverer>) {
        self.deliverers.push(deliverer);
    }

    pub fn deliverers(&self) -> &[Box<dyn Deliverer>] {
        &self.deliverers
    }

    pub fn is_empty(&self) -> bool {
        self.deliverers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deliverers.len()
    }
}

impl Default for DelivererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run delivery counts for the run summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeliveryCounts {
    pub pending: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Send everything pending to every configured channel and record the
/// outcome.
pub async fn run_delivery(
    records: &RecordStore,
    insights: &InsightStore,
    registry: &DelivererRegistry,
    pending_limit: i64,
    retry: RetryPolicy,
) -> Result<DeliveryCounts, PipelineError> {
    let mut counts = DeliveryCounts::default();

    let pending = insights.pending_for_delivery(pending_limit).await?;
    counts.pending = pending.len() as u64;

    if pending.is_empty() {
        info!("deliver: nothing pending");
        return Ok(counts);
    }
    if registry.is_empty() {
        info!(
            pending = pending.len(),
            "deliver: no channels configured, leaving insights pending"
        );
        return Ok(counts);
    }

    let digest = build_digest(records, &pending).await?;

    let mut all_ok = true;
    for deliverer in registry.deliverers() {
        let channel = deliverer.channel();
        let outcome = retry
            .run("delivery", |_attempt| {
                let digest = &digest;
                async move { deliverer.deliver(digest).await }
            })
            .await;

        match outcome {
            Ok(()) => {
                info!(channel, entries = digest.entries.len(), "deliver: channel confirmed");
            }
            Err(err) => {
                warn!(channel, error = %err, "deliver: channel failed");
                all_ok = false;
            }
        }
    }

    let status = if all_ok {
        DeliveryStatus::Delivered
    } else {
        DeliveryStatus::Failed
    };

    let mut by_model: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for insight in &pending {
        by_model
            .entry(insight.model.as_str())
            .or_default()
            .push(insight.fingerprint.clone());
    }
    for (model, fingerprints) in by_model {
        insights.set_status(&fingerprints, model, status).await?;
    }

    if all_ok {
        counts.delivered = pending.len() as u64;
    } else {
        counts.failed = pending.len() as u64;
    }
    Ok(counts)
}

/// Join each pending insight with its raw record for titles and links. An
/// insight whose record has gone missing still ships, with empty fields.
pub async fn build_digest(
    records: &RecordStore,
    pending: &[InsightRecord],
) -> Result<Digest, PipelineError> {
    let mut entries = Vec::with_capacity(pending.len());

    for insight in pending {
        let record = records.get(&insight.fingerprint).await?;
        let (title, url, source) = match record {
            Some(r) => (r.title, r.url, r.source),
            None => (String::new(), String::new(), String::new()),
        };

        entries.push(DigestEntry {
            fingerprint: insight.fingerprint.clone(),
            title,
            url,
            source,
            opportunities: insight.payload.opportunities.clone(),
            directions: insight.payload.directions.clone(),
            innovations: insight.payload.innovations.clone(),
        });
    }

    Ok(Digest {
        generated_at: chrono::Utc::now().to_rfc3339(),
        entries,
    })
}
