//! Fetcher stage: poll every configured source and commit new records.
//!
//! Polls run concurrently across sources, bounded by a semaphore; all writes
//! stay serialized through the record store's transactional batch insert.
//! One source failing never aborts the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::RawRecord;
use crate::record_store::RecordStore;
use crate::retry::RetryPolicy;
use crate::sources::SourceRegistry;

/// Per-source outcome reported in the run summary. `failed` is 1 when the
/// source's poll was abandoned after its retry budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchCounts {
    pub fetched: u64,
    pub new: u64,
    pub failed: u64,
}

pub async fn run_fetch(
    store: &RecordStore,
    registry: &SourceRegistry,
    concurrency: usize,
    retry: RetryPolicy,
) -> Result<BTreeMap<String, FetchCounts>, PipelineError> {
    let mut counts: BTreeMap<String, FetchCounts> = BTreeMap::new();

    if registry.is_empty() {
        info!("fetch: no sources configured");
        return Ok(counts);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut polls = JoinSet::new();

    for source in registry.sources() {
        let source = Arc::clone(source);
        let semaphore = Arc::clone(&semaphore);
        polls.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let name = source.name().to_string();
            let polled = retry
                .run("source poll", |_attempt| {
                    let source = Arc::clone(&source);
                    async move { source.poll().await }
                })
                .await;
            (name, polled)
        });
    }

    while let Some(joined) = polls.join_next().await {
        let (name, polled) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "fetch: source task panicked");
                continue;
            }
        };

        let entry = counts.entry(name.clone()).or_default();
        match polled {
            Ok(items) => {
                entry.fetched = items.len() as u64;
                let fetched_at = Utc::now();
                let records: Vec<RawRecord> = items
                    .into_iter()
                    .filter(|item| !item.external_id.is_empty() && !item.title.is_empty())
                    .map(|item| RawRecord::from_item(&name, item, fetched_at))
                    .collect();

                let inserted = store.insert_if_absent(&records).await?;
                entry.new = inserted.len() as u64;
                info!(
                    source = %name,
                    fetched = entry.fetched,
                    new = entry.new,
                    "fetch: source done"
                );
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(source = %name, error = %err, "fetch: source skipped for this run");
                entry.failed = 1;
            }
        }
    }

    Ok(counts)
}
