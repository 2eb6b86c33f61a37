//! Run orchestration: fetch → analyze → deliver, once, with a printed
//! summary.
//!
//! A storage fault anywhere propagates out of this module and aborts the
//! remaining stages; every other failure is absorbed by its stage and shows
//! up only in the summary counts.

use std::collections::BTreeMap;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::analysis;
use crate::analyze::{self, AnalyzeCounts};
use crate::config::Config;
use crate::delivery::{self, DelivererRegistry, DeliveryCounts};
use crate::error::PipelineError;
use crate::fetch::{self, FetchCounts};
use crate::insight_store::InsightStore;
use crate::record_store::RecordStore;
use crate::retry::RetryPolicy;
use crate::sources::SourceRegistry;

#[derive(Debug, Default)]
pub struct RunSummary {
    pub fetch: BTreeMap<String, FetchCounts>,
    pub analyze: AnalyzeCounts,
    pub delivery: DeliveryCounts,
}

pub async fn run_pipeline(config: &Config, pool: &SqlitePool) -> Result<RunSummary, PipelineError> {
    let records = RecordStore::new(pool.clone());
    let insights = InsightStore::new(pool.clone());
    let retry = RetryPolicy::from_config(&config.retry);

    let mut summary = RunSummary::default();

    let sources = SourceRegistry::from_config(config);
    summary.fetch = fetch::run_fetch(&records, &sources, config.fetch.concurrency, retry).await?;

    if config.analysis.is_enabled() {
        match analysis::create_provider(&config.analysis) {
            Ok(provider) => {
                summary.analyze = analyze::run_analyze(
                    &records,
                    &insights,
                    provider.as_ref(),
                    &config.analysis,
                    retry,
                )
                .await?;
            }
            Err(e) => {
                // Missing API key or the like: the backlog simply waits.
                warn!(error = %e, "analyze: provider unavailable, stage skipped");
            }
        }
    } else {
        info!("analyze: provider disabled, stage skipped");
    }

    let deliverers = DelivererRegistry::from_config(config);
    summary.delivery = delivery::run_delivery(
        &records,
        &insights,
        &deliverers,
        config.delivery.pending_limit,
        retry,
    )
    .await?;

    Ok(summary)
}

pub fn print_summary(summary: &RunSummary) {
    println!("run");
    if summary.fetch.is_empty() {
        println!("  fetch: no sources configured");
    }
    for (source, counts) in &summary.fetch {
        println!(
            "  fetch {}: {} fetched, {} new, {} failed",
            source, counts.fetched, counts.new, counts.failed
        );
    }
    println!(
        "  analyzed: {} ({} skipped, {} abandoned)",
        summary.analyze.analyzed, summary.analyze.skipped, summary.analyze.abandoned
    );
    println!(
        "  delivery: {} pending, {} delivered, {} failed",
        summary.delivery.pending, summary.delivery.delivered, summary.delivery.failed
    );
    println!("ok");
}
