//! Analyzer stage: drain the unanalyzed backlog through the analysis
//! provider in fixed-size batches.
//!
//! Failure isolation per the delivery contract: a provider-level failure
//! abandons the batch for this run (nothing written, so the same records
//! come back next run), while a malformed per-record result writes a
//! `skipped` sentinel so that record is never retried under this model.

use chrono::Utc;
use tracing::{info, warn};

use crate::analysis::{AnalysisInput, AnalysisProvider};
use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use crate::insight_store::InsightStore;
use crate::models::{DeliveryStatus, InsightPayload, InsightRecord};
use crate::record_store::RecordStore;
use crate::retry::RetryPolicy;

/// Per-run analysis counts for the run summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyzeCounts {
    pub analyzed: u64,
    pub skipped: u64,
    pub abandoned: u64,
}

pub async fn run_analyze(
    records: &RecordStore,
    insights: &InsightStore,
    provider: &dyn AnalysisProvider,
    config: &AnalysisConfig,
    retry: RetryPolicy,
) -> Result<AnalyzeCounts, PipelineError> {
    let model = provider.model_id();

    let backlog = records.unanalyzed(model, config.daily_max).await?;
    if backlog.is_empty() {
        info!(model, "analyze: backlog empty");
        return Ok(AnalyzeCounts::default());
    }
    info!(model, backlog = backlog.len(), "analyze: draining backlog");

    let mut counts = AnalyzeCounts::default();

    for batch in backlog.chunks(config.batch_size.max(1)) {
        let inputs: Vec<AnalysisInput> = batch
            .iter()
            .map(|r| AnalysisInput {
                fingerprint: r.fingerprint.clone(),
                title: r.title.clone(),
                url: r.url.clone(),
                body: r.body.clone(),
            })
            .collect();

        let outcome = retry
            .run("analysis batch", |_attempt| {
                let inputs = inputs.clone();
                async move { provider.analyze(&inputs).await }
            })
            .await;

        let results = match outcome {
            Ok(results) => results,
            Err(err) => {
                warn!(
                    model,
                    size = batch.len(),
                    error = %err,
                    "analyze: batch abandoned for this run"
                );
                counts.abandoned += batch.len() as u64;
                continue;
            }
        };

        let padded = results.into_iter().chain(std::iter::repeat(None));
        for (record, result) in batch.iter().zip(padded) {
            let (payload, status) = match result {
                Some(payload) => (payload, DeliveryStatus::Pending),
                None => {
                    let err = PipelineError::AnalysisItem {
                        fingerprint: record.fingerprint.clone(),
                        reason: "malformed or missing provider result".to_string(),
                    };
                    warn!(model, error = %err, "analyze: marking record skipped for this model");
                    (InsightPayload::default(), DeliveryStatus::Skipped)
                }
            };

            let skipped = status == DeliveryStatus::Skipped;
            let insight = InsightRecord {
                fingerprint: record.fingerprint.clone(),
                model: model.to_string(),
                payload,
                generated_at: Utc::now(),
                status,
            };

            match insights.save(&insight).await {
                Ok(()) => {
                    if skipped {
                        counts.skipped += 1;
                    } else {
                        counts.analyzed += 1;
                    }
                }
                Err(PipelineError::Conflict { .. }) => {
                    info!(
                        fingerprint = %record.fingerprint,
                        model,
                        "analyze: insight already recorded, skipping write"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    Ok(counts)
}
