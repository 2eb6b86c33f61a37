//! Error taxonomy for the pipeline.
//!
//! Every failure a stage can encounter maps to one variant, and the two
//! predicates below drive the control flow: [`PipelineError::is_retryable`]
//! feeds the bounded-retry wrapper, [`PipelineError::is_fatal`] tells the
//! runner whether to abort the remaining stages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Persistence-layer fault. The only fatal kind: the run aborts and the
    /// process exits nonzero.
    #[error("storage fault: {0}")]
    Storage(#[from] sqlx::Error),

    /// An insight for this (fingerprint, model) pair already exists. The
    /// caller skips the write.
    #[error("insight already recorded for {fingerprint} under model {model}")]
    Conflict { fingerprint: String, model: String },

    /// Source adapter fault worth retrying: network error, timeout, 429, 5xx.
    #[error("transient source fault: {0}")]
    SourceTransient(String),

    /// Source adapter fault that retrying cannot fix: auth rejection,
    /// malformed payload, unexpected 4xx.
    #[error("permanent source fault: {0}")]
    SourcePermanent(String),

    /// The analysis provider call failed wholesale (timeout, quota, auth).
    /// The batch is abandoned for this run and retried on the next one.
    #[error("analysis batch failed: {0}")]
    AnalysisBatch(String),

    /// The provider answered, but its result for one record was unusable.
    /// The record is marked skipped for this model so it is not retried.
    #[error("unusable analysis result for {fingerprint}: {reason}")]
    AnalysisItem { fingerprint: String, reason: String },

    /// A delivery channel failed to transmit the digest.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl PipelineError {
    /// Failures worth another attempt under the retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceTransient(_) | Self::AnalysisBatch(_) | Self::Delivery(_)
        )
    }

    /// Storage faults abort the run; every other kind is absorbed and logged
    /// by the stage that hit it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(PipelineError::SourceTransient("timeout".into()).is_retryable());
        assert!(PipelineError::AnalysisBatch("quota".into()).is_retryable());
        assert!(PipelineError::Delivery("refused".into()).is_retryable());
    }

    #[test]
    fn permanent_kinds_are_not_retryable() {
        assert!(!PipelineError::SourcePermanent("bad auth".into()).is_retryable());
        assert!(!PipelineError::Conflict {
            fingerprint: "abc".into(),
            model: "m".into()
        }
        .is_retryable());
        assert!(!PipelineError::AnalysisItem {
            fingerprint: "abc".into(),
            reason: "not json".into()
        }
        .is_retryable());
    }

    #[test]
    fn only_storage_is_fatal() {
        assert!(PipelineError::Storage(sqlx::Error::PoolClosed).is_fatal());
        assert!(!PipelineError::SourcePermanent("bad auth".into()).is_fatal());
        assert!(!PipelineError::Delivery("refused".into()).is_fatal());
    }
}
