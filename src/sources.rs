//! Source adapter trait and the static registry resolved from config.
//!
//! A [`Source`] produces candidate items for one poll. The registry maps the
//! config-selected source names to compiled-in implementations; there is no
//! runtime plugin loading.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::SourceItem;
use crate::source_arxiv::ArxivSource;
use crate::source_hackernews::HackerNewsSource;

/// A content source adapter.
#[async_trait]
pub trait Source: Send + Sync {
    /// Source label stored on every record this adapter yields.
    fn name(&self) -> &str;

    /// One-line description, shown by `insightd sources`.
    fn description(&self) -> &str;

    /// Poll the upstream service once.
    ///
    /// Faults worth retrying (network errors, timeouts, 429, 5xx) must
    /// surface as [`PipelineError::SourceTransient`]; anything retrying
    /// cannot fix (auth, malformed payload) as
    /// [`PipelineError::SourcePermanent`].
    async fn poll(&self) -> Result<Vec<SourceItem>, PipelineError>;
}

/// Compiled-in sources enabled by the config file.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if let Some(cfg) = &config.sources.arxiv {
            registry.register(Arc::new(ArxivSource::new(cfg.clone())));
        }
        if let Some(cfg) = &config.sources.hackernews {
            registry.register(Arc::new(HackerNewsSource::new(cfg.clone())));
        }

        registry
    }

    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Print configured sources and their status (`insightd sources`).
pub fn list_sources(config: &Config) {
    let registry = SourceRegistry::from_config(config);

    println!("{:<14} {:<12} DESCRIPTION", "SOURCE", "STATUS");
    for source in registry.sources() {
        println!(
            "{:<14} {:<12} {}",
            source.name(),
            "CONFIGURED",
            source.description()
        );
    }
    if config.sources.arxiv.is_none() {
        println!("{:<14} {:<12}", "arxiv", "NOT CONFIGURED");
    }
    if config.sources.hackernews.is_none() {
        println!("{:<14} {:<12}", "hackernews", "NOT CONFIGURED");
    }
}
