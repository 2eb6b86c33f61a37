use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_concurrency")]
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_fetch_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub arxiv: Option<ArxivSourceConfig>,
    pub hackernews: Option<HackerNewsSourceConfig>,
}

impl SourcesConfig {
    pub fn is_empty(&self) -> bool {
        self.arxiv.is_none() && self.hackernews.is_none()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArxivSourceConfig {
    #[serde(default = "default_arxiv_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_arxiv_categories() -> Vec<String> {
    vec!["cs.AI".to_string(), "cs.LG".to_string(), "cs.CL".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct HackerNewsSourceConfig {
    #[serde(default = "default_hackernews_query")]
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_hackernews_query() -> String {
    "AI".to_string()
}

fn default_max_results() -> usize {
    50
}

fn default_source_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_daily_max")]
    pub daily_max: usize,
    #[serde(default = "default_body_max_chars")]
    pub body_max_chars: usize,
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: default_analysis_provider(),
            model: None,
            batch_size: default_batch_size(),
            daily_max: default_daily_max(),
            body_max_chars: default_body_max_chars(),
            timeout_secs: default_analysis_timeout_secs(),
        }
    }
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_analysis_provider() -> String {
    "disabled".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_daily_max() -> usize {
    30
}

fn default_body_max_chars() -> usize {
    500
}

fn default_analysis_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default = "default_pending_limit")]
    pub pending_limit: i64,
    pub webhook: Option<WebhookConfig>,
    pub report: Option<ReportConfig>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            pending_limit: default_pending_limit(),
            webhook: None,
            report: None,
        }
    }
}

fn default_pending_limit() -> i64 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Endpoint for the digest POST. `WEBHOOK_URL` in the environment
    /// overrides this.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    1
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.fetch.concurrency == 0 {
        anyhow::bail!("fetch.concurrency must be > 0");
    }

    if config.retry.max_attempts == 0 {
        anyhow::bail!("retry.max_attempts must be > 0");
    }

    match config.analysis.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown analysis provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.analysis.is_enabled() {
        if config.analysis.model.is_none() {
            anyhow::bail!(
                "analysis.model must be specified when provider is '{}'",
                config.analysis.provider
            );
        }
        if config.analysis.batch_size == 0 {
            anyhow::bail!("analysis.batch_size must be > 0");
        }
        if config.analysis.daily_max == 0 {
            anyhow::bail!("analysis.daily_max must be > 0");
        }
    }

    if config.delivery.pending_limit < 1 {
        anyhow::bail!("delivery.pending_limit must be >= 1");
    }

    Ok(config)
}
