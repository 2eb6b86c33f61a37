//! Hacker News source adapter.
//!
//! Polls the Algolia HN search API (`search_by_date`) for recent stories
//! matching the configured query. Stories without an outbound URL fall back
//! to their HN discussion page.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::HackerNewsSourceConfig;
use crate::error::PipelineError;
use crate::models::SourceItem;
use crate::sources::Source;

const HN_API_URL: &str = "https://hn.algolia.com/api/v1/search_by_date";

pub struct HackerNewsSource {
    config: HackerNewsSourceConfig,
}

impl HackerNewsSource {
    pub fn new(config: HackerNewsSourceConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    story_text: Option<String>,
    created_at: Option<String>,
}

fn hit_to_item(hit: Hit) -> Option<SourceItem> {
    let title = hit.title.filter(|t| !t.trim().is_empty())?;
    let url = hit
        .url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", hit.object_id));

    let published_at = hit
        .created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(SourceItem {
        external_id: hit.object_id,
        title,
        body: hit.story_text.unwrap_or_default(),
        url,
        published_at,
    })
}

#[async_trait]
impl Source for HackerNewsSource {
    fn name(&self) -> &str {
        "hackernews"
    }

    fn description(&self) -> &str {
        "Recent stories from the Algolia Hacker News API"
    }

    async fn poll(&self) -> Result<Vec<SourceItem>, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(concat!("insightd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::SourcePermanent(format!("hackernews client: {e}")))?;

        let max_results = self.config.max_results.to_string();
        let response = client
            .get(HN_API_URL)
            .query(&[
                ("query", self.config.query.as_str()),
                ("tags", "story"),
                ("hitsPerPage", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::SourceTransient(format!("hackernews request: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PipelineError::SourceTransient(format!(
                "hackernews returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::SourcePermanent(format!(
                "hackernews returned {status}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::SourcePermanent(format!("hackernews payload: {e}")))?;

        Ok(parsed.hits.into_iter().filter_map(hit_to_item).collect())
    }
}
