//! arXiv source adapter.
//!
//! Polls the arXiv Atom API for recent papers in the configured categories.
//! The entry's Atom id (the abstract URL) doubles as the external id, which
//! keeps fingerprints stable across repeated polls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::ArxivSourceConfig;
use crate::error::PipelineError;
use crate::models::SourceItem;
use crate::sources::Source;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

pub struct ArxivSource {
    config: ArxivSourceConfig,
}

impl ArxivSource {
    pub fn new(config: ArxivSourceConfig) -> Self {
        Self { config }
    }

    /// `(cat:cs.AI OR cat:cs.LG ...)`, the grouping syntax the arXiv API
    /// manual prescribes for multi-category queries.
    fn search_query(&self) -> String {
        let cats: Vec<String> = self
            .config
            .categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect();
        format!("({})", cats.join(" OR "))
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "Recent papers from the arXiv Atom API"
    }

    async fn poll(&self) -> Result<Vec<SourceItem>, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(concat!("insightd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::SourcePermanent(format!("arxiv client: {e}")))?;

        let query = self.search_query();
        let max_results = self.config.max_results.to_string();
        let response = client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::SourceTransient(format!("arxiv request: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(PipelineError::SourceTransient(format!(
                "arxiv returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::SourcePermanent(format!(
                "arxiv returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::SourceTransient(format!("arxiv body: {e}")))?;

        parse_atom_feed(&body)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
}

/// Parse the Atom feed into source items. Entries missing an id or title are
/// dropped; a missing or unparsable timestamp falls back to the poll time.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<SourceItem>, PipelineError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut id = String::new();
    let mut title = String::new();
    let mut summary = String::new();
    let mut published = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    id.clear();
                    title.clear();
                    summary.clear();
                    published.clear();
                }
                b"id" if in_entry => field = Some(Field::Id),
                b"title" if in_entry => field = Some(Field::Title),
                b"summary" if in_entry => field = Some(Field::Summary),
                b"published" if in_entry => field = Some(Field::Published),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let Some(f) = field {
                    let text = t.unescape().map_err(|e| {
                        PipelineError::SourcePermanent(format!("arxiv feed: {e}"))
                    })?;
                    match f {
                        Field::Id => id.push_str(&text),
                        Field::Title => title.push_str(&text),
                        Field::Summary => summary.push_str(&text),
                        Field::Published => published.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = false;
                    let id = id.trim();
                    if !id.is_empty() && !title.trim().is_empty() {
                        items.push(SourceItem {
                            external_id: id.to_string(),
                            title: squash_whitespace(&title),
                            body: squash_whitespace(&summary),
                            url: id.to_string(),
                            published_at: parse_timestamp(&published),
                        });
                    }
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::SourcePermanent(format!(
                    "arxiv feed is not valid Atom: {e}"
                )))
            }
            _ => {}
        }
    }

    Ok(items)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// arXiv wraps titles and abstracts across lines; collapse all runs of
/// whitespace to single spaces.
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2608.01001v1</id>
    <title>Scaling Laws for
        Sparse Models</title>
    <summary>We study scaling behavior
        of sparse architectures.</summary>
    <published>2026-08-01T17:59:00Z</published>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2608.01002v1</id>
    <title>Retrieval Benchmarks Revisited</title>
    <summary>A new benchmark suite.</summary>
    <published>2026-08-02T09:00:00Z</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_with_collapsed_whitespace() {
        let items = parse_atom_feed(FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].external_id, "http://arxiv.org/abs/2608.01001v1");
        assert_eq!(items[0].title, "Scaling Laws for Sparse Models");
        assert_eq!(items[0].body, "We study scaling behavior of sparse architectures.");
        assert_eq!(items[0].url, items[0].external_id);
        assert_eq!(
            items[0].published_at,
            DateTime::parse_from_rfc3339("2026-08-01T17:59:00Z").unwrap()
        );
    }

    #[test]
    fn entries_without_id_or_title_are_dropped() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><title>No id here</title><summary>x</summary></entry>
  <entry><id>http://arxiv.org/abs/1</id><title>Kept</title></entry>
</feed>"#;
        let items = parse_atom_feed(feed).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn malformed_xml_is_a_permanent_fault() {
        let err = parse_atom_feed("<feed><entry><id>broken</wrong></feed>").unwrap_err();
        assert!(matches!(err, PipelineError::SourcePermanent(_)));
    }

    #[test]
    fn search_query_groups_categories() {
        let source = ArxivSource::new(ArxivSourceConfig {
            categories: vec!["cs.AI".into(), "cs.CL".into()],
            max_results: 10,
            timeout_secs: 30,
        });
        assert_eq!(source.search_query(), "(cat:cs.AI OR cat:cs.CL)");
    }
}
