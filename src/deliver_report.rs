//! Report delivery channel: render the digest as a markdown file.
//!
//! Each run overwrites the file, so the report always holds the latest
//! digest. Re-delivery after a failed sibling channel is harmless here.

use async_trait::async_trait;

use crate::config::ReportConfig;
use crate::delivery::{Deliverer, Digest};
use crate::error::PipelineError;

pub struct ReportDeliverer {
    config: ReportConfig,
}

impl ReportDeliverer {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }
}

/// One numbered section per entry, each with its three insight lists and the
/// source link.
pub fn render_markdown(digest: &Digest) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Daily Insights ({} items)\n\n", digest.entries.len()));
    out.push_str(&format!("Generated: {}\n\n", digest.generated_at));

    for (i, entry) in digest.entries.iter().enumerate() {
        out.push_str(&format!("## {}. {}\n\n", i + 1, entry.title));
        out.push_str(&format!("- Opportunities: {}\n", join_or_dash(&entry.opportunities)));
        out.push_str(&format!("- Directions: {}\n", join_or_dash(&entry.directions)));
        out.push_str(&format!("- Innovations: {}\n", join_or_dash(&entry.innovations)));
        if !entry.url.is_empty() {
            out.push_str(&format!("- Link: {}\n", entry.url));
        }
        out.push('\n');
    }

    out
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

#[async_trait]
impl Deliverer for ReportDeliverer {
    fn channel(&self) -> &str {
        "report"
    }

    async fn deliver(&self, digest: &Digest) -> Result<(), PipelineError> {
        if let Some(parent) = self.config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::Delivery(format!("report dir: {e}")))?;
            }
        }

        std::fs::write(&self.config.path, render_markdown(digest))
            .map_err(|e| PipelineError::Delivery(format!("report write: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DigestEntry;

    fn digest() -> Digest {
        Digest {
            generated_at: "2026-08-07T06:00:00+00:00".to_string(),
            entries: vec![
                DigestEntry {
                    fingerprint: "fp1".into(),
                    title: "Scaling Laws for Sparse Models".into(),
                    url: "http://arxiv.org/abs/2608.01001v1".into(),
                    source: "arxiv".into(),
                    opportunities: vec!["cheaper serving".into(), "edge deployment".into()],
                    directions: vec!["sparse scaling laws".into()],
                    innovations: vec![],
                },
                DigestEntry {
                    fingerprint: "fp2".into(),
                    title: "Untitled".into(),
                    url: String::new(),
                    source: "hackernews".into(),
                    opportunities: vec![],
                    directions: vec![],
                    innovations: vec![],
                },
            ],
        }
    }

    #[test]
    fn renders_numbered_sections_with_lists() {
        let md = render_markdown(&digest());
        assert!(md.starts_with("# Daily Insights (2 items)\n"));
        assert!(md.contains("## 1. Scaling Laws for Sparse Models"));
        assert!(md.contains("- Opportunities: cheaper serving, edge deployment\n"));
        assert!(md.contains("- Link: http://arxiv.org/abs/2608.01001v1\n"));
    }

    #[test]
    fn empty_lists_render_as_dash_and_empty_url_has_no_link() {
        let md = render_markdown(&digest());
        assert!(md.contains("## 2. Untitled"));
        assert!(md.contains("- Innovations: -\n"));
        let section = md.split("## 2.").nth(1).unwrap();
        assert!(!section.contains("- Link:"));
    }
}
