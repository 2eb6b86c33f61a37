//! Analysis provider abstraction and the OpenAI implementation.
//!
//! A provider receives one batch of record texts per call and answers with
//! one result slot per record. The OpenAI provider sends a single chat
//! completion per batch and parses the reply leniently, since models wrap
//! JSON in markdown fences and mangle individual entries often enough that
//! strict parsing would throw away good sibling results.
//!
//! # Retry contract
//!
//! The provider itself never retries. A wholesale failure surfaces as
//! [`PipelineError::AnalysisBatch`] and the caller decides, through the
//! retry policy, whether to try the batch again or abandon it for this run.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use crate::models::InsightPayload;

/// One record's text as submitted to the provider.
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub fingerprint: String,
    pub title: String,
    pub url: String,
    pub body: String,
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Model identifier written on every insight this provider produces.
    fn model_id(&self) -> &str;

    /// Analyze one batch with a single provider call.
    ///
    /// Returns one slot per input, in input order: `Some(payload)` for a
    /// usable result, `None` where the provider's answer for that record was
    /// malformed or missing. A wholesale failure (timeout, quota, auth) is
    /// [`PipelineError::AnalysisBatch`].
    async fn analyze(
        &self,
        inputs: &[AnalysisInput],
    ) -> Result<Vec<Option<InsightPayload>>, PipelineError>;
}

/// Instantiate the configured provider.
///
/// # Errors
///
/// Fails for the `disabled` provider, an unknown provider name, or a
/// provider whose environment is incomplete (missing API key).
pub fn create_provider(config: &AnalysisConfig) -> anyhow::Result<Box<dyn AnalysisProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "disabled" => anyhow::bail!("Analysis provider is disabled. Set [analysis] provider in config."),
        other => anyhow::bail!("Unknown analysis provider: {}", other),
    }
}

const SYSTEM_PROMPT: &str = "You are an expert analyst reviewing AI research papers and industry news. \
For every numbered item you receive, extract:\n\
1. opportunities: 1-3 short phrases on productization or industry application.\n\
2. directions: 1-3 short phrases on new methods, architectures, benchmarks, or datasets.\n\
3. innovations: 1-3 short phrases on breakthroughs or reusable ideas versus prior work.\n\n\
Respond ONLY with a JSON array holding one object per item, in the same order:\n\
[{\"opportunities\": [\"...\"], \"directions\": [\"...\"], \"innovations\": [\"...\"]}, ...]\n\
Use empty lists where nothing applies. Keep each phrase under 80 characters.";

/// Chat-completions provider. Requires `OPENAI_API_KEY`; `OPENAI_BASE_URL`
/// overrides the endpoint for compatible gateways.
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    body_max_chars: usize,
}

impl OpenAiProvider {
    pub fn new(config: &AnalysisConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("analysis.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_key,
            base_url,
            client,
            body_max_chars: config.body_max_chars,
        })
    }

    fn batch_prompt(&self, inputs: &[AnalysisInput]) -> String {
        let mut prompt = String::new();
        for (i, input) in inputs.iter().enumerate() {
            let body: String = input.body.chars().take(self.body_max_chars).collect();
            prompt.push_str(&format!(
                "Item {}:\nTitle: {}\nURL: {}\nAbstract: {}\n\n",
                i + 1,
                input.title,
                input.url,
                body
            ));
        }
        prompt
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn analyze(
        &self,
        inputs: &[AnalysisInput],
    ) -> Result<Vec<Option<InsightPayload>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.3,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": self.batch_prompt(inputs) },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::AnalysisBatch(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::AnalysisBatch(format!(
                "provider returned {status}: {text}"
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::AnalysisBatch(format!("invalid response body: {e}")))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                PipelineError::AnalysisBatch("response missing message content".to_string())
            })?;

        Ok(parse_batch_response(content, inputs.len()))
    }
}

/// Extract per-item payloads from the model's reply.
///
/// The first JSON array found in the text is used. Entries that do not
/// deserialize into a payload become `None`, and a short or missing array
/// leaves the tail slots `None`, so one mangled entry never discards its
/// siblings.
pub fn parse_batch_response(content: &str, expected: usize) -> Vec<Option<InsightPayload>> {
    let mut out: Vec<Option<InsightPayload>> = vec![None; expected];

    let Some(array) = extract_json_array(content) else {
        return out;
    };

    for (i, slot) in out.iter_mut().enumerate() {
        if let Some(value) = array.get(i) {
            *slot = serde_json::from_value(value.clone()).ok();
        }
    }

    out
}

/// Find the first balanced JSON array in `text` and parse it. Bracket depth
/// is tracked outside string literals only, so URLs or phrases containing
/// brackets don't break the scan.
fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for i in start..bytes.len() {
        let c = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str::<Value>(&text[start..=i])
                        .ok()
                        .and_then(|v| v.as_array().cloned());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_clean_array() {
        let content = r#"[
            {"opportunities": ["o1"], "directions": ["d1"], "innovations": ["i1"]},
            {"opportunities": [], "directions": ["d2"], "innovations": []}
        ]"#;
        let results = parse_batch_response(content, 2);
        assert_eq!(results[0].as_ref().unwrap().opportunities, vec!["o1"]);
        assert_eq!(results[1].as_ref().unwrap().directions, vec!["d2"]);
    }

    #[test]
    fn strips_markdown_fences() {
        let content = "Here you go:\n```json\n[{\"opportunities\": [\"o1\"], \"directions\": [], \"innovations\": []}]\n```";
        let results = parse_batch_response(content, 1);
        assert_eq!(results[0].as_ref().unwrap().opportunities, vec!["o1"]);
    }

    #[test]
    fn malformed_entry_skips_only_that_slot() {
        let content = r#"[
            {"opportunities": ["o1"], "directions": [], "innovations": []},
            "not an object",
            {"opportunities": ["o3"], "directions": [], "innovations": []}
        ]"#;
        let results = parse_batch_response(content, 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
    }

    #[test]
    fn short_array_leaves_tail_unfilled() {
        let content = r#"[{"opportunities": [], "directions": [], "innovations": []}]"#;
        let results = parse_batch_response(content, 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[test]
    fn no_array_means_all_slots_unfilled() {
        let results = parse_batch_response("I could not process this request.", 2);
        assert!(results.iter().all(|r| r.is_none()));
    }

    #[test]
    fn brackets_inside_strings_do_not_confuse_the_scan() {
        let content = r#"[{"opportunities": ["use [MASK] tokens"], "directions": [], "innovations": []}]"#;
        let results = parse_batch_response(content, 1);
        assert_eq!(
            results[0].as_ref().unwrap().opportunities,
            vec!["use [MASK] tokens"]
        );
    }
}
