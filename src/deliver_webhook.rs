//! Webhook delivery channel: POST the digest as JSON.
//!
//! The endpoint comes from `WEBHOOK_URL` (environment wins) or
//! `delivery.webhook.url`; `WEBHOOK_TOKEN`, when set, is sent as a bearer
//! token.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::WebhookConfig;
use crate::delivery::{Deliverer, Digest};
use crate::error::PipelineError;

pub struct WebhookDeliverer {
    config: WebhookConfig,
}

impl WebhookDeliverer {
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self) -> Option<String> {
        std::env::var("WEBHOOK_URL")
            .ok()
            .or_else(|| self.config.url.clone())
    }
}

#[async_trait]
impl Deliverer for WebhookDeliverer {
    fn channel(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, digest: &Digest) -> Result<(), PipelineError> {
        let url = self.endpoint().ok_or_else(|| {
            PipelineError::Delivery(
                "webhook: no URL configured (set WEBHOOK_URL or delivery.webhook.url)".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Delivery(format!("webhook client: {e}")))?;

        let mut request = client.post(&url).json(digest);
        if let Ok(token) = std::env::var("WEBHOOK_TOKEN") {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Delivery(format!("webhook send: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Delivery(format!(
                "webhook returned {status}: {text}"
            )));
        }

        Ok(())
    }
}
