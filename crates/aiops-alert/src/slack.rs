//! Chat webhook channel (Slack incoming-webhook payload).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use aiops_core::{AlertChannel, AlertEvent, BackendError, BackendResult};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct SlackWebhook {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl SlackWebhook {
    pub fn new(url: &str, timeout: Duration) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl AlertChannel for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, event: &AlertEvent) -> BackendResult<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(&WebhookPayload {
                text: &event.message,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        call: "slack webhook",
                        after: self.timeout,
                    }
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::status(status.as_u16(), body));
        }
        Ok(())
    }
}
