//! SNS topic alert channel.

use async_trait::async_trait;
use aws_sdk_sns::Client;
use tracing::debug;

use aiops_core::{AlertChannel, AlertEvent, BackendResult};

use crate::error::sdk_error;

/// SNS caps subjects at 100 characters.
const MAX_SUBJECT_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct SnsChannel {
    client: Client,
    topic_arn: String,
    subject: String,
}

impl SnsChannel {
    pub fn new(client: Client, topic_arn: &str, subject: &str) -> Self {
        Self {
            client,
            topic_arn: topic_arn.to_string(),
            subject: clamp_subject(subject),
        }
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

fn clamp_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

#[async_trait]
impl AlertChannel for SnsChannel {
    fn name(&self) -> &str {
        "sns"
    }

    async fn send(&self, event: &AlertEvent) -> BackendResult<()> {
        let out = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(&self.subject)
            .message(&event.message)
            .send()
            .await
            .map_err(|e| sdk_error("Publish", e))?;

        debug!(topic = %self.topic_arn, message_id = out.message_id().unwrap_or_default(), "published");
        Ok(())
    }
}
