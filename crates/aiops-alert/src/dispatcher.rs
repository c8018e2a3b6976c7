//! AlertDispatcher — fan-out with per-channel failure isolation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use aiops_core::{AlertChannel, AlertEvent, with_deadline};

/// Delivery outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    call_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            channels: Vec::new(),
            call_timeout,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn AlertChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Deliver `event` to every channel. Never fails.
    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let result = with_deadline("send alert", self.call_timeout, channel.send(event)).await;
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(channel = channel.name(), severity = %event.severity, "alert delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(channel = channel.name(), error = %e, "alert delivery failed");
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiops_core::testing::RecordingChannel;
    use aiops_core::{BackendResult, Severity};

    fn event() -> AlertEvent {
        AlertEvent::new(Severity::Warning, "High CPU detected: 0.85")
    }

    #[tokio::test]
    async fn no_channels_is_not_an_error() {
        let dispatcher = AlertDispatcher::new(Duration::from_secs(5));

        assert!(dispatcher.channel_names().is_empty());
        assert_eq!(dispatcher.dispatch(&event()).await, DispatchReport::default());
    }

    #[tokio::test]
    async fn delivers_to_every_channel() {
        let slack = Arc::new(RecordingChannel::new("slack"));
        let sns = Arc::new(RecordingChannel::new("sns"));
        let dispatcher = AlertDispatcher::new(Duration::from_secs(5))
            .with_channel(slack.clone())
            .with_channel(sns.clone());

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report, DispatchReport { delivered: 2, failed: 0 });
        assert_eq!(slack.attempts().len(), 1);
        assert_eq!(sns.attempts().len(), 1);
    }

    #[tokio::test]
    async fn failing_chat_does_not_block_pubsub() {
        let slack = Arc::new(RecordingChannel::failing("slack"));
        let sns = Arc::new(RecordingChannel::new("sns"));
        let dispatcher = AlertDispatcher::new(Duration::from_secs(5))
            .with_channel(slack.clone())
            .with_channel(sns.clone());

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(slack.attempts().len(), 1);
        assert_eq!(sns.attempts().len(), 1);
        assert_eq!(sns.attempts()[0].message, "High CPU detected: 0.85");
    }

    #[tokio::test]
    async fn failing_pubsub_does_not_block_chat() {
        let slack = Arc::new(RecordingChannel::new("slack"));
        let sns = Arc::new(RecordingChannel::failing("sns"));
        let dispatcher = AlertDispatcher::new(Duration::from_secs(5))
            .with_channel(sns.clone())
            .with_channel(slack.clone());

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(slack.attempts().len(), 1);
    }

    struct HangingChannel;

    #[async_trait::async_trait]
    impl AlertChannel for HangingChannel {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn send(&self, _event: &AlertEvent) -> BackendResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_channel_times_out_and_others_still_deliver() {
        let sns = Arc::new(RecordingChannel::new("sns"));
        let dispatcher = AlertDispatcher::new(Duration::from_secs(5))
            .with_channel(Arc::new(HangingChannel))
            .with_channel(sns.clone());

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(sns.attempts().len(), 1);
    }
}
