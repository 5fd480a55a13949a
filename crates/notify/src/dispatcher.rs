//! Fans alert notifications out to configured channels.
//!
//! Individual channel failures don't block other channels and never
//! fail the reconciliation run that produced the alert.

use tieout_core::config::AlertingConfig;

use crate::email::EmailNotifier;
use crate::traits::{AlertNotification, DispatchResult, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Dispatches alert notifications to every configured channel.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    /// Create an empty dispatcher (alerts persist but nothing is sent).
    pub fn empty() -> Self {
        Self { channels: Vec::new() }
    }

    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build channels from the alerting section of process config.
    pub fn from_config(config: &AlertingConfig) -> Result<Self, NotifyError> {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(url) = &config.webhook_url {
            channels.push(Box::new(WebhookNotifier::new(
                url.clone(),
                Default::default(),
                None,
            )?));
        }

        if config.email_configured() {
            // email_configured guarantees host and from are present.
            let host = config.smtp_host.as_deref().unwrap_or_default();
            let from = config.email_from.as_deref().unwrap_or_default();
            channels.push(Box::new(EmailNotifier::from_config(
                host,
                config.smtp_port,
                config.smtp_username.as_deref(),
                config.smtp_password.as_deref(),
                from,
                &config.email_to,
            )?));
        }

        Ok(Self { channels })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver a notification to all channels. Returns per-channel
    /// results; failures are logged, not propagated.
    pub async fn dispatch(&self, notification: &AlertNotification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(rule = %notification.rule_code, "no alert channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        rule = %notification.rule_code,
                        channel = channel.channel_name(),
                        duration_ms,
                        "alert delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        rule = %notification.rule_code,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                rule_code: notification.rule_code.clone(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct RecordingNotifier {
        sent: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _notification: &AlertNotification) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Config("boom".into()))
            } else {
                Ok(())
            }
        }

        fn channel_name(&self) -> &str {
            "recording"
        }
    }

    fn notification() -> AlertNotification {
        AlertNotification {
            property_code: "P-1".into(),
            property_name: "One".into(),
            rule_code: "COV-001".into(),
            period_label: "2025-07".into(),
            event: "opened".into(),
            materiality: "0.00".into(),
            trigger_count: 1,
            explanation: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_others() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let dispatcher = Dispatcher::new(vec![
            Box::new(RecordingNotifier { sent: first.clone(), fail: true }),
            Box::new(RecordingNotifier { sent: second.clone(), fail: false }),
        ]);

        let results = dispatcher.dispatch(&notification()).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_dispatcher_is_a_no_op() {
        let dispatcher = Dispatcher::empty();
        let results = dispatcher.dispatch(&notification()).await;
        assert!(results.is_empty());
    }
}
