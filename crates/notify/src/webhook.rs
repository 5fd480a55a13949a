//! Generic HTTP webhook notifier.
//!
//! Delivers alert notifications as JSON POST payloads to a configured
//! endpoint.

use std::collections::HashMap;

use crate::templating;
use crate::traits::{AlertNotification, Notifier, NotifyError};

/// Delivers alerts as JSON over HTTP to a configured endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    /// Custom headers to include on every request.
    headers: HashMap<String, String>,
    /// Optional minijinja body template. When unset the notification
    /// plus rendered subject/body is serialized as JSON directly.
    body_template: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(
        url: String,
        headers: HashMap<String, String>,
        body_template: Option<String>,
    ) -> Result<Self, NotifyError> {
        if let Some(ref tmpl) = body_template {
            templating::validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }
        Ok(Self { url, headers, body_template, client: reqwest::Client::new() })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        let message = templating::render(notification, None, self.body_template.as_deref())?;

        let payload = serde_json::json!({
            "subject": message.subject,
            "body": message.body,
            "alert": notification,
        });

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&payload);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Config(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(url = %self.url, %status, "alert webhook delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_body_template_rejected() {
        let result =
            WebhookNotifier::new("https://example.com".into(), HashMap::new(), Some("{{ x".into()));
        assert!(result.is_err());
    }

    #[test]
    fn channel_name_is_webhook() {
        let notifier =
            WebhookNotifier::new("https://example.com".into(), HashMap::new(), None).unwrap();
        assert_eq!(notifier.channel_name(), "webhook");
    }
}
