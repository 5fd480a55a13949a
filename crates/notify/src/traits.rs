//! Notifier trait definition and shared error types.

use tieout_core::{CommitteeAlert, Property};

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A committee alert paired with the context channels render from.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertNotification {
    pub property_code: String,
    pub property_name: String,
    pub rule_code: String,
    pub period_label: String,
    /// `"opened"` for a new alert, `"retriggered"` for a repeat.
    pub event: String,
    pub materiality: String,
    pub trigger_count: u32,
    pub explanation: serde_json::Value,
}

impl AlertNotification {
    pub fn from_alert(property: &Property, alert: &CommitteeAlert, event: &str) -> Self {
        Self {
            property_code: property.code.clone(),
            property_name: property.name.clone(),
            rule_code: alert.rule_code.clone(),
            period_label: alert.period.label(),
            event: event.to_string(),
            materiality: tieout_core::money::format_cents(alert.materiality_cents),
            trigger_count: alert.trigger_count,
            explanation: alert.explanation.clone(),
        }
    }
}

/// Trait for alert delivery channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert notification through this channel.
    async fn send(&self, notification: &AlertNotification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching an alert to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub rule_code: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
