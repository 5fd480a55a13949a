//! Committee alerts and escrow document links.
//!
//! Alerts carry their own workflow, decoupled from the immutable
//! rule-result history that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Cents;
use crate::property::PeriodKey;

/// Alert workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Suppressed => "suppressed",
        }
    }

    pub fn parse(s: &str) -> Option<AlertStatus> {
        match s {
            "open" => Some(AlertStatus::Open),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            "suppressed" => Some(AlertStatus::Suppressed),
            _ => None,
        }
    }

    /// Whether a repeat CRITICAL should update this alert in place
    /// rather than open a new one.
    pub fn is_live(&self) -> bool {
        matches!(self, AlertStatus::Open | AlertStatus::Acknowledged)
    }
}

/// A deduplicated committee alert derived from a material CRITICAL
/// result. Unique per (property, rule, period).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeAlert {
    pub id: Uuid,
    pub property_id: Uuid,
    pub rule_code: String,
    pub period: PeriodKey,
    pub status: AlertStatus,
    pub materiality_cents: Cents,
    pub explanation: serde_json::Value,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub trigger_count: u32,
    pub snooze_until: Option<DateTime<Utc>>,
}

impl CommitteeAlert {
    pub fn open(
        property_id: Uuid,
        rule_code: &str,
        period: PeriodKey,
        materiality_cents: Cents,
        explanation: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            property_id,
            rule_code: rule_code.to_string(),
            period,
            status: AlertStatus::Open,
            materiality_cents,
            explanation,
            first_seen: now,
            last_seen: now,
            trigger_count: 1,
            snooze_until: None,
        }
    }

    /// Record a repeat trigger of the same condition.
    pub fn retrigger(&mut self, materiality_cents: Cents, explanation: serde_json::Value) {
        self.last_seen = Utc::now();
        self.trigger_count += 1;
        self.materiality_cents = materiality_cents;
        self.explanation = explanation;
    }

    pub fn acknowledge(&mut self) {
        self.status = AlertStatus::Acknowledged;
    }

    pub fn resolve(&mut self) {
        self.status = AlertStatus::Resolved;
        self.snooze_until = None;
    }

    pub fn suppress(&mut self) {
        self.status = AlertStatus::Suppressed;
        self.snooze_until = None;
    }

    /// Suppress until `until`; after that the alert reports as Open.
    pub fn snooze(&mut self, until: DateTime<Utc>) {
        self.status = AlertStatus::Suppressed;
        self.snooze_until = Some(until);
    }

    /// Effective status: a snooze that has lapsed reports as Open.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AlertStatus {
        match (self.status, self.snooze_until) {
            (AlertStatus::Suppressed, Some(until)) if now >= until => AlertStatus::Open,
            (status, _) => status,
        }
    }
}

/// Links one escrow statement line to a supporting document reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowDocumentLink {
    pub statement_id: Uuid,
    pub account_code: String,
    pub document_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn retrigger_updates_in_place() {
        let mut alert = CommitteeAlert::open(
            Uuid::new_v4(),
            "COV-001",
            PeriodKey::new(2025, 7),
            100_000_00,
            serde_json::json!({"why": "dscr below covenant"}),
        );
        let first_seen = alert.first_seen;
        alert.retrigger(120_000_00, serde_json::json!({"why": "still below"}));
        assert_eq!(alert.trigger_count, 2);
        assert_eq!(alert.materiality_cents, 120_000_00);
        assert_eq!(alert.first_seen, first_seen);
    }

    #[test]
    fn snooze_expiry_reports_open() {
        let mut alert = CommitteeAlert::open(
            Uuid::new_v4(),
            "COV-001",
            PeriodKey::new(2025, 7),
            0,
            serde_json::Value::Null,
        );
        let now = Utc::now();
        alert.snooze(now + Duration::hours(1));
        assert_eq!(alert.effective_status(now), AlertStatus::Suppressed);
        assert_eq!(alert.effective_status(now + Duration::hours(2)), AlertStatus::Open);
    }

    #[test]
    fn workflow_transitions() {
        let mut alert = CommitteeAlert::open(
            Uuid::new_v4(),
            "COV-001",
            PeriodKey::new(2025, 7),
            0,
            serde_json::Value::Null,
        );
        alert.acknowledge();
        assert!(alert.status.is_live());
        alert.snooze(Utc::now() + Duration::days(7));
        assert_eq!(alert.status, AlertStatus::Suppressed);
        alert.resolve();
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert!(alert.snooze_until.is_none());
    }

    #[test]
    fn live_statuses() {
        assert!(AlertStatus::Open.is_live());
        assert!(AlertStatus::Acknowledged.is_live());
        assert!(!AlertStatus::Resolved.is_live());
        assert!(!AlertStatus::Suppressed.is_live());
    }
}
