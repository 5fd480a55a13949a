//! Alert escalation: material CRITICAL findings become committee
//! alerts, deduplicated per (property, rule, period), and fan out to
//! the configured delivery channels.
//!
//! Delivery failures never fail the run; the alert row is the source
//! of truth and channels are best-effort.

use std::sync::Arc;

use tieout_core::money::{format_cents, Cents};
use tieout_core::{CommitteeAlert, PeriodKey, Property, RuleCategory, RuleDefinition};
use tieout_notify::{AlertNotification, Dispatcher};
use tieout_storage::{Store, StoreError};

use crate::unit::RuleEvaluation;

/// What escalation did with one alert-worthy result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationEvent {
    /// New alert opened and dispatched.
    Opened,
    /// Live alert updated in place and re-dispatched.
    Retriggered,
    /// Alert updated but suppressed from delivery (snoozed).
    Suppressed,
    /// Below the materiality gate; nothing recorded.
    Gated,
}

pub struct Escalator {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
}

impl Escalator {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Escalate one CRITICAL result that requested an alert.
    ///
    /// `gate_cents` is the configured alert materiality floor. Covenant
    /// breaches bypass the gate: the threshold came out of a loan
    /// agreement, so there is no immaterial breach.
    pub async fn escalate(
        &self,
        property: &Property,
        period: PeriodKey,
        definition: &RuleDefinition,
        evaluation: &RuleEvaluation,
        gate_cents: Cents,
    ) -> Result<EscalationEvent, StoreError> {
        let bypasses_gate = definition.category == RuleCategory::Covenant;
        if !bypasses_gate && evaluation.materiality_cents < gate_cents {
            tracing::debug!(
                rule = %definition.code,
                materiality = %format_cents(evaluation.materiality_cents),
                gate = %format_cents(gate_cents),
                "finding below alert materiality gate"
            );
            return Ok(EscalationEvent::Gated);
        }

        let existing = self
            .store
            .find_alert(property.id, &definition.code, period)
            .await?;

        let now = chrono::Utc::now();
        match existing {
            Some(mut alert) if alert.effective_status(now).is_live() => {
                alert.retrigger(evaluation.materiality_cents, evaluation.explanation.clone());
                self.store.upsert_alert(&alert).await?;
                tracing::info!(
                    rule = %definition.code,
                    property = %property.code,
                    trigger_count = alert.trigger_count,
                    "committee alert retriggered"
                );
                let notification = AlertNotification::from_alert(property, &alert, "retriggered");
                self.dispatcher.dispatch(&notification).await;
                Ok(EscalationEvent::Retriggered)
            }
            Some(mut alert)
                if alert.effective_status(now) == tieout_core::AlertStatus::Suppressed =>
            {
                // Keep the record current but honor the snooze.
                alert.retrigger(evaluation.materiality_cents, evaluation.explanation.clone());
                self.store.upsert_alert(&alert).await?;
                tracing::debug!(
                    rule = %definition.code,
                    property = %property.code,
                    "alert updated while snoozed; delivery suppressed"
                );
                Ok(EscalationEvent::Suppressed)
            }
            _ => {
                // No alert, or a resolved one whose condition has
                // re-fired: open fresh.
                let alert = CommitteeAlert::open(
                    property.id,
                    &definition.code,
                    period,
                    evaluation.materiality_cents,
                    evaluation.explanation.clone(),
                );
                self.store.upsert_alert(&alert).await?;
                tracing::info!(
                    rule = %definition.code,
                    property = %property.code,
                    materiality = %format_cents(alert.materiality_cents),
                    "committee alert opened"
                );
                let notification = AlertNotification::from_alert(property, &alert, "opened");
                self.dispatcher.dispatch(&notification).await;
                Ok(EscalationEvent::Opened)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tieout_core::{AlertStatus, Severity};
    use tieout_storage::MemStore;
    use uuid::Uuid;

    fn property() -> Property {
        Property {
            id: Uuid::new_v4(),
            code: "MAPLE-01".into(),
            name: "Maple Court Apartments".into(),
        }
    }

    fn critical_eval(materiality: Cents) -> RuleEvaluation {
        RuleEvaluation::critical(serde_json::json!({"why": "mortgage balances diverge"}))
            .with_alert(materiality)
    }

    fn crossdoc_def() -> RuleDefinition {
        RuleDefinition::new(
            "XD-101",
            RuleCategory::CrossDocument,
            Severity::Critical,
            "Mortgage payable ties to servicer balance",
        )
    }

    #[tokio::test]
    async fn opens_then_retriggers_in_place() {
        let store = Arc::new(MemStore::new());
        let escalator = Escalator::new(store.clone(), Dispatcher::empty());
        let prop = property();
        let period = PeriodKey::new(2025, 7);
        let def = crossdoc_def();

        let first = escalator
            .escalate(&prop, period, &def, &critical_eval(45_000_00), 10_000_00)
            .await
            .unwrap();
        assert_eq!(first, EscalationEvent::Opened);
        assert_eq!(store.alert_count(), 1);

        let second = escalator
            .escalate(&prop, period, &def, &critical_eval(47_000_00), 10_000_00)
            .await
            .unwrap();
        assert_eq!(second, EscalationEvent::Retriggered);
        assert_eq!(store.alert_count(), 1, "dedup must update, not duplicate");

        let alert = store.find_alert(prop.id, "XD-101", period).await.unwrap().unwrap();
        assert_eq!(alert.trigger_count, 2);
        assert_eq!(alert.materiality_cents, 47_000_00);
    }

    #[tokio::test]
    async fn immaterial_findings_are_gated() {
        let store = Arc::new(MemStore::new());
        let escalator = Escalator::new(store.clone(), Dispatcher::empty());
        let prop = property();

        let event = escalator
            .escalate(&prop, PeriodKey::new(2025, 7), &crossdoc_def(), &critical_eval(5_000_00), 10_000_00)
            .await
            .unwrap();
        assert_eq!(event, EscalationEvent::Gated);
        assert_eq!(store.alert_count(), 0);
    }

    #[tokio::test]
    async fn covenant_breaches_bypass_the_gate() {
        let store = Arc::new(MemStore::new());
        let escalator = Escalator::new(store.clone(), Dispatcher::empty());
        let prop = property();
        let def = RuleDefinition::new(
            "CV-001",
            RuleCategory::Covenant,
            Severity::Critical,
            "Debt service coverage covenant",
        );

        let event = escalator
            .escalate(&prop, PeriodKey::new(2025, 7), &def, &critical_eval(0), 10_000_00)
            .await
            .unwrap();
        assert_eq!(event, EscalationEvent::Opened);
    }

    #[tokio::test]
    async fn resolved_alert_reopens_fresh() {
        let store = Arc::new(MemStore::new());
        let escalator = Escalator::new(store.clone(), Dispatcher::empty());
        let prop = property();
        let period = PeriodKey::new(2025, 7);
        let def = crossdoc_def();

        escalator
            .escalate(&prop, period, &def, &critical_eval(45_000_00), 10_000_00)
            .await
            .unwrap();
        let mut alert = store.find_alert(prop.id, "XD-101", period).await.unwrap().unwrap();
        let resolved_id = alert.id;
        alert.status = AlertStatus::Resolved;
        store.upsert_alert(&alert).await.unwrap();

        let event = escalator
            .escalate(&prop, period, &def, &critical_eval(46_000_00), 10_000_00)
            .await
            .unwrap();
        assert_eq!(event, EscalationEvent::Opened);
        let reopened = store.find_alert(prop.id, "XD-101", period).await.unwrap().unwrap();
        assert_ne!(reopened.id, resolved_id);
        assert_eq!(reopened.trigger_count, 1);
    }
}
