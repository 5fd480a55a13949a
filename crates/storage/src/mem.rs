//! In-memory store for tests and `--dry-run` worker invocations.
//!
//! Uses `std::sync::RwLock` so it can be seeded from sync test code
//! and read from async engine code.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use tieout_core::{
    CommitteeAlert, ConfigValue, CovenantThreshold, EscrowDocumentLink, PeriodKey, Property,
    ReconciliationRun, RuleResult, StatementRecord,
};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Default)]
struct Inner {
    properties: Vec<Property>,
    statements: Vec<StatementRecord>,
    config_values: Vec<ConfigValue>,
    covenants: Vec<CovenantThreshold>,
    escrow_links: Vec<EscrowDocumentLink>,
    runs: Vec<ReconciliationRun>,
    results: HashMap<Uuid, Vec<RuleResult>>,
    alerts: Vec<CommitteeAlert>,
}

/// In-memory [`Store`] implementation.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding (test/dry-run setup) ─────────────────────────────

    pub fn insert_property(&self, property: Property) {
        self.inner.write().expect("mem store lock poisoned").properties.push(property);
    }

    pub fn insert_statement(&self, statement: StatementRecord) {
        self.inner.write().expect("mem store lock poisoned").statements.push(statement);
    }

    pub fn insert_config_value(&self, value: ConfigValue) {
        self.inner.write().expect("mem store lock poisoned").config_values.push(value);
    }

    pub fn insert_covenant(&self, covenant: CovenantThreshold) {
        self.inner.write().expect("mem store lock poisoned").covenants.push(covenant);
    }

    pub fn insert_escrow_link(&self, link: EscrowDocumentLink) {
        self.inner.write().expect("mem store lock poisoned").escrow_links.push(link);
    }

    /// Total persisted run count, for assertions.
    pub fn run_count(&self) -> usize {
        self.inner.read().expect("mem store lock poisoned").runs.len()
    }

    /// Total alert count (any status), for assertions.
    pub fn alert_count(&self) -> usize {
        self.inner.read().expect("mem store lock poisoned").alerts.len()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        Ok(inner.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn properties(&self) -> Result<Vec<Property>, StoreError> {
        Ok(self.inner.read().expect("mem store lock poisoned").properties.clone())
    }

    async fn statements_in_range(
        &self,
        property_id: Uuid,
        from: PeriodKey,
        to: PeriodKey,
    ) -> Result<Vec<StatementRecord>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        Ok(inner
            .statements
            .iter()
            .filter(|s| s.property_id == property_id && s.period >= from && s.period <= to)
            .cloned()
            .collect())
    }

    async fn statement_periods(&self, property_id: Uuid) -> Result<Vec<PeriodKey>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        let mut periods: Vec<PeriodKey> = inner
            .statements
            .iter()
            .filter(|s| s.property_id == property_id)
            .map(|s| s.period)
            .collect();
        periods.sort();
        periods.dedup();
        Ok(periods)
    }

    async fn config_values(&self) -> Result<Vec<ConfigValue>, StoreError> {
        Ok(self.inner.read().expect("mem store lock poisoned").config_values.clone())
    }

    async fn covenant_thresholds(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<CovenantThreshold>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        Ok(inner
            .covenants
            .iter()
            .filter(|c| c.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn escrow_links(
        &self,
        statement_id: Uuid,
    ) -> Result<Vec<EscrowDocumentLink>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        Ok(inner
            .escrow_links
            .iter()
            .filter(|l| l.statement_id == statement_id)
            .cloned()
            .collect())
    }

    async fn persist_run(
        &self,
        run: &ReconciliationRun,
        results: &[RuleResult],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("mem store lock poisoned");
        inner.runs.push(run.clone());
        inner.results.insert(run.id, results.to_vec());
        Ok(())
    }

    async fn fetch_run(
        &self,
        run_id: Uuid,
    ) -> Result<Option<(ReconciliationRun, Vec<RuleResult>)>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        let Some(run) = inner.runs.iter().find(|r| r.id == run_id).cloned() else {
            return Ok(None);
        };
        let results = inner.results.get(&run_id).cloned().unwrap_or_default();
        Ok(Some((run, results)))
    }

    async fn list_runs(
        &self,
        property_id: Uuid,
        period: Option<PeriodKey>,
    ) -> Result<Vec<ReconciliationRun>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        let mut runs: Vec<ReconciliationRun> = inner
            .runs
            .iter()
            .filter(|r| r.property_id == property_id && period.map_or(true, |p| r.period == p))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn find_alert(
        &self,
        property_id: Uuid,
        rule_code: &str,
        period: PeriodKey,
    ) -> Result<Option<CommitteeAlert>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        Ok(inner
            .alerts
            .iter()
            .find(|a| {
                a.property_id == property_id && a.rule_code == rule_code && a.period == period
            })
            .cloned())
    }

    async fn upsert_alert(&self, alert: &CommitteeAlert) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("mem store lock poisoned");
        match inner.alerts.iter_mut().find(|a| {
            a.property_id == alert.property_id
                && a.rule_code == alert.rule_code
                && a.period == alert.period
        }) {
            Some(existing) => *existing = alert.clone(),
            None => inner.alerts.push(alert.clone()),
        }
        Ok(())
    }

    async fn update_alert_status(
        &self,
        alert_id: Uuid,
        status: tieout_core::AlertStatus,
        snooze_until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().expect("mem store lock poisoned");
        let alert = inner
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| StoreError::unknown("alert id", &alert_id.to_string()))?;
        alert.status = status;
        alert.snooze_until = snooze_until;
        Ok(())
    }

    async fn open_alerts(
        &self,
        property_id: Option<Uuid>,
    ) -> Result<Vec<CommitteeAlert>, StoreError> {
        let inner = self.inner.read().expect("mem store lock poisoned");
        let now = chrono::Utc::now();
        Ok(inner
            .alerts
            .iter()
            .filter(|a| property_id.map_or(true, |p| a.property_id == p))
            .filter(|a| a.effective_status(now) == tieout_core::AlertStatus::Open)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tieout_core::{Outcome, RuleCategory};

    fn property() -> Property {
        Property { id: Uuid::new_v4(), code: "P-1".into(), name: "One".into() }
    }

    fn run_for(property_id: Uuid) -> ReconciliationRun {
        ReconciliationRun::begin(property_id, PeriodKey::new(2025, 7))
    }

    #[tokio::test]
    async fn persist_and_fetch_run() {
        let store = MemStore::new();
        let prop = property();
        let run = run_for(prop.id);
        let result = RuleResult {
            id: Uuid::new_v4(),
            run_id: run.id,
            rule_code: "XD-001".into(),
            category: RuleCategory::CrossDocument,
            outcome: Outcome::Pass,
            explanation: serde_json::json!({}),
            source_ref: None,
            target_ref: None,
            variance_cents: Some(0),
        };
        store.persist_run(&run, std::slice::from_ref(&result)).await.unwrap();

        let (fetched, results) = store.fetch_run(run.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rule_code, "XD-001");
    }

    #[tokio::test]
    async fn rerun_appends_never_replaces() {
        let store = MemStore::new();
        let prop = property();
        let first = run_for(prop.id);
        let second = run_for(prop.id);
        store.persist_run(&first, &[]).await.unwrap();
        store.persist_run(&second, &[]).await.unwrap();

        let runs = store.list_runs(prop.id, Some(PeriodKey::new(2025, 7))).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(store.fetch_run(first.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn alert_upsert_dedupes_by_key() {
        let store = MemStore::new();
        let prop = property();
        let period = PeriodKey::new(2025, 7);
        let mut alert =
            CommitteeAlert::open(prop.id, "COV-001", period, 1_000_00, serde_json::json!({}));
        store.upsert_alert(&alert).await.unwrap();
        alert.retrigger(2_000_00, serde_json::json!({}));
        store.upsert_alert(&alert).await.unwrap();

        assert_eq!(store.alert_count(), 1);
        let found = store.find_alert(prop.id, "COV-001", period).await.unwrap().unwrap();
        assert_eq!(found.trigger_count, 2);
        assert_eq!(found.materiality_cents, 2_000_00);
    }

    #[tokio::test]
    async fn status_update_hides_alert_from_open_listing() {
        let store = MemStore::new();
        let prop = property();
        let period = PeriodKey::new(2025, 7);
        let alert =
            CommitteeAlert::open(prop.id, "COV-001", period, 0, serde_json::json!({}));
        store.upsert_alert(&alert).await.unwrap();
        assert_eq!(store.open_alerts(Some(prop.id)).await.unwrap().len(), 1);

        store
            .update_alert_status(alert.id, tieout_core::AlertStatus::Resolved, None)
            .await
            .unwrap();
        assert!(store.open_alerts(Some(prop.id)).await.unwrap().is_empty());

        let missing = store
            .update_alert_status(Uuid::new_v4(), tieout_core::AlertStatus::Open, None)
            .await;
        assert!(missing.is_err());
    }
}
