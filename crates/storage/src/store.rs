//! The storage trait the engine runs against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tieout_core::{
    AlertStatus, CommitteeAlert, ConfigValue, CovenantThreshold, EscrowDocumentLink, PeriodKey,
    Property, ReconciliationRun, RuleResult, StatementRecord,
};

use crate::error::StoreError;

/// Storage operations the orchestrator and escalator need.
///
/// Implementations must make `persist_run` transactional: either the
/// run and all its results land, or nothing does.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Read-only input ──────────────────────────────────────────

    async fn property(&self, id: Uuid) -> Result<Option<Property>, StoreError>;

    async fn properties(&self) -> Result<Vec<Property>, StoreError>;

    /// All statements for a property with period in `[from, to]`
    /// inclusive, any statement type.
    async fn statements_in_range(
        &self,
        property_id: Uuid,
        from: PeriodKey,
        to: PeriodKey,
    ) -> Result<Vec<StatementRecord>, StoreError>;

    /// Periods for which a property has at least one statement.
    async fn statement_periods(&self, property_id: Uuid) -> Result<Vec<PeriodKey>, StoreError>;

    async fn config_values(&self) -> Result<Vec<ConfigValue>, StoreError>;

    async fn covenant_thresholds(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<CovenantThreshold>, StoreError>;

    async fn escrow_links(
        &self,
        statement_id: Uuid,
    ) -> Result<Vec<EscrowDocumentLink>, StoreError>;

    // ── Run history (append-only) ────────────────────────────────

    /// Persist a completed run and its results atomically.
    async fn persist_run(
        &self,
        run: &ReconciliationRun,
        results: &[RuleResult],
    ) -> Result<(), StoreError>;

    async fn fetch_run(
        &self,
        run_id: Uuid,
    ) -> Result<Option<(ReconciliationRun, Vec<RuleResult>)>, StoreError>;

    /// Runs for a property/period, newest first.
    async fn list_runs(
        &self,
        property_id: Uuid,
        period: Option<PeriodKey>,
    ) -> Result<Vec<ReconciliationRun>, StoreError>;

    // ── Alerts ───────────────────────────────────────────────────

    async fn find_alert(
        &self,
        property_id: Uuid,
        rule_code: &str,
        period: PeriodKey,
    ) -> Result<Option<CommitteeAlert>, StoreError>;

    /// Insert or replace the alert row keyed by
    /// (property, rule, period).
    async fn upsert_alert(&self, alert: &CommitteeAlert) -> Result<(), StoreError>;

    /// Workflow transition on one alert: acknowledge, resolve,
    /// suppress, or snooze. Fails if the alert does not exist.
    async fn update_alert_status(
        &self,
        alert_id: Uuid,
        status: AlertStatus,
        snooze_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    async fn open_alerts(
        &self,
        property_id: Option<Uuid>,
    ) -> Result<Vec<CommitteeAlert>, StoreError>;
}
