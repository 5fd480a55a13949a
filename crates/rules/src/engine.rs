//! The reconciliation engine: loads inputs, evaluates the catalog,
//! persists the run, escalates material criticals.
//!
//! One run per (property, period) at a time, enforced in-process via
//! [`RunLocks`]. Every unit is fault-isolated: a panic or internal
//! error becomes a single `Outcome::Error` result and the run carries
//! on, finishing as `CompletedWithErrors`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use tieout_core::error::TieoutError;
use tieout_core::{
    Outcome, PeriodKey, Property, ReconciliationRun, ReportingPeriod, RuleDefinition, RuleResult,
    RunStatus, StatementBundle,
};
use tieout_notify::Dispatcher;
use tieout_storage::{Store, StoreError};

use crate::catalog::RuleCatalog;
use crate::escalate::{EscalationEvent, Escalator};
use crate::locks::RunLocks;
use crate::period::WindowMap;
use crate::resolver::ThresholdResolver;
use crate::run_log::{LogLevel, RunLog, RunPhase};
use crate::unit::{RuleContext, RuleEvaluation};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a run is already in progress for property {property_id} period {period}")]
    RunInProgress { property_id: Uuid, period: PeriodKey },

    #[error("property {0} not found")]
    PropertyNotFound(Uuid),

    #[error("invalid reporting period: {0}")]
    InvalidPeriod(#[from] TieoutError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Months of trailing statements loaded alongside the subject
    /// period. Delta ties need one; YTD and trend screens want more.
    pub lookback_months: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { lookback_months: 13 }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutput {
    pub run: ReconciliationRun,
    pub results: Vec<RuleResult>,
    pub escalations: Vec<(String, EscalationEvent)>,
}

pub struct Engine {
    store: Arc<dyn Store>,
    catalog: RuleCatalog,
    escalator: Escalator,
    locks: RunLocks,
    log: RunLog,
}

impl Engine {
    /// Engine with the full standard catalog.
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self::with_catalog(store, dispatcher, RuleCatalog::standard())
    }

    /// Engine over a caller-supplied catalog. Used by tests and by
    /// deployments that trim categories.
    pub fn with_catalog(
        store: Arc<dyn Store>,
        dispatcher: Dispatcher,
        catalog: RuleCatalog,
    ) -> Self {
        let escalator = Escalator::new(store.clone(), dispatcher);
        Self {
            store,
            catalog,
            escalator,
            locks: RunLocks::new(),
            log: RunLog::new(),
        }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn run_log(&self) -> &RunLog {
        &self.log
    }

    /// Evaluate the full catalog for one property-period.
    pub async fn run(
        &self,
        property_id: Uuid,
        period: PeriodKey,
        options: &RunOptions,
    ) -> Result<RunOutput, EngineError> {
        self.run_cancellable(property_id, period, options, &AtomicBool::new(false))
            .await
    }

    /// As [`run`], but checks `cancel` between units; once set, the
    /// remaining units record SKIP and the run still persists.
    pub async fn run_cancellable(
        &self,
        property_id: Uuid,
        period: PeriodKey,
        options: &RunOptions,
        cancel: &AtomicBool,
    ) -> Result<RunOutput, EngineError> {
        let _guard = self
            .locks
            .acquire(property_id, period)
            .ok_or(EngineError::RunInProgress { property_id, period })?;

        let property = self
            .store
            .property(property_id)
            .await?
            .ok_or(EngineError::PropertyNotFound(property_id))?;
        let reporting = ReportingPeriod::new(property.id, period.year, period.month)?;

        let mut run = ReconciliationRun::begin(property_id, period);
        run.status = RunStatus::Running;
        let run_code = run.id.to_string();
        tracing::info!(
            run = %run.id,
            property = %property.code,
            period = %period.label(),
            "reconciliation run started"
        );

        // ── Load ─────────────────────────────────────────────────────
        let mut from = period;
        for _ in 0..options.lookback_months {
            from = from.prev();
        }
        let statements = self.store.statements_in_range(property_id, from, period).await?;
        let config_values = self.store.config_values().await?;
        let covenants = self.store.covenant_thresholds(property_id).await?;

        let mut escrow_links = Vec::new();
        for stmt in statements.iter().filter(|s| s.period == period) {
            escrow_links.extend(self.store.escrow_links(stmt.id).await?);
        }
        self.log.log_with_details(
            &run_code,
            LogLevel::Info,
            RunPhase::Load,
            "inputs loaded",
            Some(serde_json::json!({
                "statements": statements.len(),
                "config_values": config_values.len(),
                "covenants": covenants.len(),
                "escrow_links": escrow_links.len(),
            })),
            None,
        );

        let resolver = ThresholdResolver::new(&config_values, covenants);
        let bundle = StatementBundle::new(property.clone(), reporting.clone(), statements);
        let windows = WindowMap::resolve_all(&bundle);
        self.log.log(&run_code, LogLevel::Info, RunPhase::WindowResolution, "windows resolved");

        let ctx = RuleContext {
            property: &property,
            period: &reporting,
            bundle: &bundle,
            windows: &windows,
            resolver: &resolver,
            escrow_links: &escrow_links,
        };

        // ── Evaluate ─────────────────────────────────────────────────
        let mut results = Vec::with_capacity(self.catalog.len());
        let mut evaluations: Vec<(RuleDefinition, RuleEvaluation)> = Vec::new();

        for unit in self.catalog.iter() {
            let definition = unit.definition().clone();
            let evaluation = if cancel.load(Ordering::SeqCst) {
                RuleEvaluation::skip("run cancelled before this unit evaluated")
            } else {
                self.evaluate_isolated(unit, &ctx, &definition)
            };

            run.counts.record(evaluation.outcome);
            results.push(RuleResult {
                id: Uuid::new_v4(),
                run_id: run.id,
                rule_code: definition.code.clone(),
                category: definition.category,
                outcome: evaluation.outcome,
                explanation: evaluation.explanation.clone(),
                source_ref: evaluation.source_ref.clone(),
                target_ref: evaluation.target_ref.clone(),
                variance_cents: evaluation.variance_cents,
            });
            evaluations.push((definition, evaluation));
        }

        run.status = if run.counts.error > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
        run.completed_at = Some(chrono::Utc::now());

        self.store.persist_run(&run, &results).await?;
        self.log.log(&run_code, LogLevel::Info, RunPhase::Persist, "run and results persisted");

        // ── Escalate ─────────────────────────────────────────────────
        let escalations = self
            .escalate_criticals(&property, period, &resolver, &evaluations, &run_code)
            .await;

        tracing::info!(
            run = %run.id,
            status = run.status.as_str(),
            pass = run.counts.pass,
            warning = run.counts.warning,
            critical = run.counts.critical,
            error = run.counts.error,
            "reconciliation run finished"
        );
        self.log.log(&run_code, LogLevel::Info, RunPhase::Complete, run.status.as_str());

        Ok(RunOutput { run, results, escalations })
    }

    /// Evaluate one unit, converting internal errors and panics into a
    /// single `Outcome::Error` result.
    fn evaluate_isolated(
        &self,
        unit: &dyn crate::unit::RuleUnit,
        ctx: &RuleContext<'_>,
        definition: &RuleDefinition,
    ) -> RuleEvaluation {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| unit.evaluate(ctx)));
        let elapsed = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(evaluation)) => {
                self.log.log_with_details(
                    &definition.code,
                    LogLevel::Debug,
                    RunPhase::Evaluation,
                    evaluation.outcome.as_str(),
                    None,
                    Some(elapsed),
                );
                evaluation
            }
            Ok(Err(err)) => {
                tracing::warn!(rule = %definition.code, error = %err, "rule unit failed");
                self.log.log_with_details(
                    &definition.code,
                    LogLevel::Error,
                    RunPhase::Isolation,
                    err.to_string(),
                    None,
                    Some(elapsed),
                );
                RuleEvaluation::new(
                    Outcome::Error,
                    serde_json::json!({
                        "why": format!("rule unit failed internally: {err}"),
                        "resolution": "file against the rule implementation, not the statements",
                    }),
                )
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(rule = %definition.code, panic = %detail, "rule unit panicked");
                self.log.log_with_details(
                    &definition.code,
                    LogLevel::Error,
                    RunPhase::Isolation,
                    format!("panicked: {detail}"),
                    None,
                    Some(elapsed),
                );
                RuleEvaluation::new(
                    Outcome::Error,
                    serde_json::json!({
                        "why": format!("rule unit panicked: {detail}"),
                        "resolution": "file against the rule implementation, not the statements",
                    }),
                )
            }
        }
    }

    async fn escalate_criticals(
        &self,
        property: &Property,
        period: PeriodKey,
        resolver: &ThresholdResolver,
        evaluations: &[(RuleDefinition, RuleEvaluation)],
        run_code: &str,
    ) -> Vec<(String, EscalationEvent)> {
        let mut events = Vec::new();
        for (definition, evaluation) in evaluations {
            if evaluation.outcome != Outcome::Critical || !evaluation.requests_alert {
                continue;
            }
            let gate = resolver.tolerance_cents(
                "alert.materiality",
                definition.category,
                &property.code,
            );
            match self
                .escalator
                .escalate(property, period, definition, evaluation, gate)
                .await
            {
                Ok(event) => {
                    self.log.log(
                        run_code,
                        LogLevel::Info,
                        RunPhase::Escalation,
                        format!("{}: {:?}", definition.code, event),
                    );
                    events.push((definition.code.clone(), event));
                }
                Err(err) => {
                    // The run is already persisted; a failed alert
                    // write is reported but does not fail the run.
                    tracing::error!(
                        rule = %definition.code,
                        error = %err,
                        "alert escalation failed"
                    );
                    self.log.log(
                        run_code,
                        LogLevel::Error,
                        RunPhase::Escalation,
                        format!("{}: {err}", definition.code),
                    );
                }
            }
        }
        events
    }
}
