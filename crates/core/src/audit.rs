//! Run, rule-definition, and result records: the engine's output model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Cents;
use crate::property::PeriodKey;

/// Rule category; one registry, six categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    ForensicAnomaly,
    CrossDocument,
    DataQuality,
    Analytics,
    Covenant,
    RentRollBalance,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 6] = [
        RuleCategory::ForensicAnomaly,
        RuleCategory::CrossDocument,
        RuleCategory::DataQuality,
        RuleCategory::Analytics,
        RuleCategory::Covenant,
        RuleCategory::RentRollBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::ForensicAnomaly => "forensic_anomaly",
            RuleCategory::CrossDocument => "cross_document",
            RuleCategory::DataQuality => "data_quality",
            RuleCategory::Analytics => "analytics",
            RuleCategory::Covenant => "covenant",
            RuleCategory::RentRollBalance => "rent_roll_balance",
        }
    }

    pub fn parse(s: &str) -> Option<RuleCategory> {
        RuleCategory::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity a rule reports when its check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Outcome of one rule evaluation.
///
/// `Error` marks an isolated internal failure inside the rule unit and
/// is rendered distinctly from a genuine `Critical` audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Warning,
    Critical,
    Info,
    Skip,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Warning => "warning",
            Outcome::Critical => "critical",
            Outcome::Info => "info",
            Outcome::Skip => "skip",
            Outcome::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Outcome> {
        match s {
            "pass" => Some(Outcome::Pass),
            "warning" => Some(Outcome::Warning),
            "critical" => Some(Outcome::Critical),
            "info" => Some(Outcome::Info),
            "skip" => Some(Outcome::Skip),
            "error" => Some(Outcome::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static catalog entry. Registered once at engine start; immutable at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub code: String,
    pub category: RuleCategory,
    pub severity_on_fail: Severity,
    pub description: String,
}

impl RuleDefinition {
    pub fn new(
        code: impl Into<String>,
        category: RuleCategory,
        severity_on_fail: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            category,
            severity_on_fail,
            description: description.into(),
        }
    }
}

/// Aggregate outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub pass: u32,
    pub warning: u32,
    pub critical: u32,
    pub info: u32,
    pub skip: u32,
    pub error: u32,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.pass += 1,
            Outcome::Warning => self.warning += 1,
            Outcome::Critical => self.critical += 1,
            Outcome::Info => self.info += 1,
            Outcome::Skip => self.skip += 1,
            Outcome::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.pass + self.warning + self.critical + self.info + self.skip + self.error
    }
}

/// Run lifecycle. `Failed` is reserved for infrastructure faults;
/// isolated rule errors end in `CompletedWithErrors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<RunStatus> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "completed_with_errors" => Some(RunStatus::CompletedWithErrors),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// One complete execution of the catalog for a (property, period).
/// Append-only: re-running creates a new run, never mutates history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub id: Uuid,
    pub property_id: Uuid,
    pub period: PeriodKey,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counts: OutcomeCounts,
}

impl ReconciliationRun {
    pub fn begin(property_id: Uuid, period: PeriodKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            period,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            counts: OutcomeCounts::default(),
        }
    }
}

/// One rule's outcome within a run. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: Uuid,
    pub run_id: Uuid,
    pub rule_code: String,
    pub category: RuleCategory,
    pub outcome: Outcome,
    /// Structured explanation: why flagged, what would resolve it,
    /// both compared values, prior-period delta where applicable.
    pub explanation: serde_json::Value,
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    pub variance_cents: Option<Cents>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_aggregate_every_outcome() {
        let mut counts = OutcomeCounts::default();
        for o in [
            Outcome::Pass,
            Outcome::Pass,
            Outcome::Warning,
            Outcome::Critical,
            Outcome::Info,
            Outcome::Skip,
            Outcome::Error,
        ] {
            counts.record(o);
        }
        assert_eq!(counts.pass, 2);
        assert_eq!(counts.warning, 1);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn outcome_round_trip() {
        for o in [
            Outcome::Pass,
            Outcome::Warning,
            Outcome::Critical,
            Outcome::Info,
            Outcome::Skip,
            Outcome::Error,
        ] {
            assert_eq!(Outcome::parse(o.as_str()), Some(o));
        }
        assert_eq!(Outcome::parse("nope"), None);
    }

    #[test]
    fn status_round_trip() {
        for s in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::CompletedWithErrors,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(s.as_str()), Some(s));
        }
    }
}
