//! The rule-unit trait and the evaluation context rules run against.
//!
//! A unit is a pure function of its context: same statements, same
//! thresholds, same outcome. Units never touch storage and never see
//! each other's results.

use tieout_core::money::{self, Cents};
use tieout_core::{
    Outcome, Property, ReportingPeriod, RuleDefinition, Severity, StatementBundle, StatementRecord,
    StatementType,
};
use tieout_core::{EscrowDocumentLink, RuleCategory};

use crate::period::WindowMap;
use crate::resolver::ThresholdResolver;

/// Internal failure inside one rule unit. Isolated by the engine into
/// a single `Outcome::Error` result; the run continues.
#[derive(Debug, thiserror::Error)]
pub enum RuleUnitError {
    #[error("arithmetic overflow while evaluating: {0}")]
    Overflow(String),

    #[error("rule invariant violated: {0}")]
    Invariant(String),
}

/// Everything a rule unit may look at, borrowed for the run.
pub struct RuleContext<'a> {
    pub property: &'a Property,
    pub period: &'a ReportingPeriod,
    pub bundle: &'a StatementBundle,
    /// Per-statement-type comparison windows, resolved once per run.
    pub windows: &'a WindowMap,
    pub resolver: &'a ThresholdResolver,
    /// Document links for escrow lines on the subject-period statements.
    pub escrow_links: &'a [EscrowDocumentLink],
}

impl<'a> RuleContext<'a> {
    pub fn current(&self, statement_type: StatementType) -> Option<&'a StatementRecord> {
        self.bundle.current(statement_type)
    }

    pub fn previous(&self, statement_type: StatementType) -> Option<&'a StatementRecord> {
        self.bundle.previous(statement_type)
    }

    /// Resolved tolerance in cents for a config key, honoring the
    /// property > category > global > default precedence.
    pub fn tolerance_cents(&self, key: &str, category: RuleCategory) -> Cents {
        self.resolver.tolerance_cents(key, category, &self.property.code)
    }

    pub fn setting(&self, key: &str, category: RuleCategory) -> f64 {
        self.resolver.resolve(key, category, &self.property.code)
    }
}

/// What one unit reports back to the engine.
#[derive(Debug, Clone)]
pub struct RuleEvaluation {
    pub outcome: Outcome,
    pub explanation: serde_json::Value,
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    pub variance_cents: Option<Cents>,
    /// Set by units whose CRITICAL findings should reach the
    /// committee. The engine still applies the materiality gate.
    pub requests_alert: bool,
    pub materiality_cents: Cents,
}

impl RuleEvaluation {
    pub fn new(outcome: Outcome, explanation: serde_json::Value) -> Self {
        Self {
            outcome,
            explanation,
            source_ref: None,
            target_ref: None,
            variance_cents: None,
            requests_alert: false,
            materiality_cents: 0,
        }
    }

    pub fn pass(explanation: serde_json::Value) -> Self {
        Self::new(Outcome::Pass, explanation)
    }

    pub fn info(explanation: serde_json::Value) -> Self {
        Self::new(Outcome::Info, explanation)
    }

    pub fn warning(explanation: serde_json::Value) -> Self {
        Self::new(Outcome::Warning, explanation)
    }

    pub fn critical(explanation: serde_json::Value) -> Self {
        Self::new(Outcome::Critical, explanation)
    }

    /// Inputs the unit needs are absent; not a finding.
    pub fn skip(reason: &str) -> Self {
        Self::new(Outcome::Skip, serde_json::json!({ "why": reason }))
    }

    /// Standard skip for a missing subject-period statement.
    pub fn skip_missing(statement_type: StatementType) -> Self {
        Self::skip(&format!("{statement_type} not extracted for this period"))
    }

    pub fn with_refs(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.source_ref = source;
        self.target_ref = target;
        self
    }

    pub fn with_variance(mut self, variance_cents: Cents) -> Self {
        self.variance_cents = Some(variance_cents);
        self
    }

    /// Mark the finding alert-worthy with the dollar amount at stake.
    pub fn with_alert(mut self, materiality_cents: Cents) -> Self {
        self.requests_alert = true;
        self.materiality_cents = materiality_cents;
        self
    }
}

/// One registered rule: a static definition plus the evaluation body.
///
/// `evaluate` must be deterministic and side-effect free. Returning
/// `Err` (or panicking) is isolated per unit by the engine.
pub trait RuleUnit: Send + Sync {
    fn definition(&self) -> &RuleDefinition;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError>;
}

/// Grade an absolute variance against the tolerance ladder:
/// within tolerance is PASS, within `critical_multiplier`× is WARNING,
/// beyond that CRITICAL. `severity_cap` bounds how bad a miss can get
/// for rules whose failure is never critical.
pub fn classify_variance(
    variance_cents: Cents,
    tolerance_cents: Cents,
    critical_multiplier: f64,
    severity_cap: Severity,
) -> Outcome {
    let abs = variance_cents.abs();
    if abs <= tolerance_cents {
        return Outcome::Pass;
    }
    let critical_floor = (tolerance_cents as f64 * critical_multiplier) as Cents;
    let graded = if abs <= critical_floor { Outcome::Warning } else { Outcome::Critical };
    cap_outcome(graded, severity_cap)
}

/// Clamp a graded outcome at a rule's declared failure severity.
pub fn cap_outcome(outcome: Outcome, severity_cap: Severity) -> Outcome {
    match (outcome, severity_cap) {
        (Outcome::Critical, Severity::Warning) => Outcome::Warning,
        (Outcome::Critical, Severity::Info) | (Outcome::Warning, Severity::Info) => Outcome::Info,
        (o, _) => o,
    }
}

/// Shared explanation payload for a two-sided amount comparison.
pub fn comparison_explanation(
    why: &str,
    resolution: &str,
    source_value: Cents,
    target_value: Cents,
    tolerance_cents: Cents,
) -> serde_json::Value {
    serde_json::json!({
        "why": why,
        "resolution": resolution,
        "source_value": money::format_cents(source_value),
        "target_value": money::format_cents(target_value),
        "variance": money::format_cents(money::variance(source_value, target_value)),
        "tolerance": money::format_cents(tolerance_cents),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_ladder() {
        // tolerance 100 cents, critical at 10x
        let t = 100;
        assert_eq!(classify_variance(0, t, 10.0, Severity::Critical), Outcome::Pass);
        assert_eq!(classify_variance(100, t, 10.0, Severity::Critical), Outcome::Pass);
        assert_eq!(classify_variance(-101, t, 10.0, Severity::Critical), Outcome::Warning);
        assert_eq!(classify_variance(1000, t, 10.0, Severity::Critical), Outcome::Warning);
        assert_eq!(classify_variance(1001, t, 10.0, Severity::Critical), Outcome::Critical);
    }

    #[test]
    fn severity_cap_downgrades() {
        assert_eq!(classify_variance(10_000, 100, 10.0, Severity::Warning), Outcome::Warning);
        assert_eq!(cap_outcome(Outcome::Critical, Severity::Info), Outcome::Info);
        assert_eq!(cap_outcome(Outcome::Pass, Severity::Info), Outcome::Pass);
    }

    #[test]
    fn alert_marking() {
        let eval = RuleEvaluation::critical(serde_json::json!({})).with_alert(50_000_00);
        assert!(eval.requests_alert);
        assert_eq!(eval.materiality_cents, 50_000_00);
        assert!(!RuleEvaluation::pass(serde_json::json!({})).requests_alert);
    }
}
