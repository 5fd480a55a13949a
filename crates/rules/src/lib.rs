//! Reconciliation rule engine.
//!
//! Loads extracted statements for a (property, period), resolves
//! comparison windows and thresholds once per run, evaluates the full
//! rule catalog with per-unit fault isolation, persists the immutable
//! run history, and escalates material CRITICAL findings into
//! deduplicated committee alerts.

pub mod analytics;
pub mod catalog;
pub mod covenant;
pub mod crossdoc;
pub mod engine;
pub mod escalate;
pub mod fixtures;
pub mod forensic;
pub mod locks;
pub mod period;
pub mod quality;
pub mod rentroll;
pub mod resolver;
pub mod run_log;
pub mod unit;

pub use catalog::RuleCatalog;
pub use engine::{Engine, EngineError, RunOptions, RunOutput};
pub use escalate::{EscalationEvent, Escalator};
pub use locks::RunLocks;
pub use period::{PeriodResolutionError, ResolvedWindow, WindowMap};
pub use resolver::ThresholdResolver;
pub use run_log::{LogLevel, RunLog, RunLogEntry};
pub use unit::{RuleContext, RuleEvaluation, RuleUnit, RuleUnitError};
