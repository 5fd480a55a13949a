//! Shared domain model for the tieout reconciliation engine.
//!
//! This crate defines the entities the rule engine operates on:
//! properties and reporting periods, extracted financial statements,
//! scoped configuration values, covenant thresholds, and the immutable
//! run/result/alert records the engine produces. It also carries the
//! integer-cents money arithmetic every rule comparison goes through.

pub mod accounts;
pub mod alert;
pub mod audit;
pub mod config;
pub mod covenant;
pub mod error;
pub mod money;
pub mod property;
pub mod statement;

pub use alert::{AlertStatus, CommitteeAlert, EscrowDocumentLink};
pub use audit::{
    Outcome, OutcomeCounts, ReconciliationRun, RuleCategory, RuleDefinition, RuleResult,
    RunStatus, Severity,
};
pub use config::Config;
pub use covenant::{ComparisonOperator, ConfigScope, ConfigValue, CovenantThreshold, CovenantType};
pub use error::TieoutError;
pub use money::Cents;
pub use property::{PeriodKey, Property, ReportingPeriod};
pub use statement::{LineItem, PeriodType, StatementBundle, StatementRecord, StatementType};
