//! In-memory structured log for reconciliation runs.
//!
//! Stores per-rule entries capped at a configurable maximum (default
//! 500) with FIFO eviction. Uses `std::sync::RwLock` so the engine can
//! write from spawned blocking evaluation as well as async contexts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for run log entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Numeric severity for comparison (higher = more severe).
    pub fn as_severity(&self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }
}

/// Phase of the run that produced the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Load,
    WindowResolution,
    Evaluation,
    Isolation,
    Escalation,
    Persist,
    Complete,
}

/// A single log entry attributed to one rule (or the run itself, keyed
/// by the run id).
#[derive(Debug, Clone, Serialize)]
pub struct RunLogEntry {
    pub timestamp: DateTime<Utc>,
    pub rule_code: String,
    pub level: LogLevel,
    pub phase: RunPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Filter parameters for reading back entries.
#[derive(Debug, Default, Deserialize)]
pub struct RunLogQuery {
    /// Minimum level (inclusive).
    pub level: Option<LogLevel>,
    /// Restrict to one phase.
    pub phase: Option<RunPhase>,
    /// Maximum entries returned (default 100).
    pub limit: Option<u32>,
}

/// In-memory per-rule run log with FIFO eviction.
pub struct RunLog {
    entries: Arc<RwLock<HashMap<String, VecDeque<RunLogEntry>>>>,
    max_entries_per_rule: usize,
}

impl RunLog {
    pub fn new() -> Self {
        Self::with_max_entries(500)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries_per_rule: max,
        }
    }

    pub fn log(&self, rule_code: &str, level: LogLevel, phase: RunPhase, message: impl Into<String>) {
        self.log_with_details(rule_code, level, phase, message, None, None);
    }

    pub fn log_with_details(
        &self,
        rule_code: &str,
        level: LogLevel,
        phase: RunPhase,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
        duration_ms: Option<u64>,
    ) {
        let entry = RunLogEntry {
            timestamp: Utc::now(),
            rule_code: rule_code.to_string(),
            level,
            phase,
            message: message.into(),
            details,
            duration_ms,
        };

        let mut guard = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let deque = guard.entry(rule_code.to_string()).or_default();
        deque.push_back(entry);
        while deque.len() > self.max_entries_per_rule {
            deque.pop_front();
        }
    }

    /// Entries for one rule, newest first.
    pub fn query(&self, rule_code: &str, params: &RunLogQuery) -> Vec<RunLogEntry> {
        let guard = match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(deque) = guard.get(rule_code) else {
            return Vec::new();
        };

        let min_severity = params.level.as_ref().map(|l| l.as_severity()).unwrap_or(0);
        let limit = params.limit.unwrap_or(100) as usize;

        deque
            .iter()
            .rev()
            .filter(|e| e.level.as_severity() >= min_severity)
            .filter(|e| params.phase.as_ref().map_or(true, |p| &e.phase == p))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear(&self, rule_code: &str) {
        let mut guard = match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(rule_code);
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_and_query_newest_first() {
        let log = RunLog::new();
        log.log("XD-101", LogLevel::Info, RunPhase::Evaluation, "started");
        log.log("XD-101", LogLevel::Debug, RunPhase::Evaluation, "comparing");
        log.log("XD-101", LogLevel::Warning, RunPhase::Escalation, "alert gate");

        let entries = log.query("XD-101", &RunLogQuery::default());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].phase, RunPhase::Escalation);
        assert_eq!(entries[2].message, "started");
    }

    #[test]
    fn level_and_phase_filters() {
        let log = RunLog::new();
        log.log("r", LogLevel::Debug, RunPhase::Evaluation, "d");
        log.log("r", LogLevel::Warning, RunPhase::Evaluation, "w");
        log.log("r", LogLevel::Error, RunPhase::Isolation, "e");

        let warnings = log.query(
            "r",
            &RunLogQuery { level: Some(LogLevel::Warning), phase: None, limit: None },
        );
        assert_eq!(warnings.len(), 2);

        let isolation = log.query(
            "r",
            &RunLogQuery { level: None, phase: Some(RunPhase::Isolation), limit: None },
        );
        assert_eq!(isolation.len(), 1);
        assert_eq!(isolation[0].message, "e");
    }

    #[test]
    fn fifo_eviction_drops_oldest() {
        let log = RunLog::with_max_entries(2);
        log.log("r", LogLevel::Info, RunPhase::Evaluation, "one");
        log.log("r", LogLevel::Info, RunPhase::Evaluation, "two");
        log.log("r", LogLevel::Info, RunPhase::Evaluation, "three");

        let entries = log.query("r", &RunLogQuery::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "two");
        assert_eq!(entries[0].message, "three");
    }

    #[test]
    fn rules_are_isolated_and_clearable() {
        let log = RunLog::new();
        log.log("a", LogLevel::Info, RunPhase::Evaluation, "a msg");
        log.log("b", LogLevel::Error, RunPhase::Persist, "b msg");

        assert_eq!(log.query("a", &RunLogQuery::default()).len(), 1);
        assert_eq!(log.query("b", &RunLogQuery::default()).len(), 1);
        log.clear("a");
        assert!(log.query("a", &RunLogQuery::default()).is_empty());
        assert_eq!(log.query("missing", &RunLogQuery::default()).len(), 0);
    }
}
