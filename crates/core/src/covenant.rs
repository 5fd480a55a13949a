//! Scoped configuration values and loan covenant thresholds.
//!
//! Administrators manage both externally; the engine only reads them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope of a configuration value, in ascending precedence:
/// global < category < property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigScope {
    Global,
    Category,
    Property,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::Global => "global",
            ConfigScope::Category => "category",
            ConfigScope::Property => "property",
        }
    }

    pub fn parse(s: &str) -> Option<ConfigScope> {
        match s {
            "global" => Some(ConfigScope::Global),
            "category" => Some(ConfigScope::Category),
            "property" => Some(ConfigScope::Property),
            _ => None,
        }
    }
}

/// One scoped key→value pair.
///
/// `scope_ref` carries the rule-category name for category scope and
/// the property code for property scope; `None` for global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue {
    pub key: String,
    pub scope: ConfigScope,
    pub scope_ref: Option<String>,
    pub value: f64,
}

impl ConfigValue {
    pub fn global(key: &str, value: f64) -> Self {
        Self { key: key.to_string(), scope: ConfigScope::Global, scope_ref: None, value }
    }

    pub fn category(key: &str, category: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            scope: ConfigScope::Category,
            scope_ref: Some(category.to_string()),
            value,
        }
    }

    pub fn property(key: &str, property_code: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            scope: ConfigScope::Property,
            scope_ref: Some(property_code.to_string()),
            value,
        }
    }
}

/// Covenant metric monitored per property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovenantType {
    MinDscr,
    MaxLtv,
    MinDebtYield,
    MinOccupancy,
    MinLiquidity,
    MaxExpenseRatio,
    MinNoi,
    MinReserveBalance,
}

impl CovenantType {
    pub const ALL: [CovenantType; 8] = [
        CovenantType::MinDscr,
        CovenantType::MaxLtv,
        CovenantType::MinDebtYield,
        CovenantType::MinOccupancy,
        CovenantType::MinLiquidity,
        CovenantType::MaxExpenseRatio,
        CovenantType::MinNoi,
        CovenantType::MinReserveBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CovenantType::MinDscr => "min_dscr",
            CovenantType::MaxLtv => "max_ltv",
            CovenantType::MinDebtYield => "min_debt_yield",
            CovenantType::MinOccupancy => "min_occupancy",
            CovenantType::MinLiquidity => "min_liquidity",
            CovenantType::MaxExpenseRatio => "max_expense_ratio",
            CovenantType::MinNoi => "min_noi",
            CovenantType::MinReserveBalance => "min_reserve_balance",
        }
    }

    pub fn parse(s: &str) -> Option<CovenantType> {
        CovenantType::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for CovenantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison direction a covenant is tested with. The metric is the
/// left operand: `metric OP threshold` must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
}

impl ComparisonOperator {
    /// Whether `metric` satisfies the covenant against `threshold`.
    pub fn holds(&self, metric: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::Gte => metric >= threshold,
            ComparisonOperator::Gt => metric > threshold,
            ComparisonOperator::Lte => metric <= threshold,
            ComparisonOperator::Lt => metric < threshold,
            ComparisonOperator::Eq => (metric - threshold).abs() < 1e-9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Eq => "eq",
        }
    }

    pub fn parse(s: &str) -> Option<ComparisonOperator> {
        match s {
            "gte" => Some(ComparisonOperator::Gte),
            "gt" => Some(ComparisonOperator::Gt),
            "lte" => Some(ComparisonOperator::Lte),
            "lt" => Some(ComparisonOperator::Lt),
            "eq" => Some(ComparisonOperator::Eq),
            _ => None,
        }
    }

    /// Human rendering for explanations, e.g. `>= 1.25`.
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lte => "<=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Eq => "==",
        }
    }
}

/// A loan-agreement threshold for one covenant type on one property.
///
/// Several rows may exist per (property, type); the active one for a
/// period is the most recent whose effective window contains the
/// period start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantThreshold {
    pub id: Uuid,
    pub property_id: Uuid,
    pub covenant_type: CovenantType,
    pub threshold_value: f64,
    pub operator: ComparisonOperator,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl CovenantThreshold {
    /// Whether this threshold's effective window contains `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_date <= date
            && self.expiration_date.map_or(true, |exp| date <= exp)
    }
}

/// Pick the active threshold for (property, type) at `period_start`:
/// most recent effective date among covering rows wins ties.
pub fn active_threshold<'a>(
    thresholds: &'a [CovenantThreshold],
    property_id: Uuid,
    covenant_type: CovenantType,
    period_start: NaiveDate,
) -> Option<&'a CovenantThreshold> {
    thresholds
        .iter()
        .filter(|t| {
            t.property_id == property_id
                && t.covenant_type == covenant_type
                && t.covers(period_start)
        })
        .max_by_key(|t| t.effective_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(
        property_id: Uuid,
        effective: NaiveDate,
        expiration: Option<NaiveDate>,
        active: bool,
        value: f64,
    ) -> CovenantThreshold {
        CovenantThreshold {
            id: Uuid::new_v4(),
            property_id,
            covenant_type: CovenantType::MinDscr,
            threshold_value: value,
            operator: ComparisonOperator::Gte,
            effective_date: effective,
            expiration_date: expiration,
            is_active: active,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn operators() {
        assert!(ComparisonOperator::Gte.holds(1.25, 1.25));
        assert!(!ComparisonOperator::Gt.holds(1.25, 1.25));
        assert!(ComparisonOperator::Lte.holds(0.70, 0.75));
        assert!(!ComparisonOperator::Lt.holds(0.75, 0.75));
        assert!(ComparisonOperator::Eq.holds(1.0, 1.0));
    }

    #[test]
    fn most_recent_covering_threshold_wins() {
        let pid = Uuid::new_v4();
        let old = threshold(pid, d(2023, 1, 1), None, true, 1.20);
        let newer = threshold(pid, d(2024, 6, 1), None, true, 1.25);
        let inactive = threshold(pid, d(2025, 1, 1), None, false, 1.50);
        let expired = threshold(pid, d(2024, 1, 1), Some(d(2024, 12, 31)), true, 1.40);
        let rows = vec![old, newer, inactive, expired];

        let active = active_threshold(&rows, pid, CovenantType::MinDscr, d(2025, 7, 1)).unwrap();
        assert_eq!(active.threshold_value, 1.25);
    }

    #[test]
    fn no_covering_threshold_yields_none() {
        let pid = Uuid::new_v4();
        let future = threshold(pid, d(2026, 1, 1), None, true, 1.30);
        let rows = vec![future];
        assert!(active_threshold(&rows, pid, CovenantType::MinDscr, d(2025, 7, 1)).is_none());
        // Different property never matches.
        assert!(active_threshold(&rows, Uuid::new_v4(), CovenantType::MinDscr, d(2026, 7, 1)).is_none());
    }
}
