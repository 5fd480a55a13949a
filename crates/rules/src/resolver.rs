//! Threshold and tolerance resolution.
//!
//! Every tunable number a rule compares against resolves through the
//! same precedence: property override > category override > global
//! override > compiled default. Resolution always terminates because
//! the compiled table carries a default for every key the catalog
//! uses.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use tieout_core::covenant::{active_threshold, CovenantThreshold, CovenantType};
use tieout_core::money::{dollars_to_cents, Cents};
use tieout_core::{ConfigScope, ConfigValue, RuleCategory};

/// Compiled defaults, in the key's natural unit (dollars for
/// tolerances and materiality, ratios and counts otherwise).
pub const DEFAULTS: &[(&str, f64)] = &[
    // Shared
    ("tolerance.rounding", 1.00),
    ("crossdoc.materiality", 500.00),
    ("crossdoc.critical_multiplier", 10.0),
    ("alert.materiality", 10_000.00),
    // Forensic screens
    ("forensic.benford_min_samples", 40.0),
    ("forensic.benford_warning_mad", 0.012),
    ("forensic.benford_critical_mad", 0.018),
    ("forensic.round_min_samples", 10.0),
    ("forensic.round_share_warning", 0.40),
    ("forensic.round_share_critical", 0.60),
    ("forensic.duplicate_min_repeats", 3.0),
    ("forensic.spike_multiplier", 3.0),
    ("forensic.spike_floor", 1_000.00),
    ("forensic.concentration_warning", 0.35),
    ("forensic.concentration_critical", 0.55),
    // Data quality
    ("quality.window_max_months", 13.0),
    ("quality.dropped_account_share", 0.25),
    // Analytics bands
    ("analytics.noi_floor", 0.0),
    ("analytics.vacancy_ratio_ceiling", 0.20),
    ("analytics.distribution_coverage_floor", 1.00),
    ("analytics.dscr_floor", 1.00),
    ("analytics.ltv_ceiling", 0.85),
    ("analytics.debt_yield_floor", 0.06),
    ("analytics.occupancy_floor", 0.80),
    ("analytics.expense_ratio_ceiling", 0.65),
    ("analytics.current_ratio_floor", 1.00),
    ("analytics.quick_ratio_floor", 0.75),
    ("analytics.leverage_ceiling", 1.05),
    ("analytics.noi_margin_floor", 0.20),
    ("analytics.noi_margin_ceiling", 0.90),
    ("analytics.cap_rate_floor", 0.03),
    ("analytics.cap_rate_ceiling", 0.12),
    ("analytics.rent_per_unit_floor", 200.00),
    ("analytics.rent_per_unit_ceiling", 50_000.00),
    ("analytics.break_even_ceiling", 0.95),
    // Rent roll
    ("rentroll.deposit_tolerance", 500.00),
    ("rentroll.prepaid_materiality", 1_000.00),
    ("rentroll.roster_unit_slack", 2.0),
    ("rentroll.vacancy_divergence", 0.10),
    ("rentroll.deposit_rent_multiple", 3.0),
    ("rentroll.delinquency_share_warning", 0.50),
];

/// Snapshot of configuration taken once per run. Immutable while the
/// run evaluates, so every unit sees the same numbers.
pub struct ThresholdResolver {
    property_values: HashMap<(String, String), f64>,
    category_values: HashMap<(String, String), f64>,
    global_values: HashMap<String, f64>,
    covenants: Vec<CovenantThreshold>,
}

impl ThresholdResolver {
    pub fn new(values: &[ConfigValue], covenants: Vec<CovenantThreshold>) -> Self {
        let mut property_values = HashMap::new();
        let mut category_values = HashMap::new();
        let mut global_values = HashMap::new();

        for v in values {
            match (v.scope, v.scope_ref.as_deref()) {
                (ConfigScope::Property, Some(code)) => {
                    property_values.insert((v.key.clone(), code.to_string()), v.value);
                }
                (ConfigScope::Category, Some(category)) => {
                    category_values.insert((v.key.clone(), category.to_string()), v.value);
                }
                (ConfigScope::Global, _) => {
                    global_values.insert(v.key.clone(), v.value);
                }
                (scope, None) => {
                    tracing::warn!(key = %v.key, scope = scope.as_str(), "scoped config value missing scope_ref; ignored");
                }
            }
        }

        Self { property_values, category_values, global_values, covenants }
    }

    pub fn empty() -> Self {
        Self::new(&[], Vec::new())
    }

    /// Resolve a key for a rule category on a property.
    pub fn resolve(&self, key: &str, category: RuleCategory, property_code: &str) -> f64 {
        if let Some(v) = self
            .property_values
            .get(&(key.to_string(), property_code.to_string()))
        {
            return *v;
        }
        if let Some(v) = self
            .category_values
            .get(&(key.to_string(), category.as_str().to_string()))
        {
            return *v;
        }
        if let Some(v) = self.global_values.get(key) {
            return *v;
        }
        compiled_default(key)
    }

    /// A dollar-denominated key, resolved and converted to cents.
    pub fn tolerance_cents(&self, key: &str, category: RuleCategory, property_code: &str) -> Cents {
        dollars_to_cents(self.resolve(key, category, property_code))
    }

    /// The covenant threshold in force for a property at a period
    /// start, if the loan agreement defines one.
    pub fn active_covenant(
        &self,
        property_id: Uuid,
        covenant_type: CovenantType,
        period_start: NaiveDate,
    ) -> Option<&CovenantThreshold> {
        active_threshold(&self.covenants, property_id, covenant_type, period_start)
    }
}

fn compiled_default(key: &str) -> f64 {
    match DEFAULTS.iter().find(|(k, _)| *k == key) {
        Some((_, v)) => *v,
        None => {
            tracing::warn!(key, "no compiled default for config key; resolving to 0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tieout_core::covenant::ComparisonOperator;

    #[test]
    fn precedence_property_over_category_over_global() {
        let values = vec![
            ConfigValue::global("crossdoc.materiality", 900.0),
            ConfigValue::category("crossdoc.materiality", "cross_document", 800.0),
            ConfigValue::property("crossdoc.materiality", "MAPLE-01", 700.0),
        ];
        let r = ThresholdResolver::new(&values, Vec::new());

        assert_eq!(r.resolve("crossdoc.materiality", RuleCategory::CrossDocument, "MAPLE-01"), 700.0);
        assert_eq!(r.resolve("crossdoc.materiality", RuleCategory::CrossDocument, "OAK-02"), 800.0);
        assert_eq!(r.resolve("crossdoc.materiality", RuleCategory::Analytics, "OAK-02"), 900.0);
    }

    #[test]
    fn compiled_default_terminates_resolution() {
        let r = ThresholdResolver::empty();
        assert_eq!(r.resolve("tolerance.rounding", RuleCategory::CrossDocument, "X"), 1.00);
        assert_eq!(r.tolerance_cents("tolerance.rounding", RuleCategory::CrossDocument, "X"), 100);
        assert_eq!(r.resolve("no.such.key", RuleCategory::Analytics, "X"), 0.0);
    }

    #[test]
    fn defaults_cover_unique_keys() {
        let mut keys: Vec<&str> = DEFAULTS.iter().map(|(k, _)| *k).collect();
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before, "duplicate key in compiled defaults");
    }

    #[test]
    fn active_covenant_delegates_to_effective_window() {
        let pid = Uuid::new_v4();
        let covenant = CovenantThreshold {
            id: Uuid::new_v4(),
            property_id: pid,
            covenant_type: CovenantType::MinDscr,
            threshold_value: 1.25,
            operator: ComparisonOperator::Gte,
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiration_date: None,
            is_active: true,
        };
        let r = ThresholdResolver::new(&[], vec![covenant]);
        let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(r.active_covenant(pid, CovenantType::MinDscr, start).is_some());
        assert!(r.active_covenant(pid, CovenantType::MaxLtv, start).is_none());
        assert!(r.active_covenant(Uuid::new_v4(), CovenantType::MinDscr, start).is_none());
    }
}
