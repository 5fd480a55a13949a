//! Covenant enforcement: one rule per covenant type, graded against
//! the loan-agreement threshold in force for the period.
//!
//! Analytics rules screen the same metrics against advisory bands;
//! here a breach is always CRITICAL and always alert-worthy, because
//! the comparison comes out of a signed agreement rather than a house
//! guideline.

use tieout_core::covenant::CovenantType;
use tieout_core::money::{self, cents_to_dollars, dollars_to_cents};
use tieout_core::{RuleCategory, RuleDefinition, Severity};

use crate::analytics;
use crate::catalog::RuleCatalog;
use crate::unit::{RuleContext, RuleEvaluation, RuleUnit, RuleUnitError};

const CATEGORY: RuleCategory = RuleCategory::Covenant;

/// Metric in the covenant's own unit: ratios as ratios, dollar
/// covenants in dollars.
type CovenantMetric = fn(&RuleContext<'_>) -> Option<f64>;

fn metric_for(covenant_type: CovenantType) -> CovenantMetric {
    match covenant_type {
        CovenantType::MinDscr => |ctx| analytics::dscr(ctx),
        CovenantType::MaxLtv => |ctx| analytics::ltv(ctx),
        CovenantType::MinDebtYield => |ctx| analytics::debt_yield(ctx),
        CovenantType::MinOccupancy => |ctx| analytics::physical_occupancy(ctx),
        CovenantType::MinLiquidity => {
            |ctx| analytics::liquidity_cents(ctx).map(cents_to_dollars)
        }
        CovenantType::MaxExpenseRatio => |ctx| analytics::expense_ratio(ctx),
        CovenantType::MinNoi => |ctx| analytics::annualized_noi(ctx),
        CovenantType::MinReserveBalance => {
            |ctx| analytics::reserve_balance_cents(ctx).map(cents_to_dollars)
        }
    }
}

/// Whether a covenant's metric and threshold are dollar figures.
fn dollar_denominated(covenant_type: CovenantType) -> bool {
    matches!(
        covenant_type,
        CovenantType::MinLiquidity | CovenantType::MinNoi | CovenantType::MinReserveBalance
    )
}

struct CovenantRule {
    definition: RuleDefinition,
    covenant_type: CovenantType,
    metric: CovenantMetric,
}

impl RuleUnit for CovenantRule {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let threshold = match ctx.resolver.active_covenant(
            ctx.property.id,
            self.covenant_type,
            ctx.period.start,
        ) {
            Some(t) => t,
            None => {
                return Ok(RuleEvaluation::skip(&format!(
                    "no {} covenant in force for this property",
                    self.covenant_type
                )))
            }
        };

        let value = match (self.metric)(ctx) {
            Some(v) => v,
            // Incomplete data skips; the extraction-completeness rules
            // already flag the missing statement itself.
            None => {
                return Ok(RuleEvaluation::skip(&format!(
                    "{} covenant in force but its inputs are missing this period",
                    self.covenant_type
                )))
            }
        };

        let requirement = format!(
            "{} {} {}",
            self.covenant_type,
            threshold.operator.symbol(),
            threshold.threshold_value
        );

        if threshold.operator.holds(value, threshold.threshold_value) {
            return Ok(RuleEvaluation::pass(serde_json::json!({
                "why": format!("{requirement} holds at {value:.4}"),
                "value": value,
                "threshold": threshold.threshold_value,
                "effective_date": threshold.effective_date,
            })));
        }

        let shortfall = (value - threshold.threshold_value).abs();
        let materiality = if dollar_denominated(self.covenant_type) {
            dollars_to_cents(shortfall)
        } else {
            0
        };
        let mut eval = RuleEvaluation::critical(serde_json::json!({
            "why": format!("{requirement} breached: measured {value:.4}"),
            "resolution": "a covenant breach is reportable to the lender; committee review required",
            "value": value,
            "threshold": threshold.threshold_value,
            "operator": threshold.operator.as_str(),
            "shortfall": shortfall,
            "effective_date": threshold.effective_date,
        }));
        if dollar_denominated(self.covenant_type) {
            eval.explanation["shortfall_display"] =
                serde_json::json!(money::format_cents(materiality));
        }
        Ok(eval.with_alert(materiality))
    }
}

pub fn register(catalog: &mut RuleCatalog) {
    let rows = [
        ("CV-001", CovenantType::MinDscr, "Debt service coverage covenant"),
        ("CV-002", CovenantType::MaxLtv, "Loan-to-value covenant"),
        ("CV-003", CovenantType::MinDebtYield, "Debt yield covenant"),
        ("CV-004", CovenantType::MinOccupancy, "Occupancy covenant"),
        ("CV-005", CovenantType::MinLiquidity, "Liquidity covenant"),
        ("CV-006", CovenantType::MaxExpenseRatio, "Expense ratio covenant"),
        ("CV-007", CovenantType::MinNoi, "Minimum NOI covenant"),
        ("CV-008", CovenantType::MinReserveBalance, "Reserve balance covenant"),
    ];
    for (code, covenant_type, description) in rows {
        catalog.register(Box::new(CovenantRule {
            definition: RuleDefinition::new(code, CATEGORY, Severity::Critical, description),
            covenant_type,
            metric: metric_for(covenant_type),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{standard_covenants, Fixture};
    use crate::period::WindowMap;
    use crate::resolver::ThresholdResolver;
    use tieout_core::{Outcome, PeriodKey, StatementType};

    fn evaluate_with(fx: &Fixture, resolver: &ThresholdResolver, code: &str) -> RuleEvaluation {
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);
        let ctx = RuleContext {
            property: fx.property(),
            period: fx.period(),
            bundle: &bundle,
            windows: &windows,
            resolver,
            escrow_links: fx.escrow_links(),
        };
        let mut catalog = RuleCatalog::empty();
        register(&mut catalog);
        catalog
            .get(code)
            .unwrap_or_else(|| panic!("unknown rule {code}"))
            .evaluate(&ctx)
            .unwrap()
    }

    fn covenant_resolver(fx: &Fixture) -> ThresholdResolver {
        ThresholdResolver::new(&[], standard_covenants(fx.property().id))
    }

    #[test]
    fn all_covenants_hold_on_clean_data() {
        let fx = Fixture::new(2025, 7, 6);
        let resolver = covenant_resolver(&fx);
        for code in ["CV-001", "CV-002", "CV-003", "CV-004", "CV-005", "CV-006", "CV-007", "CV-008"]
        {
            let eval = evaluate_with(&fx, &resolver, code);
            assert_eq!(eval.outcome, Outcome::Pass, "{code}: {:?}", eval.explanation);
        }
    }

    #[test]
    fn no_covenant_configured_skips() {
        let fx = Fixture::new(2025, 7, 2);
        let resolver = ThresholdResolver::empty();
        assert_eq!(evaluate_with(&fx, &resolver, "CV-001").outcome, Outcome::Skip);
    }

    #[test]
    fn dscr_breach_is_critical_and_alerts() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.set(
            StatementType::IncomeStatement,
            PeriodKey::new(2025, 7),
            tieout_core::accounts::NET_OPERATING_INCOME,
            50_000_00,
        );
        let resolver = covenant_resolver(&fx);
        let eval = evaluate_with(&fx, &resolver, "CV-001");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
    }

    #[test]
    fn liquidity_breach_carries_dollar_shortfall() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        fx.set(StatementType::BalanceSheet, key, tieout_core::accounts::OPERATING_CASH, 100_000_00);
        fx.set(StatementType::BalanceSheet, key, tieout_core::accounts::MONEY_MARKET, 0);
        let resolver = covenant_resolver(&fx);
        let eval = evaluate_with(&fx, &resolver, "CV-005");
        assert_eq!(eval.outcome, Outcome::Critical);
        // $250k floor against $100k on hand.
        assert_eq!(eval.materiality_cents, 150_000_00);
    }

    #[test]
    fn covenant_with_missing_inputs_skips() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.drop_statement(StatementType::MortgageStatement, PeriodKey::new(2025, 7));
        let resolver = covenant_resolver(&fx);
        let eval = evaluate_with(&fx, &resolver, "CV-001");
        assert_eq!(eval.outcome, Outcome::Skip);
        assert!(!eval.requests_alert);
    }

    #[test]
    fn expired_covenant_not_enforced() {
        let fx = Fixture::new(2025, 7, 2);
        let mut covenants = standard_covenants(fx.property().id);
        for c in &mut covenants {
            c.expiration_date = chrono::NaiveDate::from_ymd_opt(2024, 12, 31);
        }
        let resolver = ThresholdResolver::new(&[], covenants);
        assert_eq!(evaluate_with(&fx, &resolver, "CV-001").outcome, Outcome::Skip);
    }
}
