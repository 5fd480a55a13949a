//! Performance analytics: ratios and per-unit economics screened
//! against configurable bands.
//!
//! Ratio math happens in floats at this edge only; every input is
//! integer cents pulled off a statement. The metric helpers are shared
//! with covenant enforcement, which grades the same numbers against
//! loan-agreement thresholds instead of advisory bands.

use tieout_core::accounts as a;
use tieout_core::money::{self, cents_to_dollars, Cents};
use tieout_core::{Outcome, RuleCategory, RuleDefinition, Severity, StatementType};

use crate::catalog::RuleCatalog;
use crate::unit::{RuleContext, RuleEvaluation, RuleUnit, RuleUnitError};

const CATEGORY: RuleCategory = RuleCategory::Analytics;

use StatementType::{BalanceSheet as BS, CashFlow as CF, IncomeStatement as IS};
use StatementType::{MortgageStatement as MS, RentRoll as RR};

// ── Shared metric helpers ───────────────────────────────────────────

/// NOI scaled to an annual figure using the income statement's
/// resolved window. `None` when the line or the window is missing.
pub(crate) fn annualized_noi(ctx: &RuleContext<'_>) -> Option<f64> {
    let noi = ctx.current(IS)?.amount(a::NET_OPERATING_INCOME)?;
    let window = ctx.windows.resolved(IS)?;
    Some(cents_to_dollars(noi) * window.annualization_factor())
}

/// Annual debt service from the servicer's stated monthly payment,
/// excluding the escrow portion.
pub(crate) fn annual_debt_service(ctx: &RuleContext<'_>) -> Option<f64> {
    let ms = ctx.current(MS)?;
    let principal = ms.amount(a::MS_PRINCIPAL_PORTION)?;
    let interest = ms.amount(a::MS_INTEREST_PORTION)?;
    Some(cents_to_dollars(principal + interest) * 12.0)
}

pub(crate) fn loan_balance(ctx: &RuleContext<'_>) -> Option<Cents> {
    ctx.current(MS)?.amount(a::MS_PRINCIPAL_BALANCE)
}

pub(crate) fn dscr(ctx: &RuleContext<'_>) -> Option<f64> {
    let service = annual_debt_service(ctx)?;
    if service <= 0.0 {
        return None;
    }
    Some(annualized_noi(ctx)? / service)
}

pub(crate) fn ltv(ctx: &RuleContext<'_>) -> Option<f64> {
    let balance = loan_balance(ctx)?;
    let appraised = ctx.current(MS)?.amount(a::MS_APPRAISED_VALUE)?;
    if appraised <= 0 {
        return None;
    }
    Some(balance as f64 / appraised as f64)
}

pub(crate) fn debt_yield(ctx: &RuleContext<'_>) -> Option<f64> {
    let balance = loan_balance(ctx)?;
    if balance <= 0 {
        return None;
    }
    Some(annualized_noi(ctx)? / cents_to_dollars(balance))
}

pub(crate) fn physical_occupancy(ctx: &RuleContext<'_>) -> Option<f64> {
    let rr = ctx.current(RR)?;
    let occupied = rr.amount(a::RR_OCCUPIED_UNITS)?;
    let total = rr.amount(a::RR_TOTAL_UNITS)?;
    if total <= 0 {
        return None;
    }
    Some(occupied as f64 / total as f64)
}

/// Unrestricted cash: operating accounts plus money market.
pub(crate) fn liquidity_cents(ctx: &RuleContext<'_>) -> Option<Cents> {
    let bs = ctx.current(BS)?;
    let operating = bs.amount(a::OPERATING_CASH)?;
    let money_market = bs.amount(a::MONEY_MARKET).unwrap_or(0);
    Some(operating + money_market)
}

pub(crate) fn expense_ratio(ctx: &RuleContext<'_>) -> Option<f64> {
    let is = ctx.current(IS)?;
    let revenue = is.amount(a::TOTAL_REVENUE)?;
    let opex = is.amount(a::TOTAL_OPEX)?;
    if revenue <= 0 {
        return None;
    }
    Some(opex as f64 / revenue as f64)
}

pub(crate) fn reserve_balance_cents(ctx: &RuleContext<'_>) -> Option<Cents> {
    ctx.current(BS)?.amount(a::RESERVE_ESCROW)
}

/// Scheduled rent plus vacancy and concession losses: what the roll
/// would bill at full occupancy and no discounts.
fn gross_potential_rent(ctx: &RuleContext<'_>) -> Option<Cents> {
    let is = ctx.current(IS)?;
    let rental = is.amount(a::RENTAL_INCOME)?;
    let vacancy = is.amount(a::VACANCY_LOSS).unwrap_or(0);
    let concessions = is.amount(a::CONCESSIONS).unwrap_or(0);
    Some(rental + vacancy.abs() + concessions.abs())
}

// ── The band unit ───────────────────────────────────────────────────

type Metric = fn(&RuleContext<'_>) -> Option<(f64, serde_json::Value)>;

/// One metric graded against an optional floor and ceiling, each a
/// resolver key. Breaches are advisory warnings; covenant rules carry
/// the enforcement weight.
struct MetricBand {
    definition: RuleDefinition,
    metric: Metric,
    floor_key: Option<&'static str>,
    ceiling_key: Option<&'static str>,
}

impl RuleUnit for MetricBand {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let (value, detail) = match (self.metric)(ctx) {
            Some(v) => v,
            // Advisory metric with nothing to measure: informational,
            // never a failure.
            None => {
                return Ok(RuleEvaluation::info(serde_json::json!({
                    "why": format!(
                        "{} not computable: inputs absent this period",
                        self.definition.description
                    ),
                    "resolution": "graded once the missing statement lines extract",
                })))
            }
        };
        let floor = self.floor_key.map(|k| ctx.setting(k, CATEGORY));
        let ceiling = self.ceiling_key.map(|k| ctx.setting(k, CATEGORY));

        let below = floor.map(|f| value < f).unwrap_or(false);
        let above = ceiling.map(|c| value > c).unwrap_or(false);

        let explanation = serde_json::json!({
            "why": if below {
                format!("{} of {:.4} sits below the {:.4} floor", self.definition.description, value, floor.unwrap_or(0.0))
            } else if above {
                format!("{} of {:.4} exceeds the {:.4} ceiling", self.definition.description, value, ceiling.unwrap_or(0.0))
            } else {
                format!("{} of {:.4} within band", self.definition.description, value)
            },
            "value": value,
            "floor": floor,
            "ceiling": ceiling,
            "detail": detail,
        });

        if below || above {
            Ok(RuleEvaluation::new(Outcome::Warning, explanation))
        } else {
            Ok(RuleEvaluation::pass(explanation))
        }
    }
}

// ── Metric functions for the registry ───────────────────────────────

fn metric_noi(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let annual = annualized_noi(ctx)?;
    Some((annual, serde_json::json!({ "annualized_noi": annual })))
}

fn metric_noi_margin(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let is = ctx.current(IS)?;
    let revenue = is.amount(a::TOTAL_REVENUE)?;
    let noi = is.amount(a::NET_OPERATING_INCOME)?;
    if revenue <= 0 {
        return None;
    }
    let margin = noi as f64 / revenue as f64;
    Some((
        margin,
        serde_json::json!({
            "noi": money::format_cents(noi),
            "revenue": money::format_cents(revenue),
        }),
    ))
}

fn metric_dscr(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let value = dscr(ctx)?;
    Some((
        value,
        serde_json::json!({
            "annualized_noi": annualized_noi(ctx),
            "annual_debt_service": annual_debt_service(ctx),
        }),
    ))
}

fn metric_ltv(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let value = ltv(ctx)?;
    Some((
        value,
        serde_json::json!({
            "loan_balance": loan_balance(ctx).map(money::format_cents),
            "appraised": ctx.current(MS)?.amount(a::MS_APPRAISED_VALUE).map(money::format_cents),
        }),
    ))
}

fn metric_debt_yield(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let value = debt_yield(ctx)?;
    Some((value, serde_json::json!({ "loan_balance": loan_balance(ctx).map(money::format_cents) })))
}

fn metric_physical_occupancy(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let value = physical_occupancy(ctx)?;
    let rr = ctx.current(RR)?;
    Some((
        value,
        serde_json::json!({
            "occupied_units": rr.amount(a::RR_OCCUPIED_UNITS),
            "total_units": rr.amount(a::RR_TOTAL_UNITS),
        }),
    ))
}

fn metric_economic_occupancy(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let rr = ctx.current(RR)?;
    let scheduled = rr.amount(a::RR_SCHEDULED_RENT)?;
    let market = rr.amount(a::RR_MARKET_RENT)?;
    if market <= 0 {
        return None;
    }
    let value = scheduled as f64 / market as f64;
    Some((
        value,
        serde_json::json!({
            "scheduled": money::format_cents(scheduled),
            "market": money::format_cents(market),
        }),
    ))
}

fn metric_sqft_occupancy(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let rr = ctx.current(RR)?;
    let occupied = rr.amount(a::RR_OCCUPIED_SQFT)?;
    let total = rr.amount(a::RR_TOTAL_SQFT)?;
    if total <= 0 {
        return None;
    }
    Some((
        occupied as f64 / total as f64,
        serde_json::json!({ "occupied_sqft": occupied, "total_sqft": total }),
    ))
}

fn metric_rent_per_unit(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let rr = ctx.current(RR)?;
    let scheduled = rr.amount(a::RR_SCHEDULED_RENT)?;
    let units = rr.amount(a::RR_TOTAL_UNITS)?;
    if units <= 0 {
        return None;
    }
    let value = cents_to_dollars(scheduled) / units as f64;
    Some((value, serde_json::json!({ "scheduled": money::format_cents(scheduled), "units": units })))
}

fn metric_vacancy_ratio(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let is = ctx.current(IS)?;
    let vacancy = is.amount(a::VACANCY_LOSS)?;
    let potential = gross_potential_rent(ctx)?;
    if potential <= 0 {
        return None;
    }
    let value = vacancy.abs() as f64 / potential as f64;
    Some((
        value,
        serde_json::json!({
            "vacancy_loss": money::format_cents(vacancy),
            "gross_potential": money::format_cents(potential),
        }),
    ))
}

fn current_liabilities(ctx: &RuleContext<'_>) -> Option<Cents> {
    let bs = ctx.current(BS)?;
    let mut total = bs.amount(a::ACCOUNTS_PAYABLE)?;
    for code in [
        a::ACCRUED_INTEREST,
        a::ACCRUED_PROPERTY_TAX,
        a::SECURITY_DEPOSITS_HELD,
        a::PREPAID_RENT_LIABILITY,
    ] {
        total += bs.amount(code).unwrap_or(0);
    }
    Some(total)
}

fn metric_current_ratio(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let bs = ctx.current(BS)?;
    let liabilities = current_liabilities(ctx)?;
    if liabilities <= 0 {
        return None;
    }
    let mut assets = bs.amount(a::OPERATING_CASH)?;
    for code in [
        a::MONEY_MARKET,
        a::RESTRICTED_CASH,
        a::TENANT_AR,
        a::OTHER_RECEIVABLES,
        a::PREPAID_INSURANCE,
        a::PREPAID_OTHER,
    ] {
        assets += bs.amount(code).unwrap_or(0);
    }
    let value = assets as f64 / liabilities as f64;
    Some((
        value,
        serde_json::json!({
            "current_assets": money::format_cents(assets),
            "current_liabilities": money::format_cents(liabilities),
        }),
    ))
}

fn metric_quick_ratio(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let bs = ctx.current(BS)?;
    let liabilities = current_liabilities(ctx)?;
    if liabilities <= 0 {
        return None;
    }
    let quick = bs.amount(a::OPERATING_CASH)?
        + bs.amount(a::MONEY_MARKET).unwrap_or(0)
        + bs.amount(a::TENANT_AR).unwrap_or(0);
    let value = quick as f64 / liabilities as f64;
    Some((value, serde_json::json!({ "quick_assets": money::format_cents(quick) })))
}

fn metric_leverage(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let bs = ctx.current(BS)?;
    let assets = bs.amount(a::TOTAL_ASSETS)?;
    let liabilities = bs.amount(a::TOTAL_LIABILITIES)?;
    if assets <= 0 {
        return None;
    }
    let value = liabilities as f64 / assets as f64;
    Some((
        value,
        serde_json::json!({
            "total_liabilities": money::format_cents(liabilities),
            "total_assets": money::format_cents(assets),
        }),
    ))
}

fn metric_expense_ratio(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let value = expense_ratio(ctx)?;
    Some((value, serde_json::json!({})))
}

fn metric_cap_rate(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let appraised = ctx.current(MS)?.amount(a::MS_APPRAISED_VALUE)?;
    if appraised <= 0 {
        return None;
    }
    let value = annualized_noi(ctx)? / cents_to_dollars(appraised);
    Some((value, serde_json::json!({ "appraised": money::format_cents(appraised) })))
}

fn metric_break_even(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let opex = ctx.current(IS)?.amount(a::TOTAL_OPEX)?;
    let service_monthly = annual_debt_service(ctx)? / 12.0;
    let potential = gross_potential_rent(ctx)?;
    if potential <= 0 {
        return None;
    }
    let value = (cents_to_dollars(opex) + service_monthly) / cents_to_dollars(potential);
    Some((
        value,
        serde_json::json!({
            "opex": money::format_cents(opex),
            "monthly_debt_service": service_monthly,
            "gross_potential": money::format_cents(potential),
        }),
    ))
}

fn metric_distribution_coverage(ctx: &RuleContext<'_>) -> Option<(f64, serde_json::Value)> {
    let cf = ctx.current(CF)?;
    let distributions = cf.amount(a::CF_DISTRIBUTIONS)?.abs();
    let generated = cf.amount(a::CF_NET_INCOME)?
        + cf.amount(a::CF_DEPRECIATION).unwrap_or(0)
        + cf.amount(a::CF_AMORTIZATION).unwrap_or(0);
    if distributions == 0 {
        // Nothing distributed; coverage is trivially fine.
        return Some((f64::MAX, serde_json::json!({ "distributions": "0.00" })));
    }
    if generated <= 0 {
        return Some((0.0, serde_json::json!({ "generated": money::format_cents(generated) })));
    }
    let value = generated as f64 / distributions as f64;
    Some((
        value,
        serde_json::json!({
            "cash_generated": money::format_cents(generated),
            "distributions": money::format_cents(distributions),
        }),
    ))
}

// ── Registration ────────────────────────────────────────────────────

pub fn register(catalog: &mut RuleCatalog) {
    let rows: &[(&str, &str, Metric, Option<&'static str>, Option<&'static str>)] = &[
        ("AN-001", "annualized net operating income", metric_noi, Some("analytics.noi_floor"), None),
        ("AN-002", "NOI margin", metric_noi_margin, Some("analytics.noi_margin_floor"), Some("analytics.noi_margin_ceiling")),
        ("AN-003", "debt service coverage ratio", metric_dscr, Some("analytics.dscr_floor"), None),
        ("AN-004", "loan-to-value ratio", metric_ltv, None, Some("analytics.ltv_ceiling")),
        ("AN-005", "debt yield", metric_debt_yield, Some("analytics.debt_yield_floor"), None),
        ("AN-006", "physical occupancy", metric_physical_occupancy, Some("analytics.occupancy_floor"), None),
        ("AN-007", "economic occupancy", metric_economic_occupancy, Some("analytics.occupancy_floor"), None),
        ("AN-008", "square-footage occupancy", metric_sqft_occupancy, Some("analytics.occupancy_floor"), None),
        ("AN-009", "scheduled rent per unit", metric_rent_per_unit, Some("analytics.rent_per_unit_floor"), Some("analytics.rent_per_unit_ceiling")),
        ("AN-010", "vacancy loss ratio", metric_vacancy_ratio, None, Some("analytics.vacancy_ratio_ceiling")),
        ("AN-011", "current ratio", metric_current_ratio, Some("analytics.current_ratio_floor"), None),
        ("AN-012", "quick ratio", metric_quick_ratio, Some("analytics.quick_ratio_floor"), None),
        ("AN-013", "leverage", metric_leverage, None, Some("analytics.leverage_ceiling")),
        ("AN-014", "operating expense ratio", metric_expense_ratio, None, Some("analytics.expense_ratio_ceiling")),
        ("AN-015", "implied capitalization rate", metric_cap_rate, Some("analytics.cap_rate_floor"), Some("analytics.cap_rate_ceiling")),
        ("AN-016", "distribution coverage", metric_distribution_coverage, Some("analytics.distribution_coverage_floor"), None),
    ];

    for (code, description, metric, floor_key, ceiling_key) in rows {
        catalog.register(Box::new(MetricBand {
            definition: RuleDefinition::new(*code, CATEGORY, Severity::Warning, *description),
            metric: *metric,
            floor_key: *floor_key,
            ceiling_key: *ceiling_key,
        }));
    }

    catalog.register(Box::new(MetricBand {
        definition: RuleDefinition::new(
            "AN-017",
            CATEGORY,
            Severity::Warning,
            "break-even occupancy",
        ),
        metric: metric_break_even,
        floor_key: None,
        ceiling_key: Some("analytics.break_even_ceiling"),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use crate::period::WindowMap;
    use crate::resolver::ThresholdResolver;
    use tieout_core::PeriodKey;

    fn evaluate(fx: &Fixture, code: &str) -> RuleEvaluation {
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);
        let resolver = ThresholdResolver::empty();
        let ctx = RuleContext {
            property: fx.property(),
            period: fx.period(),
            bundle: &bundle,
            windows: &windows,
            resolver: &resolver,
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

    #[test]
    fn clean_fixture_sits_inside_every_band() {
        let fx = Fixture::new(2025, 7, 6);
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);
        let resolver = ThresholdResolver::empty();
        let ctx = RuleContext {
            property: fx.property(),
            period: fx.period(),
            bundle: &bundle,
            windows: &windows,
            resolver: &resolver,
            escrow_links: fx.escrow_links(),
        };
        let mut catalog = RuleCatalog::empty();
        register(&mut catalog);
        for unit in catalog.iter() {
            let eval = unit.evaluate(&ctx).unwrap();
            assert_eq!(
                eval.outcome,
                Outcome::Pass,
                "{} produced {:?}: {:?}",
                unit.definition().code,
                eval.outcome,
                eval.explanation
            );
        }
    }

    #[test]
    fn dscr_below_floor_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // Gut NOI: coverage collapses below 1.0x.
        fx.set(IS, key, a::NET_OPERATING_INCOME, 5_000_00);
        let eval = evaluate(&fx, "AN-003");
        assert_eq!(eval.outcome, Outcome::Warning);
    }

    #[test]
    fn ltv_above_ceiling_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        fx.set(MS, key, a::MS_APPRAISED_VALUE, 15_000_000_00);
        assert_eq!(evaluate(&fx, "AN-004").outcome, Outcome::Warning);
    }

    #[test]
    fn occupancy_below_floor_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        fx.set(RR, key, a::RR_OCCUPIED_UNITS, 80);
        assert_eq!(evaluate(&fx, "AN-006").outcome, Outcome::Warning);
    }

    #[test]
    fn missing_inputs_are_informational_not_failures() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.drop_statement(MS, PeriodKey::new(2025, 7));
        assert_eq!(evaluate(&fx, "AN-001").outcome, Outcome::Pass);
        assert_eq!(evaluate(&fx, "AN-003").outcome, Outcome::Info);
        assert_eq!(evaluate(&fx, "AN-004").outcome, Outcome::Info);
        assert_eq!(evaluate(&fx, "AN-005").outcome, Outcome::Info);
        // Balance-sheet ratios are unaffected.
        assert_eq!(evaluate(&fx, "AN-011").outcome, Outcome::Pass);
    }

    #[test]
    fn annualization_follows_the_resolved_window() {
        // A trailing-twelve-month income statement must not be scaled
        // a second time.
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        fx.declare_window(
            IS,
            chrono::NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        );
        // Store a full-year NOI on the statement.
        let monthly = fx.amount(IS, key, a::NET_OPERATING_INCOME).unwrap();
        fx.set(IS, key, a::NET_OPERATING_INCOME, monthly * 12);
        let eval = evaluate(&fx, "AN-003");
        assert_eq!(eval.outcome, Outcome::Pass, "{:?}", eval.explanation);
    }
}
