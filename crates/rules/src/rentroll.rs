//! Rent roll business rules: deposit sufficiency, receivable aging,
//! prepaid handling, and roster integrity.
//!
//! Cross-document ties already assert equality between the roll and
//! the ledger; these rules judge direction and degree: a deposit
//! shortfall is a liability problem even when both documents agree.

use tieout_core::accounts as a;
use tieout_core::money::{self, Cents};
use tieout_core::{Outcome, RuleCategory, RuleDefinition, Severity, StatementType};

use crate::catalog::RuleCatalog;
use crate::unit::{RuleContext, RuleEvaluation, RuleUnit, RuleUnitError};

const CATEGORY: RuleCategory = RuleCategory::RentRollBalance;

use StatementType::{BalanceSheet as BS, IncomeStatement as IS, RentRoll as RR};

// ── RB-001: deposit floor ───────────────────────────────────────────

/// Cash held against tenant deposits must cover what the roll says is
/// owed back. Running short is holding tenants' money unfunded.
struct DepositFloor {
    definition: RuleDefinition,
}

impl RuleUnit for DepositFloor {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let bs = match ctx.current(BS) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(BS)),
        };
        let owed = match rr.amount(a::RR_TOTAL_DEPOSITS) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip("rent roll carries no deposit total")),
        };
        let held = bs.amount(a::SECURITY_DEPOSITS_HELD).unwrap_or(0);
        let tolerance = ctx.tolerance_cents("rentroll.deposit_tolerance", CATEGORY);

        let shortfall = owed - held;
        if shortfall <= tolerance {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "deposits held cover deposits owed",
                "held": money::format_cents(held),
                "owed": money::format_cents(owed),
            }))
            .with_refs(Some(bs.reference()), Some(rr.reference())))
        } else {
            Ok(RuleEvaluation::critical(serde_json::json!({
                "why": format!(
                    "deposits held short of deposits owed by {}",
                    money::format_cents(shortfall)
                ),
                "resolution": "fund the deposit liability account; this is tenant money",
                "held": money::format_cents(held),
                "owed": money::format_cents(owed),
                "tolerance": money::format_cents(tolerance),
            }))
            .with_refs(Some(bs.reference()), Some(rr.reference()))
            .with_variance(shortfall)
            .with_alert(shortfall))
        }
    }
}

// ── RB-002: receivable aging in months of rent ──────────────────────

struct ReceivableAging {
    definition: RuleDefinition,
}

fn aging_band(months: f64) -> &'static str {
    if months < 0.5 {
        "excellent"
    } else if months < 1.0 {
        "good"
    } else if months < 2.0 {
        "acceptable"
    } else if months < 3.0 {
        "concerning"
    } else {
        "critical"
    }
}

impl RuleUnit for ReceivableAging {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let ar = match ctx.current(BS).and_then(|s| s.amount(a::TENANT_AR)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip("tenant receivables line absent")),
        };
        let rent = match ctx.current(IS).and_then(|s| s.amount(a::RENTAL_INCOME)) {
            Some(v) if v > 0 => v,
            _ => return Ok(RuleEvaluation::skip("no positive rental income to scale against")),
        };
        // Scale rent to one month if the statement covers more.
        let monthly_rent = match ctx.windows.resolved(IS) {
            Some(w) => rent / w.months_covered.max(1) as Cents,
            None => rent,
        };
        if monthly_rent <= 0 {
            return Ok(RuleEvaluation::skip("monthly rent resolves to zero"));
        }

        let months = ar as f64 / monthly_rent as f64;
        let band = aging_band(months);
        let explanation = serde_json::json!({
            "why": format!("receivables equal {months:.2} months of rent ({band})"),
            "receivables": money::format_cents(ar),
            "monthly_rent": money::format_cents(monthly_rent),
            "band": band,
        });

        let eval = match band {
            "concerning" => RuleEvaluation::new(Outcome::Warning, explanation),
            "critical" => RuleEvaluation::critical(explanation).with_alert(ar),
            _ => RuleEvaluation::pass(explanation),
        };
        Ok(eval)
    }
}

// ── RB-003: prepaid rent recognized as a liability ──────────────────

struct PrepaidRecognition {
    definition: RuleDefinition,
}

impl RuleUnit for PrepaidRecognition {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let prepaid = rr.amount(a::RR_PREPAID_RENT).unwrap_or(0);
        let materiality = ctx.tolerance_cents("rentroll.prepaid_materiality", CATEGORY);
        if prepaid <= materiality {
            return Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "prepaid rent below materiality",
                "prepaid": money::format_cents(prepaid),
            })));
        }

        let bs = match ctx.current(BS) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(BS)),
        };
        match bs.amount(a::PREPAID_RENT_LIABILITY) {
            Some(liability) if liability > 0 => Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "material prepaid rent carried as a liability",
                "prepaid": money::format_cents(prepaid),
                "liability": money::format_cents(liability),
            }))
            .with_refs(Some(rr.reference()), Some(bs.reference()))),
            _ => Ok(RuleEvaluation::warning(serde_json::json!({
                "why": format!(
                    "rent roll shows {} prepaid but the ledger books no prepaid rent liability",
                    money::format_cents(prepaid)
                ),
                "resolution": "unbooked prepaid rent overstates current-period revenue",
            }))
            .with_refs(Some(rr.reference()), Some(bs.reference()))),
        }
    }
}

// ── RB-004: roster completeness ─────────────────────────────────────

struct RosterCompleteness {
    definition: RuleDefinition,
}

impl RuleUnit for RosterCompleteness {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let tenant_lines = rr
            .lines
            .iter()
            .filter(|l| l.account_code.starts_with(a::RR_TENANT_PREFIX))
            .count() as Cents;
        if tenant_lines == 0 {
            return Ok(RuleEvaluation::skip("roll carries aggregates only, no per-tenant lines"));
        }
        let occupied = match rr.amount(a::RR_OCCUPIED_UNITS) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip("occupied unit count absent")),
        };
        let slack = ctx.setting("rentroll.roster_unit_slack", CATEGORY) as Cents;

        let gap = (occupied - tenant_lines).abs();
        if gap <= slack {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "per-tenant roster agrees with the occupied unit count",
                "tenant_lines": tenant_lines,
                "occupied_units": occupied,
            }))
            .with_refs(Some(rr.reference()), None))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": format!(
                    "roster lists {tenant_lines} tenants against {occupied} occupied units"
                ),
                "resolution": "missing roster rows hide leases; extra rows inflate occupancy",
                "slack": slack,
            }))
            .with_refs(Some(rr.reference()), None))
        }
    }
}

// ── RB-005: physical vs economic vacancy ────────────────────────────

struct VacancyConsistency {
    definition: RuleDefinition,
}

impl RuleUnit for VacancyConsistency {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let is = match ctx.current(IS) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(IS)),
        };
        let (occupied, total) = match (rr.amount(a::RR_OCCUPIED_UNITS), rr.amount(a::RR_TOTAL_UNITS))
        {
            (Some(o), Some(t)) if t > 0 => (o, t),
            _ => return Ok(RuleEvaluation::skip("unit counts absent")),
        };
        let (rental, vacancy) = match (is.amount(a::RENTAL_INCOME), is.amount(a::VACANCY_LOSS)) {
            (Some(r), Some(v)) => (r, v),
            _ => return Ok(RuleEvaluation::skip("income statement lacks rent or vacancy lines")),
        };
        let potential = rental + vacancy.abs();
        if potential <= 0 {
            return Ok(RuleEvaluation::skip("gross potential rent resolves to zero"));
        }

        let physical = 1.0 - occupied as f64 / total as f64;
        let economic = vacancy.abs() as f64 / potential as f64;
        let divergence = (physical - economic).abs();
        let limit = ctx.setting("rentroll.vacancy_divergence", CATEGORY);

        let explanation = serde_json::json!({
            "why": format!(
                "physical vacancy {:.1}% vs economic vacancy {:.1}%",
                physical * 100.0,
                economic * 100.0
            ),
            "divergence": divergence,
            "limit": limit,
        });
        if divergence <= limit {
            Ok(RuleEvaluation::pass(explanation)
                .with_refs(Some(rr.reference()), Some(is.reference())))
        } else {
            Ok(RuleEvaluation::warning(explanation)
                .with_refs(Some(rr.reference()), Some(is.reference())))
        }
    }
}

// ── RB-006: deposits per occupied unit ──────────────────────────────

/// Deposits held far beyond a few months of rent per unit usually mean
/// stale move-outs never refunded, or deposits double-counted.
struct DepositPerUnit {
    definition: RuleDefinition,
}

impl RuleUnit for DepositPerUnit {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let (deposits, scheduled, occupied) = match (
            rr.amount(a::RR_TOTAL_DEPOSITS),
            rr.amount(a::RR_SCHEDULED_RENT),
            rr.amount(a::RR_OCCUPIED_UNITS),
        ) {
            (Some(d), Some(s), Some(o)) if o > 0 && s > 0 => (d, s, o),
            _ => return Ok(RuleEvaluation::skip("deposit, rent, or unit lines absent")),
        };

        let deposit_per_unit = deposits as f64 / occupied as f64;
        let rent_per_unit = scheduled as f64 / occupied as f64;
        let multiple = ctx.setting("rentroll.deposit_rent_multiple", CATEGORY);
        let ceiling = rent_per_unit * multiple;

        if deposit_per_unit <= ceiling {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "deposits per unit within the customary multiple of rent",
                "deposit_per_unit": money::format_cents(deposit_per_unit as Cents),
                "rent_per_unit": money::format_cents(rent_per_unit as Cents),
            })))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": format!(
                    "deposits per unit exceed {multiple} months of rent per unit"
                ),
                "resolution": "look for unrefunded move-out deposits or double-counted balances",
                "deposit_per_unit": money::format_cents(deposit_per_unit as Cents),
                "rent_per_unit": money::format_cents(rent_per_unit as Cents),
            })))
        }
    }
}

// ── RB-007: delinquency containment ─────────────────────────────────

struct DelinquencyContainment {
    definition: RuleDefinition,
}

impl RuleUnit for DelinquencyContainment {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let rr = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let (delinquent, receivables) = match (
            rr.amount(a::RR_DELINQUENT_30),
            rr.amount(a::RR_TENANT_AR),
        ) {
            (Some(d), Some(r)) if r > 0 => (d, r),
            _ => return Ok(RuleEvaluation::skip("aging lines absent or receivables non-positive")),
        };

        let share = delinquent as f64 / receivables as f64;
        let limit = ctx.setting("rentroll.delinquency_share_warning", CATEGORY);
        let explanation = serde_json::json!({
            "why": format!("{:.0}% of receivables are 30+ days delinquent", share * 100.0),
            "delinquent": money::format_cents(delinquent),
            "receivables": money::format_cents(receivables),
            "limit": limit,
        });
        if share <= limit {
            Ok(RuleEvaluation::pass(explanation).with_refs(Some(rr.reference()), None))
        } else {
            Ok(RuleEvaluation::warning(explanation).with_refs(Some(rr.reference()), None))
        }
    }
}

// ── Registration ────────────────────────────────────────────────────

pub fn register(catalog: &mut RuleCatalog) {
    catalog.register(Box::new(DepositFloor {
        definition: RuleDefinition::new(
            "RB-001",
            CATEGORY,
            Severity::Critical,
            "Deposits held cover deposits owed on the roll",
        ),
    }));
    catalog.register(Box::new(ReceivableAging {
        definition: RuleDefinition::new(
            "RB-002",
            CATEGORY,
            Severity::Critical,
            "Tenant receivables within tolerable months of rent",
        ),
    }));
    catalog.register(Box::new(PrepaidRecognition {
        definition: RuleDefinition::new(
            "RB-003",
            CATEGORY,
            Severity::Warning,
            "Material prepaid rent booked as a liability",
        ),
    }));
    catalog.register(Box::new(RosterCompleteness {
        definition: RuleDefinition::new(
            "RB-004",
            CATEGORY,
            Severity::Warning,
            "Per-tenant roster agrees with occupied unit count",
        ),
    }));
    catalog.register(Box::new(VacancyConsistency {
        definition: RuleDefinition::new(
            "RB-005",
            CATEGORY,
            Severity::Warning,
            "Physical and economic vacancy tell the same story",
        ),
    }));
    catalog.register(Box::new(DepositPerUnit {
        definition: RuleDefinition::new(
            "RB-006",
            CATEGORY,
            Severity::Warning,
            "Deposits per unit within a customary multiple of rent",
        ),
    }));
    catalog.register(Box::new(DelinquencyContainment {
        definition: RuleDefinition::new(
            "RB-007",
            CATEGORY,
            Severity::Warning,
            "Delinquent balances contained within receivables",
        ),
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
    fn clean_fixture_passes_or_skips_every_rule() {
        let fx = Fixture::new(2025, 7, 6);
        for code in ["RB-001", "RB-002", "RB-003", "RB-004", "RB-005", "RB-006", "RB-007"] {
            let eval = evaluate(&fx, code);
            assert!(
                matches!(eval.outcome, Outcome::Pass | Outcome::Skip),
                "{code} produced {:?}: {:?}",
                eval.outcome,
                eval.explanation
            );
        }
    }

    #[test]
    fn deposit_shortfall_is_critical_with_the_shortfall_as_materiality() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        fx.set(BS, key, a::SECURITY_DEPOSITS_HELD, 100_000_00);
        let eval = evaluate(&fx, "RB-001");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
        assert_eq!(eval.materiality_cents, 50_000_00);
    }

    #[test]
    fn deposit_overage_is_not_a_shortfall() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.set(BS, PeriodKey::new(2025, 7), a::SECURITY_DEPOSITS_HELD, 200_000_00);
        assert_eq!(evaluate(&fx, "RB-001").outcome, Outcome::Pass);
    }

    #[test]
    fn receivable_aging_bands() {
        assert_eq!(aging_band(0.26), "excellent");
        assert_eq!(aging_band(0.9), "good");
        assert_eq!(aging_band(1.5), "acceptable");
        assert_eq!(aging_band(2.5), "concerning");
        assert_eq!(aging_band(3.0), "critical");

        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // Five months of rent stuck in receivables.
        fx.set(BS, key, a::TENANT_AR, 1_020_000_00);
        let eval = evaluate(&fx, "RB-002");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
    }

    #[test]
    fn unbooked_prepaid_rent_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.remove_line(BS, PeriodKey::new(2025, 7), a::PREPAID_RENT_LIABILITY);
        assert_eq!(evaluate(&fx, "RB-003").outcome, Outcome::Warning);
    }

    #[test]
    fn roster_checked_only_when_tenant_lines_exist() {
        let fx = Fixture::new(2025, 7, 2);
        assert_eq!(evaluate(&fx, "RB-004").outcome, Outcome::Skip);

        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // 104 roster rows against 110 occupied units, slack is 2.
        for unit in 0..104 {
            fx.set(RR, key, &format!("T-{unit:03}"), 1_800_00);
        }
        assert_eq!(evaluate(&fx, "RB-004").outcome, Outcome::Warning);
    }

    #[test]
    fn vacancy_divergence_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // Roll claims near-full occupancy while the ledger books heavy
        // vacancy loss.
        fx.set(IS, key, a::VACANCY_LOSS, -60_000_00);
        assert_eq!(evaluate(&fx, "RB-005").outcome, Outcome::Warning);
    }

    #[test]
    fn delinquency_above_half_of_receivables_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.set(RR, PeriodKey::new(2025, 7), a::RR_DELINQUENT_30, 40_000_00);
        assert_eq!(evaluate(&fx, "RB-007").outcome, Outcome::Warning);
    }
}
