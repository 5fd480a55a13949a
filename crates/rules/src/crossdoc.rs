//! Cross-document tie-outs.
//!
//! Most ties are declarative: a table of (left selector, right
//! selector, tolerance key, severity) rows evaluated by one generic
//! unit. A handful of three-way and roll-forward checks carry their
//! own bodies.

use tieout_core::accounts as a;
use tieout_core::money::{self, Cents};
use tieout_core::{Outcome, RuleCategory, RuleDefinition, Severity, StatementType};

use crate::catalog::RuleCatalog;
use crate::unit::{
    cap_outcome, classify_variance, comparison_explanation, RuleContext, RuleEvaluation, RuleUnit,
    RuleUnitError,
};

const CATEGORY: RuleCategory = RuleCategory::CrossDocument;

// ── Selectors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Basis {
    /// Subject-period value.
    Current,
    /// Previous-month value.
    Previous,
    /// Subject minus previous month.
    Delta,
    /// Sum over the fiscal year to date; every month must be present.
    FiscalYtd,
}

/// One side of a tie: the sum of `accounts` on one statement type,
/// under a basis, optionally negated to align sign conventions.
#[derive(Debug, Clone, Copy)]
struct Sel {
    statement: StatementType,
    accounts: &'static [&'static str],
    basis: Basis,
    negate: bool,
}

const fn cur(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::Current, negate: false }
}

const fn cur_neg(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::Current, negate: true }
}

const fn prev(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::Previous, negate: false }
}

const fn delta(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::Delta, negate: false }
}

const fn delta_neg(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::Delta, negate: true }
}

const fn ytd(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::FiscalYtd, negate: false }
}

const fn ytd_neg(statement: StatementType, accounts: &'static [&'static str]) -> Sel {
    Sel { statement, accounts, basis: Basis::FiscalYtd, negate: true }
}

struct SelValue {
    amount: Cents,
    reference: String,
}

impl Sel {
    /// Resolve the selector to an amount, or a reason to skip.
    fn value(&self, ctx: &RuleContext<'_>) -> Result<SelValue, String> {
        // A flow statement whose resolved window is not one month
        // cannot be tied against monthly figures.
        if self.statement.is_flow() {
            if let Some(err) = ctx.windows.error(self.statement) {
                return Err(err.to_string());
            }
            if let Some(w) = ctx.windows.resolved(self.statement) {
                if !w.is_monthly() {
                    return Err(format!(
                        "{} window covers {} months; tie requires monthly figures",
                        self.statement, w.months_covered
                    ));
                }
            }
        }

        match self.basis {
            Basis::Current => {
                let stmt = ctx
                    .current(self.statement)
                    .ok_or_else(|| format!("{} not extracted", self.statement))?;
                let amount = self.sum_on(stmt)?;
                Ok(self.finish(amount, stmt.reference()))
            }
            Basis::Previous => {
                let stmt = ctx
                    .previous(self.statement)
                    .ok_or_else(|| format!("prior-month {} missing", self.statement))?;
                let amount = self.sum_on(stmt)?;
                Ok(self.finish(amount, stmt.reference()))
            }
            Basis::Delta => {
                let current = ctx
                    .current(self.statement)
                    .ok_or_else(|| format!("{} not extracted", self.statement))?;
                let previous = ctx
                    .previous(self.statement)
                    .ok_or_else(|| format!("prior-month {} missing", self.statement))?;
                let amount = self.sum_on(current)? - self.sum_on(previous)?;
                Ok(self.finish(amount, format!("Δ {}", current.reference())))
            }
            Basis::FiscalYtd => {
                let mut key = ctx.period.fiscal_year_start();
                let end = ctx.period.key();
                let mut total: Cents = 0;
                loop {
                    let stmt = ctx.bundle.at(self.statement, key).ok_or_else(|| {
                        format!("{} missing for {key}; fiscal YTD incomplete", self.statement)
                    })?;
                    total += self.sum_on(stmt)?;
                    if key == end {
                        break;
                    }
                    key = key.next();
                }
                let reference = format!("{} (fiscal ytd)", self.statement);
                Ok(self.finish(total, reference))
            }
        }
    }

    fn sum_on(&self, stmt: &tieout_core::StatementRecord) -> Result<Cents, String> {
        let mut total: Cents = 0;
        for code in self.accounts {
            total += stmt
                .amount(code)
                .ok_or_else(|| format!("{} line {code} absent", stmt.statement_type))?;
        }
        Ok(total)
    }

    fn finish(&self, amount: Cents, reference: String) -> SelValue {
        SelValue {
            amount: if self.negate { -amount } else { amount },
            reference,
        }
    }
}

// ── Declarative tie table ───────────────────────────────────────────

struct TieOutDef {
    code: &'static str,
    description: &'static str,
    left: Sel,
    right: Sel,
    tolerance_key: &'static str,
    severity: Severity,
    /// Equity accounts close into retained earnings at year end, so
    /// delta ties against them are meaningless in January.
    january_reset: bool,
}

const fn tie(
    code: &'static str,
    description: &'static str,
    left: Sel,
    right: Sel,
    tolerance_key: &'static str,
    severity: Severity,
) -> TieOutDef {
    TieOutDef { code, description, left, right, tolerance_key, severity, january_reset: false }
}

const fn tie_jan(
    code: &'static str,
    description: &'static str,
    left: Sel,
    right: Sel,
    tolerance_key: &'static str,
    severity: Severity,
) -> TieOutDef {
    TieOutDef { code, description, left, right, tolerance_key, severity, january_reset: true }
}

use StatementType::{BalanceSheet as BS, CashFlow as CF, IncomeStatement as IS};
use StatementType::{MortgageStatement as MS, RentRoll as RR};

const ROUND: &str = "tolerance.rounding";
const MATERIAL: &str = "crossdoc.materiality";

#[rustfmt::skip]
const TIE_OUTS: &[TieOutDef] = &[
    // Balance sheet vs mortgage statement.
    tie("XD-101", "Mortgage payable ties to servicer principal balance",
        cur(BS, &[a::MORTGAGE_PAYABLE]), cur(MS, &[a::MS_PRINCIPAL_BALANCE]), ROUND, Severity::Critical),
    tie("XD-102", "Tax escrow ties to servicer tax escrow balance",
        cur(BS, &[a::TAX_ESCROW]), cur(MS, &[a::MS_TAX_ESCROW]), ROUND, Severity::Critical),
    tie("XD-103", "Insurance escrow ties to servicer insurance escrow balance",
        cur(BS, &[a::INSURANCE_ESCROW]), cur(MS, &[a::MS_INSURANCE_ESCROW]), ROUND, Severity::Critical),
    tie("XD-104", "Reserve escrow ties to servicer reserve escrow balance",
        cur(BS, &[a::RESERVE_ESCROW]), cur(MS, &[a::MS_RESERVE_ESCROW]), ROUND, Severity::Critical),
    tie("XD-105", "Escrow accounts sum to servicer total escrow",
        cur(BS, &[a::TAX_ESCROW, a::INSURANCE_ESCROW, a::RESERVE_ESCROW]),
        cur(MS, &[a::MS_TOTAL_ESCROW]), ROUND, Severity::Critical),
    tie("XD-106", "Accrued interest ties to servicer accrual",
        cur(BS, &[a::ACCRUED_INTEREST]), cur(MS, &[a::MS_ACCRUED_INTEREST]), ROUND, Severity::Warning),

    // Income statement vs cash flow.
    tie("XD-201", "Net income agrees between income statement and cash flow",
        cur(IS, &[a::NET_INCOME]), cur(CF, &[a::CF_NET_INCOME]), ROUND, Severity::Critical),
    tie("XD-202", "Depreciation add-back matches expense",
        cur(IS, &[a::DEPRECIATION]), cur(CF, &[a::CF_DEPRECIATION]), ROUND, Severity::Warning),
    tie("XD-203", "Amortization add-back matches expense",
        cur(IS, &[a::AMORTIZATION]), cur(CF, &[a::CF_AMORTIZATION]), ROUND, Severity::Warning),
    tie("XD-204", "Capital expenditures agree between statements",
        cur(IS, &[a::CAPEX_IS]), cur_neg(CF, &[a::CF_CAPEX]), MATERIAL, Severity::Warning),
    tie("XD-205", "Interest expense approximates interest paid",
        cur(IS, &[a::INTEREST_EXPENSE]), cur_neg(CF, &[a::CF_INTEREST_PAID]), MATERIAL, Severity::Warning),
    tie("XD-206", "Property tax expense approximates tax payments",
        cur(IS, &[a::PROPERTY_TAXES]), cur_neg(CF, &[a::CF_TAX_PAYMENTS]), MATERIAL, Severity::Warning),
    tie("XD-207", "Insurance expense approximates insurance payments",
        cur(IS, &[a::INSURANCE_EXPENSE]), cur_neg(CF, &[a::CF_INSURANCE_PAYMENTS]), MATERIAL, Severity::Warning),

    // Balance sheet vs cash flow.
    tie("XD-301", "Cash accounts tie to cash flow ending cash",
        cur(BS, &[a::OPERATING_CASH, a::MONEY_MARKET, a::RESTRICTED_CASH]),
        cur(CF, &[a::CF_ENDING_CASH]), ROUND, Severity::Critical),
    tie("XD-302", "Prior-month cash ties to beginning cash",
        prev(BS, &[a::OPERATING_CASH, a::MONEY_MARKET, a::RESTRICTED_CASH]),
        cur(CF, &[a::CF_BEGINNING_CASH]), ROUND, Severity::Critical),
    tie("XD-303", "Receivables movement ties to working capital line",
        delta(BS, &[a::TENANT_AR]), cur_neg(CF, &[a::CF_CHANGE_AR]), ROUND, Severity::Warning),
    tie("XD-304", "Payables movement ties to working capital line",
        delta(BS, &[a::ACCOUNTS_PAYABLE]), cur(CF, &[a::CF_CHANGE_AP]), ROUND, Severity::Warning),
    tie("XD-305", "Prepaids movement ties to working capital line",
        delta(BS, &[a::PREPAID_INSURANCE, a::PREPAID_OTHER]),
        cur_neg(CF, &[a::CF_CHANGE_PREPAIDS]), ROUND, Severity::Warning),
    tie("XD-306", "Security deposit movement ties to working capital line",
        delta(BS, &[a::SECURITY_DEPOSITS_HELD]), cur(CF, &[a::CF_CHANGE_DEPOSITS]), ROUND, Severity::Warning),
    tie("XD-307", "Prepaid rent movement ties to working capital line",
        delta(BS, &[a::PREPAID_RENT_LIABILITY]), cur(CF, &[a::CF_CHANGE_PREPAID_RENT]), ROUND, Severity::Warning),
    tie("XD-308", "Accumulated depreciation movement matches add-back",
        delta_neg(BS, &[a::ACCUM_DEPRECIATION]), cur(CF, &[a::CF_DEPRECIATION]), ROUND, Severity::Warning),
    tie("XD-309", "Contributed capital movement ties to contributions",
        delta(BS, &[a::CONTRIBUTED_CAPITAL]), cur(CF, &[a::CF_CONTRIBUTIONS]), ROUND, Severity::Warning),
    tie_jan("XD-310", "Distribution movement ties to distributions paid",
        delta(BS, &[a::DISTRIBUTIONS]), cur(CF, &[a::CF_DISTRIBUTIONS]), ROUND, Severity::Warning),

    // Rent roll vs income statement / balance sheet.
    tie("XD-401", "Scheduled rent ties to rental income",
        cur(RR, &[a::RR_SCHEDULED_RENT]), cur(IS, &[a::RENTAL_INCOME]), MATERIAL, Severity::Warning),
    tie("XD-402", "Rent roll concessions tie to concession expense",
        cur(RR, &[a::RR_CONCESSIONS]), cur(IS, &[a::CONCESSIONS]), MATERIAL, Severity::Warning),
    tie("XD-403", "Tenant receivables agree with rent roll aging",
        cur(RR, &[a::RR_TENANT_AR]), cur(BS, &[a::TENANT_AR]), ROUND, Severity::Critical),
    tie("XD-404", "Security deposits held equal rent roll deposits",
        cur(RR, &[a::RR_TOTAL_DEPOSITS]), cur(BS, &[a::SECURITY_DEPOSITS_HELD]), ROUND, Severity::Critical),
    tie("XD-405", "Prepaid rent liability ties to rent roll prepaids",
        cur(RR, &[a::RR_PREPAID_RENT]), cur(BS, &[a::PREPAID_RENT_LIABILITY]), MATERIAL, Severity::Warning),
    tie("XD-406", "Restricted cash covers rent roll deposits",
        cur(BS, &[a::RESTRICTED_CASH]), cur(RR, &[a::RR_TOTAL_DEPOSITS]), MATERIAL, Severity::Warning),

    // Cash flow vs mortgage statement.
    tie("XD-501", "Principal paid ties to servicer principal portion",
        cur_neg(CF, &[a::CF_PRINCIPAL_PAYMENTS]), cur(MS, &[a::MS_PRINCIPAL_PORTION]), ROUND, Severity::Critical),
    tie("XD-502", "Interest paid ties to servicer interest portion",
        cur_neg(CF, &[a::CF_INTEREST_PAID]), cur(MS, &[a::MS_INTEREST_PORTION]), ROUND, Severity::Critical),
    tie("XD-503", "Escrow funding ties to servicer escrow portion",
        cur_neg(CF, &[a::CF_ESCROW_TAX, a::CF_ESCROW_INSURANCE, a::CF_ESCROW_RESERVE]),
        cur(MS, &[a::MS_ESCROW_PORTION]), ROUND, Severity::Warning),
    tie("XD-504", "Loan balance decline matches principal paid",
        delta_neg(MS, &[a::MS_PRINCIPAL_BALANCE]), cur_neg(CF, &[a::CF_PRINCIPAL_PAYMENTS]), ROUND, Severity::Warning),

    // Fiscal year-to-date ties.
    tie("XD-601", "YTD principal payments tie to servicer YTD",
        ytd_neg(CF, &[a::CF_PRINCIPAL_PAYMENTS]), cur(MS, &[a::MS_YTD_PRINCIPAL]), ROUND, Severity::Warning),
    tie("XD-602", "YTD interest paid ties to servicer YTD",
        ytd_neg(CF, &[a::CF_INTEREST_PAID]), cur(MS, &[a::MS_YTD_INTEREST]), ROUND, Severity::Warning),
    tie("XD-603", "YTD interest expense ties to servicer YTD",
        ytd(IS, &[a::INTEREST_EXPENSE]), cur(MS, &[a::MS_YTD_INTEREST]), MATERIAL, Severity::Warning),
    tie("XD-604", "YTD net income ties to current-year equity",
        ytd(IS, &[a::NET_INCOME]), cur(BS, &[a::CURRENT_YEAR_INCOME]), ROUND, Severity::Critical),
    tie("XD-605", "YTD distributions tie to equity distributions",
        ytd(CF, &[a::CF_DISTRIBUTIONS]), cur(BS, &[a::DISTRIBUTIONS]), ROUND, Severity::Warning),

    // Income statement vs mortgage statement.
    tie("XD-701", "Interest expense ties to servicer interest portion",
        cur(IS, &[a::INTEREST_EXPENSE]), cur(MS, &[a::MS_INTEREST_PORTION]), ROUND, Severity::Warning),
];

struct TieOutUnit {
    definition: RuleDefinition,
    def: &'static TieOutDef,
}

impl RuleUnit for TieOutUnit {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        if self.def.january_reset && ctx.period.month == 1 {
            return Ok(RuleEvaluation::skip(
                "equity accounts close at year end; delta undefined in January",
            ));
        }

        let left = match self.def.left.value(ctx) {
            Ok(v) => v,
            Err(reason) => return Ok(RuleEvaluation::skip(&reason)),
        };
        let right = match self.def.right.value(ctx) {
            Ok(v) => v,
            Err(reason) => return Ok(RuleEvaluation::skip(&reason)),
        };

        let tolerance = ctx.tolerance_cents(self.def.tolerance_key, CATEGORY);
        let multiplier = ctx.setting("crossdoc.critical_multiplier", CATEGORY);
        let variance = money::variance(left.amount, right.amount);
        let outcome = classify_variance(variance, tolerance, multiplier, self.def.severity);

        let explanation = match outcome {
            Outcome::Pass => comparison_explanation(
                "amounts agree within tolerance",
                "none required",
                left.amount,
                right.amount,
                tolerance,
            ),
            _ => comparison_explanation(
                self.def.description,
                "trace the larger side to source documents and re-extract",
                left.amount,
                right.amount,
                tolerance,
            ),
        };

        let mut eval = RuleEvaluation::new(outcome, explanation)
            .with_refs(Some(left.reference), Some(right.reference))
            .with_variance(variance);
        if outcome == Outcome::Critical {
            eval = eval.with_alert(variance.abs());
        }
        Ok(eval)
    }
}

// ── Three-way and roll-forward units ────────────────────────────────

/// BS escrow bucket vs servicer bucket vs prior BS + cash funding.
struct EscrowThreeWay {
    definition: RuleDefinition,
    bs_code: &'static str,
    ms_code: &'static str,
    cf_code: &'static str,
}

impl RuleUnit for EscrowThreeWay {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let bs = match ctx.current(BS).and_then(|s| s.amount(self.bs_code)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip("balance sheet escrow line absent")),
        };
        let ms = match ctx.current(MS).and_then(|s| s.amount(self.ms_code)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip("mortgage statement escrow line absent")),
        };
        let (prior_bs, funding) = match (
            ctx.previous(BS).and_then(|s| s.amount(self.bs_code)),
            ctx.current(CF).and_then(|s| s.amount(self.cf_code)),
        ) {
            (Some(p), Some(f)) => (p, f),
            _ => return Ok(RuleEvaluation::skip("prior balance or escrow funding line absent")),
        };

        // Funding is a cash outflow (negative); the escrow asset grows
        // by its magnitude.
        let rolled = prior_bs - funding;
        let tolerance = ctx.tolerance_cents(ROUND, CATEGORY);
        let legs = [
            ("balance_sheet_vs_servicer", bs - ms),
            ("balance_sheet_vs_rollforward", bs - rolled),
            ("servicer_vs_rollforward", ms - rolled),
        ];
        let worst = legs.iter().max_by_key(|(_, v)| v.abs()).map(|(_, v)| *v).unwrap_or(0);
        let multiplier = ctx.setting("crossdoc.critical_multiplier", CATEGORY);
        let outcome = classify_variance(worst, tolerance, multiplier, Severity::Critical);

        let broken: Vec<&str> = legs
            .iter()
            .filter(|(_, v)| v.abs() > tolerance)
            .map(|(name, _)| *name)
            .collect();
        let explanation = serde_json::json!({
            "why": if broken.is_empty() {
                "all three escrow views agree".to_string()
            } else {
                format!("escrow legs disagree: {}", broken.join(", "))
            },
            "resolution": "confirm escrow disbursements and re-extract the failing document",
            "balance_sheet": money::format_cents(bs),
            "servicer": money::format_cents(ms),
            "rollforward": money::format_cents(rolled),
            "tolerance": money::format_cents(tolerance),
        });

        let mut eval = RuleEvaluation::new(outcome, explanation)
            .with_refs(
                ctx.current(BS).map(|s| s.reference()),
                ctx.current(MS).map(|s| s.reference()),
            )
            .with_variance(worst);
        if outcome == Outcome::Critical {
            eval = eval.with_alert(worst.abs());
        }
        Ok(eval)
    }
}

/// Net income agreement across income statement, cash flow, and the
/// movement implied by the equity section.
struct NetIncomeThreeWay {
    definition: RuleDefinition,
}

fn equity_delta(ctx: &RuleContext<'_>, code: &str) -> Option<Cents> {
    let current = ctx.current(BS)?.amount(code)?;
    let previous = ctx.previous(BS)?.amount(code)?;
    Some(current - previous)
}

impl RuleUnit for NetIncomeThreeWay {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        if ctx.period.month == 1 {
            return Ok(RuleEvaluation::skip(
                "equity accounts close at year end; implied income undefined in January",
            ));
        }
        let is_ni = match ctx.current(IS).and_then(|s| s.amount(a::NET_INCOME)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip_missing(IS)),
        };
        let cf_ni = match ctx.current(CF).and_then(|s| s.amount(a::CF_NET_INCOME)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip_missing(CF)),
        };
        let implied = match (
            equity_delta(ctx, a::TOTAL_EQUITY),
            equity_delta(ctx, a::CONTRIBUTED_CAPITAL),
            equity_delta(ctx, a::DISTRIBUTIONS),
        ) {
            (Some(te), Some(cc), Some(d)) => te - cc - d,
            _ => return Ok(RuleEvaluation::skip("equity section incomplete for implied income")),
        };

        let tolerance = ctx.tolerance_cents(ROUND, CATEGORY);
        let multiplier = ctx.setting("crossdoc.critical_multiplier", CATEGORY);
        let worst = [is_ni - cf_ni, is_ni - implied, cf_ni - implied]
            .into_iter()
            .max_by_key(|v| v.abs())
            .unwrap_or(0);
        let outcome = classify_variance(worst, tolerance, multiplier, Severity::Critical);

        let explanation = serde_json::json!({
            "why": if outcome == Outcome::Pass {
                "net income agrees across all three documents"
            } else {
                "net income disagrees between income statement, cash flow, and equity movement"
            },
            "resolution": "reconcile the equity roll-forward before trusting either statement",
            "income_statement": money::format_cents(is_ni),
            "cash_flow": money::format_cents(cf_ni),
            "implied_by_equity": money::format_cents(implied),
            "tolerance": money::format_cents(tolerance),
        });

        let mut eval = RuleEvaluation::new(outcome, explanation)
            .with_refs(
                ctx.current(IS).map(|s| s.reference()),
                ctx.current(BS).map(|s| s.reference()),
            )
            .with_variance(worst);
        if outcome == Outcome::Critical {
            eval = eval.with_alert(worst.abs());
        }
        Ok(eval)
    }
}

/// Total equity roll-forward: prior equity + net income +
/// contributions + distribution movement = current equity.
struct EquityRollForward {
    definition: RuleDefinition,
}

impl RuleUnit for EquityRollForward {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        if ctx.period.month == 1 {
            return Ok(RuleEvaluation::skip(
                "equity accounts close at year end; roll-forward undefined in January",
            ));
        }
        let ni = match ctx.current(IS).and_then(|s| s.amount(a::NET_INCOME)) {
            Some(v) => v,
            None => return Ok(RuleEvaluation::skip_missing(IS)),
        };
        let (equity_move, contrib_move, dist_move) = match (
            equity_delta(ctx, a::TOTAL_EQUITY),
            equity_delta(ctx, a::CONTRIBUTED_CAPITAL),
            equity_delta(ctx, a::DISTRIBUTIONS),
        ) {
            (Some(te), Some(cc), Some(d)) => (te, cc, d),
            _ => return Ok(RuleEvaluation::skip("equity section incomplete for roll-forward")),
        };

        let expected = ni + contrib_move + dist_move;
        let variance = equity_move - expected;
        let tolerance = ctx.tolerance_cents(ROUND, CATEGORY);
        let multiplier = ctx.setting("crossdoc.critical_multiplier", CATEGORY);
        let outcome = classify_variance(variance, tolerance, multiplier, Severity::Critical);

        let explanation = comparison_explanation(
            if outcome == Outcome::Pass {
                "equity movement fully explained by income, contributions, and distributions"
            } else {
                "equity moved by an amount the period's activity does not explain"
            },
            "look for unposted adjustments or prior-period restatements",
            equity_move,
            expected,
            tolerance,
        );

        let mut eval = RuleEvaluation::new(outcome, explanation)
            .with_refs(ctx.current(BS).map(|s| s.reference()), ctx.current(IS).map(|s| s.reference()))
            .with_variance(variance);
        if outcome == Outcome::Critical {
            eval = eval.with_alert(variance.abs());
        }
        Ok(eval)
    }
}

// ── Registration ────────────────────────────────────────────────────

pub fn register(catalog: &mut RuleCatalog) {
    for def in TIE_OUTS {
        catalog.register(Box::new(TieOutUnit {
            definition: RuleDefinition::new(def.code, CATEGORY, def.severity, def.description),
            def,
        }));
    }

    let escrows: [(&str, &str, &'static str, &'static str, &'static str); 3] = [
        ("XD-801", "Tax escrow three-way agreement", a::TAX_ESCROW, a::MS_TAX_ESCROW, a::CF_ESCROW_TAX),
        ("XD-802", "Insurance escrow three-way agreement", a::INSURANCE_ESCROW, a::MS_INSURANCE_ESCROW, a::CF_ESCROW_INSURANCE),
        ("XD-803", "Reserve escrow three-way agreement", a::RESERVE_ESCROW, a::MS_RESERVE_ESCROW, a::CF_ESCROW_RESERVE),
    ];
    for (code, description, bs_code, ms_code, cf_code) in escrows {
        catalog.register(Box::new(EscrowThreeWay {
            definition: RuleDefinition::new(code, CATEGORY, Severity::Critical, description),
            bs_code,
            ms_code,
            cf_code,
        }));
    }

    catalog.register(Box::new(NetIncomeThreeWay {
        definition: RuleDefinition::new(
            "XD-810",
            CATEGORY,
            Severity::Critical,
            "Net income three-way agreement",
        ),
    }));
    catalog.register(Box::new(EquityRollForward {
        definition: RuleDefinition::new(
            "XD-811",
            CATEGORY,
            Severity::Critical,
            "Total equity roll-forward",
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
    fn clean_fixture_passes_principal_tie() {
        let fx = Fixture::new(2025, 7, 6);
        let eval = evaluate(&fx, "XD-101");
        assert_eq!(eval.outcome, Outcome::Pass);
        assert_eq!(eval.variance_cents, Some(0));
    }

    #[test]
    fn mortgage_balance_divergence_goes_critical_with_alert() {
        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        let servicer = fx
            .amount(StatementType::MortgageStatement, key, a::MS_PRINCIPAL_BALANCE)
            .unwrap();
        // Ledger lags the servicer by $45,000.
        fx.set(StatementType::BalanceSheet, key, a::MORTGAGE_PAYABLE, servicer - 45_000_00);

        let eval = evaluate(&fx, "XD-101");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
        assert_eq!(eval.materiality_cents, 45_000_00);
        assert_eq!(eval.variance_cents, Some(-45_000_00));
    }

    #[test]
    fn small_divergence_is_a_warning_not_critical() {
        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        let servicer = fx
            .amount(StatementType::MortgageStatement, key, a::MS_PRINCIPAL_BALANCE)
            .unwrap();
        // $5 off: above the $1 rounding tolerance, below 10x.
        fx.set(StatementType::BalanceSheet, key, a::MORTGAGE_PAYABLE, servicer + 5_00);

        let eval = evaluate(&fx, "XD-101");
        assert_eq!(eval.outcome, Outcome::Warning);
        assert!(!eval.requests_alert);
    }

    #[test]
    fn warning_severity_rows_never_escalate_past_warning() {
        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        fx.set(StatementType::BalanceSheet, key, a::ACCRUED_INTEREST, 5_000_000_00);
        let eval = evaluate(&fx, "XD-106");
        assert_eq!(eval.outcome, Outcome::Warning);
    }

    #[test]
    fn missing_side_skips() {
        let mut fx = Fixture::new(2025, 7, 6);
        fx.drop_statement(StatementType::MortgageStatement, PeriodKey::new(2025, 7));
        let eval = evaluate(&fx, "XD-101");
        assert_eq!(eval.outcome, Outcome::Skip);
    }

    #[test]
    fn ytd_ties_hold_over_complete_history() {
        let fx = Fixture::new(2025, 7, 6);
        for code in ["XD-601", "XD-603", "XD-604", "XD-605"] {
            let eval = evaluate(&fx, code);
            assert_eq!(eval.outcome, Outcome::Pass, "{code} failed: {:?}", eval.explanation);
        }
    }

    #[test]
    fn ytd_tie_skips_on_incomplete_fiscal_history() {
        // Only 2 prior months from July: January is missing.
        let fx = Fixture::new(2025, 7, 2);
        let eval = evaluate(&fx, "XD-604");
        assert_eq!(eval.outcome, Outcome::Skip);
    }

    #[test]
    fn delta_ties_hold_on_clean_fixture() {
        let fx = Fixture::new(2025, 7, 6);
        for code in ["XD-303", "XD-304", "XD-305", "XD-306", "XD-307", "XD-308", "XD-310", "XD-504"] {
            let eval = evaluate(&fx, code);
            assert_eq!(eval.outcome, Outcome::Pass, "{code} failed: {:?}", eval.explanation);
        }
    }

    #[test]
    fn escrow_three_way_detects_rollforward_break() {
        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        // Servicer and ledger agree, but the funding line doubles.
        fx.set(StatementType::CashFlow, key, a::CF_ESCROW_TAX, -50_000_00);
        let eval = evaluate(&fx, "XD-801");
        assert_eq!(eval.outcome, Outcome::Critical);
        let why = eval.explanation["why"].as_str().unwrap_or_default();
        assert!(why.contains("rollforward"), "unexpected why: {why}");
    }

    #[test]
    fn equity_rollforward_clean_and_broken() {
        let fx = Fixture::new(2025, 7, 6);
        assert_eq!(evaluate(&fx, "XD-811").outcome, Outcome::Pass);
        assert_eq!(evaluate(&fx, "XD-810").outcome, Outcome::Pass);

        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        let equity = fx.amount(StatementType::BalanceSheet, key, a::TOTAL_EQUITY).unwrap();
        fx.set(StatementType::BalanceSheet, key, a::TOTAL_EQUITY, equity + 75_000_00);
        assert_eq!(evaluate(&fx, "XD-811").outcome, Outcome::Critical);
    }

    #[test]
    fn january_equity_deltas_skip() {
        let fx = Fixture::new(2025, 1, 3);
        for code in ["XD-310", "XD-810", "XD-811"] {
            assert_eq!(evaluate(&fx, code).outcome, Outcome::Skip, "{code}");
        }
    }

    #[test]
    fn interest_paid_ties_skip_without_cash_interest_line() {
        // The fixture presents an indirect cash flow with interest
        // inside net income; the direct interest ties cannot evaluate.
        let fx = Fixture::new(2025, 7, 6);
        assert_eq!(evaluate(&fx, "XD-502").outcome, Outcome::Skip);
        assert_eq!(evaluate(&fx, "XD-205").outcome, Outcome::Skip);
    }

    #[test]
    fn interest_paid_tie_evaluates_when_line_present() {
        let mut fx = Fixture::new(2025, 7, 6);
        let key = PeriodKey::new(2025, 7);
        fx.set(StatementType::CashFlow, key, a::CF_INTEREST_PAID, -68_750_00);
        assert_eq!(evaluate(&fx, "XD-502").outcome, Outcome::Pass);
        fx.set(StatementType::CashFlow, key, a::CF_INTEREST_PAID, -40_000_00);
        let eval = evaluate(&fx, "XD-502");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert_eq!(eval.variance_cents, Some(40_000_00 - 68_750_00));
    }
}
