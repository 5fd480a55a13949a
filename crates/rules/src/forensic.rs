//! Forensic screens: statistical and structural heuristics that flag
//! figures which look manufactured rather than measured.
//!
//! Screens are advisory by design. Each one states in its explanation
//! what was measured and against which threshold, so a reviewer can
//! dismiss a finding without re-running the numbers.

use std::collections::HashMap;

use tieout_core::accounts as a;
use tieout_core::money::{self, is_round_dollar, leading_digit, Cents};
use tieout_core::{
    Outcome, PeriodKey, RuleCategory, RuleDefinition, Severity, StatementRecord, StatementType,
};

use crate::catalog::RuleCatalog;
use crate::unit::{cap_outcome, RuleContext, RuleEvaluation, RuleUnit, RuleUnitError};

const CATEGORY: RuleCategory = RuleCategory::ForensicAnomaly;

use StatementType::{BalanceSheet as BS, CashFlow as CF, IncomeStatement as IS};
use StatementType::RentRoll as RR;

/// Detail amounts suitable for digit screens: nonzero, non-subtotal,
/// and excluding structural lines (cash carry rows, unit counts).
fn screen_samples(stmt: &StatementRecord) -> Vec<Cents> {
    const STRUCTURAL: &[&str] = &[
        a::CF_BEGINNING_CASH,
        a::CF_NET_CHANGE,
        a::CF_ENDING_CASH,
        a::RR_OCCUPIED_UNITS,
        a::RR_TOTAL_UNITS,
        a::RR_OCCUPIED_SQFT,
        a::RR_TOTAL_SQFT,
    ];
    stmt.lines
        .iter()
        .filter(|l| {
            l.amount_cents != 0
                && !tieout_core::statement::is_subtotal_code(&l.account_code)
                && !STRUCTURAL.contains(&l.account_code.as_str())
        })
        .map(|l| l.amount_cents)
        .collect()
}

// ── FA-001: cash flow articulation ──────────────────────────────────

/// Beginning cash plus net change must equal ending cash on the face
/// of the statement itself. A break here means the document was edited
/// after it was produced.
struct CashFlowArticulation {
    definition: RuleDefinition,
}

impl RuleUnit for CashFlowArticulation {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(CF) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(CF)),
        };
        let (beginning, change, ending) = match (
            stmt.amount(a::CF_BEGINNING_CASH),
            stmt.amount(a::CF_NET_CHANGE),
            stmt.amount(a::CF_ENDING_CASH),
        ) {
            (Some(b), Some(c), Some(e)) => (b, c, e),
            _ => return Ok(RuleEvaluation::skip("cash carry lines absent")),
        };

        let expected = beginning
            .checked_add(change)
            .ok_or_else(|| RuleUnitError::Overflow("beginning cash + net change".into()))?;
        let variance = ending - expected;
        let tolerance = ctx.tolerance_cents("tolerance.rounding", CATEGORY);

        if variance.abs() <= tolerance {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "beginning cash plus net change equals ending cash",
            }))
            .with_refs(Some(stmt.reference()), None))
        } else {
            Ok(RuleEvaluation::critical(serde_json::json!({
                "why": "ending cash does not equal beginning cash plus net change on the statement's own face",
                "resolution": "the document is internally inconsistent; treat every figure on it as suspect",
                "beginning": money::format_cents(beginning),
                "net_change": money::format_cents(change),
                "ending": money::format_cents(ending),
                "variance": money::format_cents(variance),
            }))
            .with_refs(Some(stmt.reference()), None)
            .with_variance(variance)
            .with_alert(variance.abs()))
        }
    }
}

// ── FA-002..004: sign conventions ───────────────────────────────────

/// (code, must_be_non_negative) pairs per statement.
struct SignConvention {
    definition: RuleDefinition,
    statement: StatementType,
    non_negative: &'static [&'static str],
    non_positive: &'static [&'static str],
    /// Prefix whose detail lines must be non-negative.
    non_negative_prefix: Option<&'static str>,
}

impl RuleUnit for SignConvention {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(self.statement) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(self.statement)),
        };

        let mut violations: Vec<serde_json::Value> = Vec::new();
        for code in self.non_negative {
            if let Some(v) = stmt.amount(code) {
                if v < 0 {
                    violations.push(serde_json::json!({
                        "account": code,
                        "amount": money::format_cents(v),
                        "expected": "non-negative",
                    }));
                }
            }
        }
        for code in self.non_positive {
            if let Some(v) = stmt.amount(code) {
                if v > 0 {
                    violations.push(serde_json::json!({
                        "account": code,
                        "amount": money::format_cents(v),
                        "expected": "non-positive",
                    }));
                }
            }
        }
        if let Some(prefix) = self.non_negative_prefix {
            for line in &stmt.lines {
                if line.account_code.starts_with(prefix)
                    && !tieout_core::statement::is_subtotal_code(&line.account_code)
                    && !self.non_positive.contains(&line.account_code.as_str())
                    && line.amount_cents < 0
                {
                    violations.push(serde_json::json!({
                        "account": line.account_code,
                        "amount": money::format_cents(line.amount_cents),
                        "expected": "non-negative",
                    }));
                }
            }
        }

        if violations.is_empty() {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "amounts carry their conventional signs",
            }))
            .with_refs(Some(stmt.reference()), None))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": format!("{} lines carry unconventional signs", self.statement),
                "resolution": "a flipped sign often marks a reclassification used to hide a shortfall",
                "violations": violations,
            }))
            .with_refs(Some(stmt.reference()), None))
        }
    }
}

// ── FA-005/006: round-number screens ────────────────────────────────

/// Measured figures rarely land on even dollars. A statement where
/// most detail lines end in `.00` reads as typed-in, not booked.
struct RoundNumberScreen {
    definition: RuleDefinition,
    statement: StatementType,
}

impl RuleUnit for RoundNumberScreen {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(self.statement) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(self.statement)),
        };
        let samples = screen_samples(stmt);
        let min = ctx.setting("forensic.round_min_samples", CATEGORY) as usize;
        if samples.len() < min {
            return Ok(RuleEvaluation::skip(&format!(
                "{} nonzero detail lines, screen needs {min}",
                samples.len()
            )));
        }

        let round = samples.iter().filter(|v| is_round_dollar(**v)).count();
        let share = round as f64 / samples.len() as f64;
        let warning = ctx.setting("forensic.round_share_warning", CATEGORY);
        let critical = ctx.setting("forensic.round_share_critical", CATEGORY);

        let outcome = if share < warning {
            Outcome::Pass
        } else if share < critical {
            Outcome::Warning
        } else {
            Outcome::Critical
        };
        let explanation = serde_json::json!({
            "why": format!(
                "{round} of {} detail lines are even-dollar figures ({:.0}%)",
                samples.len(),
                share * 100.0
            ),
            "resolution": "trace the round lines to source invoices or ledger entries",
            "warning_share": warning,
            "critical_share": critical,
        });
        let mut eval = RuleEvaluation::new(
            cap_outcome(outcome, self.definition.severity_on_fail),
            explanation,
        )
        .with_refs(Some(stmt.reference()), None);
        if eval.outcome == Outcome::Critical {
            let at_stake: Cents = samples
                .iter()
                .filter(|v| is_round_dollar(**v))
                .map(|v| v.abs())
                .sum();
            eval = eval.with_alert(at_stake);
        }
        Ok(eval)
    }
}

// ── FA-007..009: Benford first-digit screens ────────────────────────

/// Expected first-digit proportions under Benford's law, digits 1-9.
const BENFORD: [f64; 9] = [
    0.30103, 0.17609, 0.12494, 0.09691, 0.07918, 0.06695, 0.05799, 0.05115, 0.04576,
];

/// Mean absolute deviation of the observed first-digit distribution
/// from Benford's law. `None` when no sample has a leading digit.
fn benford_mad(samples: &[Cents]) -> Option<f64> {
    let mut counts = [0u32; 9];
    let mut total = 0u32;
    for v in samples {
        if let Some(d) = leading_digit(*v) {
            counts[(d - 1) as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return None;
    }
    let mad = counts
        .iter()
        .zip(BENFORD.iter())
        .map(|(c, expected)| (*c as f64 / total as f64 - expected).abs())
        .sum::<f64>()
        / 9.0;
    Some(mad)
}

struct BenfordScreen {
    definition: RuleDefinition,
    statement: StatementType,
}

impl RuleUnit for BenfordScreen {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(self.statement) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(self.statement)),
        };
        let samples = screen_samples(stmt);
        let min = ctx.setting("forensic.benford_min_samples", CATEGORY) as usize;
        if samples.len() < min {
            return Ok(RuleEvaluation::skip(&format!(
                "{} detail lines, first-digit screen needs {min}",
                samples.len()
            )));
        }

        let mad = match benford_mad(&samples) {
            Some(m) => m,
            None => return Ok(RuleEvaluation::skip("no sample with a leading digit")),
        };
        let warning = ctx.setting("forensic.benford_warning_mad", CATEGORY);
        let critical = ctx.setting("forensic.benford_critical_mad", CATEGORY);

        let outcome = if mad < warning {
            Outcome::Pass
        } else if mad < critical {
            Outcome::Warning
        } else {
            Outcome::Critical
        };
        let explanation = serde_json::json!({
            "why": format!(
                "first-digit distribution deviates from Benford's law (MAD {:.4} over {} lines)",
                mad,
                samples.len()
            ),
            "resolution": "sample the heaviest digit bucket and trace those lines to source",
            "warning_mad": warning,
            "critical_mad": critical,
        });
        let mut eval = RuleEvaluation::new(
            cap_outcome(outcome, self.definition.severity_on_fail),
            explanation,
        )
        .with_refs(Some(stmt.reference()), None);
        if eval.outcome == Outcome::Critical {
            let at_stake: Cents = samples.iter().map(|v| v.abs()).sum();
            eval = eval.with_alert(at_stake);
        }
        Ok(eval)
    }
}

// ── FA-010: repeated amounts within a statement ─────────────────────

struct RepeatedAmounts {
    definition: RuleDefinition,
}

impl RuleUnit for RepeatedAmounts {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(IS) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(IS)),
        };
        let min_repeats = ctx.setting("forensic.duplicate_min_repeats", CATEGORY) as usize;

        let mut by_amount: HashMap<Cents, Vec<&str>> = HashMap::new();
        for line in &stmt.lines {
            if line.amount_cents != 0
                && !tieout_core::statement::is_subtotal_code(&line.account_code)
            {
                by_amount
                    .entry(line.amount_cents)
                    .or_default()
                    .push(line.account_code.as_str());
            }
        }
        let mut repeated: Vec<serde_json::Value> = by_amount
            .iter()
            .filter(|(_, codes)| codes.len() >= min_repeats)
            .map(|(amount, codes)| {
                serde_json::json!({
                    "amount": money::format_cents(*amount),
                    "accounts": codes,
                })
            })
            .collect();
        repeated.sort_by_key(|v| v["amount"].as_str().map(String::from));

        if repeated.is_empty() {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "no amount repeats across enough distinct accounts to flag",
            }))
            .with_refs(Some(stmt.reference()), None))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": "the same amount appears on several unrelated lines",
                "resolution": "copy-pasted figures cluster like this; trace each occurrence separately",
                "repeats": repeated,
            }))
            .with_refs(Some(stmt.reference()), None))
        }
    }
}

// ── FA-011: frozen figures across months ────────────────────────────

/// Figures that should move month to month but sit frozen across the
/// lookback read as rolled-forward rather than re-measured.
struct FrozenFigures {
    definition: RuleDefinition,
}

const SHOULD_VARY: &[(StatementType, &str, &str)] = &[
    (IS, a::RENTAL_INCOME, "rental income"),
    (IS, a::NET_INCOME, "net income"),
    (CF, a::CF_NET_INCOME, "cash flow net income"),
    (BS, a::OPERATING_CASH, "operating cash"),
];

impl RuleUnit for FrozenFigures {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        // Needs the current month plus at least three priors.
        let mut frozen: Vec<serde_json::Value> = Vec::new();
        let mut checked = 0;
        for (st, code, label) in SHOULD_VARY {
            let current = match ctx.current(*st).and_then(|s| s.amount(code)) {
                Some(v) => v,
                None => continue,
            };
            let priors: Vec<Cents> = ctx
                .bundle
                .priors(*st)
                .filter_map(|s| s.amount(code))
                .take(3)
                .collect();
            if priors.len() < 3 {
                continue;
            }
            checked += 1;
            if priors.iter().all(|v| *v == current) {
                frozen.push(serde_json::json!({
                    "figure": label,
                    "account": code,
                    "amount": money::format_cents(current),
                    "months": priors.len() + 1,
                }));
            }
        }

        if checked == 0 {
            return Ok(RuleEvaluation::skip("needs three prior months of history"));
        }
        if frozen.is_empty() {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "figures that should vary do vary across the lookback",
            })))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": "figures expected to move are identical month after month",
                "resolution": "confirm these were re-measured rather than rolled forward",
                "frozen": frozen,
            })))
        }
    }
}

// ── FA-012: receivables flip-flop ───────────────────────────────────

/// Receivables that swing direction every single month suggest revenue
/// pulled forward and reversed repeatedly.
struct ReceivablesFlipFlop {
    definition: RuleDefinition,
}

impl RuleUnit for ReceivablesFlipFlop {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        // Newest-first series: current month, then priors.
        let mut series: Vec<(PeriodKey, Cents)> = Vec::new();
        if let Some(v) = ctx.current(BS).and_then(|s| s.amount(a::TENANT_AR)) {
            series.push((ctx.period.key(), v));
        }
        for stmt in ctx.bundle.priors(BS) {
            if let Some(v) = stmt.amount(a::TENANT_AR) {
                series.push((stmt.period, v));
            }
        }
        if series.len() < 5 {
            return Ok(RuleEvaluation::skip(
                "receivables flip-flop screen needs four months of deltas",
            ));
        }

        let floor = ctx.tolerance_cents("forensic.spike_floor", CATEGORY);
        let deltas: Vec<Cents> = series.windows(2).map(|w| w[0].1 - w[1].1).collect();
        let mut alternations = 0;
        for pair in deltas.windows(2) {
            let (newer, older) = (pair[0], pair[1]);
            if newer.abs() > floor && older.abs() > floor && newer.signum() == -older.signum() {
                alternations += 1;
            }
        }

        if alternations >= 3 {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": format!(
                    "tenant receivables reversed direction {alternations} times across {} months",
                    series.len()
                ),
                "resolution": "alternating build-and-release of receivables can mask timing of revenue",
                "deltas": deltas.iter().map(|d| money::format_cents(*d)).collect::<Vec<_>>(),
            })))
        } else {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "receivables move in a consistent direction",
                "alternations": alternations,
            })))
        }
    }
}

// ── FA-013: expense spike against trailing average ──────────────────

struct ExpenseSpike {
    definition: RuleDefinition,
}

impl RuleUnit for ExpenseSpike {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let current = match ctx.current(IS) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(IS)),
        };
        let priors: Vec<&StatementRecord> = ctx.bundle.priors(IS).take(6).collect();
        if priors.len() < 3 {
            return Ok(RuleEvaluation::skip("spike screen needs three prior months"));
        }

        let multiplier = ctx.setting("forensic.spike_multiplier", CATEGORY);
        let floor = ctx.tolerance_cents("forensic.spike_floor", CATEGORY);

        let mut spikes: Vec<serde_json::Value> = Vec::new();
        for line in &current.lines {
            if !line.account_code.starts_with('5')
                || tieout_core::statement::is_subtotal_code(&line.account_code)
            {
                continue;
            }
            let history: Vec<Cents> =
                priors.iter().filter_map(|s| s.amount(&line.account_code)).collect();
            if history.len() < 3 {
                continue;
            }
            let avg = history.iter().sum::<Cents>() / history.len() as Cents;
            if avg <= 0 {
                continue;
            }
            let ceiling = (avg as f64 * multiplier) as Cents;
            if line.amount_cents > ceiling && (line.amount_cents - avg) > floor {
                spikes.push(serde_json::json!({
                    "account": line.account_code,
                    "name": line.account_name,
                    "amount": money::format_cents(line.amount_cents),
                    "trailing_average": money::format_cents(avg),
                }));
            }
        }

        if spikes.is_empty() {
            Ok(RuleEvaluation::pass(serde_json::json!({
                "why": "no expense line spikes against its trailing average",
            }))
            .with_refs(Some(current.reference()), None))
        } else {
            Ok(RuleEvaluation::warning(serde_json::json!({
                "why": "expense lines spike well above their own history",
                "resolution": "pull the invoices behind the spike month",
                "multiplier": multiplier,
                "spikes": spikes,
            }))
            .with_refs(Some(current.reference()), None))
        }
    }
}

// ── FA-014: tenant concentration ────────────────────────────────────

struct TenantConcentration {
    definition: RuleDefinition,
}

impl RuleUnit for TenantConcentration {
    fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleEvaluation, RuleUnitError> {
        let stmt = match ctx.current(RR) {
            Some(s) => s,
            None => return Ok(RuleEvaluation::skip_missing(RR)),
        };
        let tenants: Vec<(&str, Cents)> = stmt
            .lines
            .iter()
            .filter(|l| l.account_code.starts_with(a::RR_TENANT_PREFIX) && l.amount_cents > 0)
            .map(|l| (l.account_code.as_str(), l.amount_cents))
            .collect();
        if tenants.is_empty() {
            return Ok(RuleEvaluation::skip("rent roll carries no per-tenant lines"));
        }
        let total: Cents = tenants.iter().map(|(_, v)| v).sum();
        if total <= 0 {
            return Ok(RuleEvaluation::skip("per-tenant rents sum to zero"));
        }
        let (top_code, top_rent) = match tenants.iter().max_by_key(|(_, v)| *v) {
            Some(t) => *t,
            None => return Ok(RuleEvaluation::skip("no tenant lines")),
        };
        let share = top_rent as f64 / total as f64;

        let warning = ctx.setting("forensic.concentration_warning", CATEGORY);
        let critical = ctx.setting("forensic.concentration_critical", CATEGORY);
        let outcome = if share < warning {
            Outcome::Pass
        } else if share < critical {
            Outcome::Warning
        } else {
            Outcome::Critical
        };

        let mut eval = RuleEvaluation::new(
            cap_outcome(outcome, self.definition.severity_on_fail),
            serde_json::json!({
                "why": format!(
                    "largest tenant {} carries {:.0}% of scheduled rent",
                    top_code,
                    share * 100.0
                ),
                "resolution": "income durability rests on a single lease; verify its term and credit",
                "top_rent": money::format_cents(top_rent),
                "scheduled_total": money::format_cents(total),
            }),
        )
        .with_refs(Some(stmt.reference()), None);
        if eval.outcome == Outcome::Critical {
            eval = eval.with_alert(top_rent);
        }
        Ok(eval)
    }
}

// ── Registration ────────────────────────────────────────────────────

pub fn register(catalog: &mut RuleCatalog) {
    catalog.register(Box::new(CashFlowArticulation {
        definition: RuleDefinition::new(
            "FA-001",
            CATEGORY,
            Severity::Critical,
            "Cash flow statement articulates on its own face",
        ),
    }));

    catalog.register(Box::new(SignConvention {
        definition: RuleDefinition::new(
            "FA-002",
            CATEGORY,
            Severity::Warning,
            "Revenue lines carry conventional signs",
        ),
        statement: IS,
        non_negative: &[
            a::RENTAL_INCOME,
            a::TENANT_REIMBURSEMENTS,
            a::PARKING_INCOME,
            a::OTHER_INCOME,
            a::LATE_FEES,
        ],
        non_positive: &[a::VACANCY_LOSS, a::CONCESSIONS],
        non_negative_prefix: None,
    }));
    catalog.register(Box::new(SignConvention {
        definition: RuleDefinition::new(
            "FA-003",
            CATEGORY,
            Severity::Warning,
            "Expense lines carry conventional signs",
        ),
        statement: IS,
        non_negative: &[a::INTEREST_EXPENSE, a::DEPRECIATION, a::AMORTIZATION],
        non_positive: &[],
        non_negative_prefix: Some("5"),
    }));
    catalog.register(Box::new(SignConvention {
        definition: RuleDefinition::new(
            "FA-004",
            CATEGORY,
            Severity::Warning,
            "Balance sheet lines carry conventional signs",
        ),
        statement: BS,
        non_negative: &[
            a::TENANT_AR,
            a::TAX_ESCROW,
            a::INSURANCE_ESCROW,
            a::RESERVE_ESCROW,
            a::SECURITY_DEPOSITS_HELD,
            a::MORTGAGE_PAYABLE,
            a::ACCOUNTS_PAYABLE,
        ],
        non_positive: &[a::ACCUM_DEPRECIATION],
        non_negative_prefix: None,
    }));

    for (code, statement) in [("FA-005", IS), ("FA-006", CF)] {
        catalog.register(Box::new(RoundNumberScreen {
            definition: RuleDefinition::new(
                code,
                CATEGORY,
                Severity::Critical,
                format!("{statement} detail lines not dominated by even-dollar figures"),
            ),
            statement,
        }));
    }

    for (code, statement) in [("FA-007", IS), ("FA-008", BS), ("FA-009", CF)] {
        catalog.register(Box::new(BenfordScreen {
            definition: RuleDefinition::new(
                code,
                CATEGORY,
                Severity::Critical,
                format!("{statement} first digits consistent with Benford's law"),
            ),
            statement,
        }));
    }

    catalog.register(Box::new(RepeatedAmounts {
        definition: RuleDefinition::new(
            "FA-010",
            CATEGORY,
            Severity::Warning,
            "No amount repeats across unrelated income statement lines",
        ),
    }));
    catalog.register(Box::new(FrozenFigures {
        definition: RuleDefinition::new(
            "FA-011",
            CATEGORY,
            Severity::Warning,
            "Figures expected to vary are not frozen across months",
        ),
    }));
    catalog.register(Box::new(ReceivablesFlipFlop {
        definition: RuleDefinition::new(
            "FA-012",
            CATEGORY,
            Severity::Warning,
            "Tenant receivables do not flip direction every month",
        ),
    }));
    catalog.register(Box::new(ExpenseSpike {
        definition: RuleDefinition::new(
            "FA-013",
            CATEGORY,
            Severity::Warning,
            "Expense lines within range of their trailing average",
        ),
    }));
    catalog.register(Box::new(TenantConcentration {
        definition: RuleDefinition::new(
            "FA-014",
            CATEGORY,
            Severity::Critical,
            "Scheduled rent not concentrated in a single tenant",
        ),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Fixture;
    use crate::period::WindowMap;
    use crate::resolver::ThresholdResolver;

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
    fn clean_fixture_raises_no_forensic_findings() {
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
            assert!(
                matches!(eval.outcome, Outcome::Pass | Outcome::Skip),
                "{} produced {:?}: {:?}",
                unit.definition().code,
                eval.outcome,
                eval.explanation
            );
        }
    }

    #[test]
    fn broken_cash_articulation_is_critical() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        let ending = fx.amount(CF, key, a::CF_ENDING_CASH).unwrap();
        fx.set(CF, key, a::CF_ENDING_CASH, ending + 25_000_00);
        let eval = evaluate(&fx, "FA-001");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
        assert_eq!(eval.materiality_cents, 25_000_00);
    }

    #[test]
    fn flipped_expense_sign_warns() {
        let mut fx = Fixture::new(2025, 7, 2);
        fx.set(IS, PeriodKey::new(2025, 7), a::REPAIRS_MAINTENANCE, -6_789_01);
        assert_eq!(evaluate(&fx, "FA-003").outcome, Outcome::Warning);
    }

    #[test]
    fn round_number_saturation_flags() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // Rewrite most income and expense lines as even-dollar
        // figures; 15 of the 22 detail lines end up round.
        for (i, code) in [
            a::RENTAL_INCOME,
            a::TENANT_REIMBURSEMENTS,
            a::PARKING_INCOME,
            a::MANAGEMENT_FEES,
            a::PAYROLL,
            a::REPAIRS_MAINTENANCE,
            a::TURNOVER,
            a::UTILITIES_ELECTRIC,
            a::UTILITIES_WATER,
            a::UTILITIES_GAS,
            a::PROPERTY_TAXES,
            a::INSURANCE_EXPENSE,
            a::MARKETING,
            a::ADMINISTRATIVE,
            a::PROFESSIONAL_FEES,
        ]
        .iter()
        .enumerate()
        {
            fx.set(IS, key, code, (i as Cents + 1) * 1_000_00);
        }
        let eval = evaluate(&fx, "FA-005");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
    }

    #[test]
    fn benford_skips_on_thin_samples_and_flags_skew() {
        let fx = Fixture::new(2025, 7, 2);
        assert_eq!(evaluate(&fx, "FA-007").outcome, Outcome::Skip);

        // Pad the income statement with fabricated lines all leading
        // with 9 until the sample gate opens.
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        for i in 0..40 {
            fx.set(IS, key, &format!("51{i:02}"), 9_000_00 + i);
        }
        let eval = evaluate(&fx, "FA-007");
        assert_eq!(eval.outcome, Outcome::Critical);
    }

    #[test]
    fn repeated_amounts_flag_copy_paste() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        for code in [a::MARKETING, a::ADMINISTRATIVE, a::PROFESSIONAL_FEES] {
            fx.set(IS, key, code, 2_222_22);
        }
        assert_eq!(evaluate(&fx, "FA-010").outcome, Outcome::Warning);
    }

    #[test]
    fn frozen_net_income_warns() {
        let mut fx = Fixture::new(2025, 7, 4);
        let frozen = 10_000_00;
        for month in 4..=7 {
            let key = PeriodKey::new(2025, month);
            fx.set(IS, key, a::NET_INCOME, frozen);
        }
        assert_eq!(evaluate(&fx, "FA-011").outcome, Outcome::Warning);
    }

    #[test]
    fn receivables_flip_flop_detected() {
        let mut fx = Fixture::new(2025, 7, 5);
        for (i, month) in (2..=7).enumerate() {
            let key = PeriodKey::new(2025, month as u32);
            let amount = if i % 2 == 0 { 80_000_00 } else { 40_000_00 };
            fx.set(BS, key, a::TENANT_AR, amount);
        }
        assert_eq!(evaluate(&fx, "FA-012").outcome, Outcome::Warning);
    }

    #[test]
    fn expense_spike_detected() {
        let mut fx = Fixture::new(2025, 7, 4);
        fx.set(IS, PeriodKey::new(2025, 7), a::REPAIRS_MAINTENANCE, 45_000_00);
        let eval = evaluate(&fx, "FA-013");
        assert_eq!(eval.outcome, Outcome::Warning);
    }

    #[test]
    fn tenant_concentration_graded_by_share() {
        let mut fx = Fixture::new(2025, 7, 2);
        let key = PeriodKey::new(2025, 7);
        // Without tenant lines the screen stays silent.
        assert_eq!(evaluate(&fx, "FA-014").outcome, Outcome::Skip);

        fx.set(RR, key, "T-101", 120_000_00);
        fx.set(RR, key, "T-102", 40_000_00);
        fx.set(RR, key, "T-103", 40_000_00);
        let eval = evaluate(&fx, "FA-014");
        assert_eq!(eval.outcome, Outcome::Critical);
        assert!(eval.requests_alert);
    }
}
