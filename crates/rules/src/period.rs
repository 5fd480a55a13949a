//! Comparison-window resolution, done once per run.
//!
//! Point-in-time statements always cover the reporting period. Flow
//! statements (income statement, cash flow) may declare a window, may
//! only declare a cadence, or may declare nothing, in which case the
//! cash flow window is recovered by anchoring beginning cash against
//! prior-period ending cash.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

use tieout_core::accounts;
use tieout_core::{PeriodKey, PeriodType, StatementBundle, StatementType};

/// Why a window could not be resolved for a statement type. Rules that
/// depend on the window SKIP with this reason; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodResolutionError {
    #[error("{statement_type} not extracted for {period}")]
    MissingStatement { statement_type: StatementType, period: PeriodKey },

    #[error("no consistent window for {statement_type} {period}: {detail}")]
    NoConsistentWindow {
        statement_type: StatementType,
        period: PeriodKey,
        detail: String,
    },
}

/// The window a statement's figures cover, after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub period_type: PeriodType,
    pub months_covered: u32,
    /// More than one prior period matched the cash anchor; the most
    /// recent was chosen.
    pub ambiguous: bool,
    /// How the window was arrived at, when not taken verbatim.
    pub note: Option<String>,
}

impl ResolvedWindow {
    fn monthly(begin: NaiveDate, end: NaiveDate, note: Option<String>) -> Self {
        Self {
            begin,
            end,
            period_type: PeriodType::Monthly,
            months_covered: 1,
            ambiguous: false,
            note,
        }
    }

    /// Factor that scales this window's flows to an annual figure.
    pub fn annualization_factor(&self) -> f64 {
        12.0 / self.months_covered.max(1) as f64
    }

    pub fn is_monthly(&self) -> bool {
        self.period_type == PeriodType::Monthly
    }
}

/// Window resolution results for every statement type, computed once
/// and shared by all rule units in a run.
#[derive(Debug)]
pub struct WindowMap {
    map: HashMap<StatementType, Result<ResolvedWindow, PeriodResolutionError>>,
}

impl WindowMap {
    pub fn resolve_all(bundle: &StatementBundle) -> Self {
        let mut map = HashMap::new();
        for st in StatementType::ALL {
            let resolved = resolve(bundle, st);
            match &resolved {
                Ok(w) => tracing::debug!(
                    statement = %st,
                    begin = %w.begin,
                    end = %w.end,
                    period_type = w.period_type.as_str(),
                    ambiguous = w.ambiguous,
                    "window resolved"
                ),
                Err(e) => tracing::debug!(statement = %st, error = %e, "window unresolved"),
            }
            map.insert(st, resolved);
        }
        Self { map }
    }

    /// The resolved window, if resolution succeeded.
    pub fn resolved(&self, statement_type: StatementType) -> Option<&ResolvedWindow> {
        self.map.get(&statement_type).and_then(|r| r.as_ref().ok())
    }

    pub fn error(&self, statement_type: StatementType) -> Option<&PeriodResolutionError> {
        self.map.get(&statement_type).and_then(|r| r.as_ref().err())
    }
}

fn resolve(
    bundle: &StatementBundle,
    statement_type: StatementType,
) -> Result<ResolvedWindow, PeriodResolutionError> {
    let period = &bundle.period;
    let stmt = bundle.current(statement_type).ok_or(PeriodResolutionError::MissingStatement {
        statement_type,
        period: period.key(),
    })?;

    if !statement_type.is_flow() {
        return Ok(ResolvedWindow::monthly(period.start, period.end, None));
    }

    // A source document that claims an annual cadence but carries
    // twelve monthly columns is really a monthly statement whose last
    // column was extracted.
    if stmt.period_type == Some(PeriodType::Annual) {
        let month_columns = stmt
            .header("month_columns")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        if month_columns >= 12 {
            return Ok(ResolvedWindow::monthly(
                period.start,
                period.end,
                Some("annual cadence reclassified as monthly (12 monthly columns)".to_string()),
            ));
        }
    }

    if let (Some(begin), Some(end)) = (stmt.window_begin, stmt.window_end) {
        return from_declared_window(statement_type, period.key(), stmt.period_type, begin, end);
    }

    if statement_type == StatementType::CashFlow {
        return anchor_cash_window(bundle);
    }

    // Income statement with no declared window: trust the cadence,
    // defaulting to a single-month window ending at period end.
    let months = match stmt.period_type {
        Some(PeriodType::Monthly) | None => 1,
        Some(PeriodType::Quarterly) => 3,
        Some(PeriodType::Annual) | Some(PeriodType::Rolling) => 12,
    };
    let begin = window_begin_for(period.key(), months);
    let note = match stmt.period_type {
        None => Some("no window or cadence declared; defaulted to reporting month".to_string()),
        _ => None,
    };
    Ok(ResolvedWindow {
        begin,
        end: period.end,
        period_type: stmt.period_type.unwrap_or(PeriodType::Monthly),
        months_covered: months,
        ambiguous: false,
        note,
    })
}

fn from_declared_window(
    statement_type: StatementType,
    period: PeriodKey,
    declared: Option<PeriodType>,
    begin: NaiveDate,
    end: NaiveDate,
) -> Result<ResolvedWindow, PeriodResolutionError> {
    if begin > end {
        return Err(PeriodResolutionError::NoConsistentWindow {
            statement_type,
            period,
            detail: format!("declared window begins {begin} after it ends {end}"),
        });
    }

    let months = span_months(begin, end);
    let period_type = match months {
        1 => PeriodType::Monthly,
        3 => PeriodType::Quarterly,
        12 => PeriodType::Annual,
        _ => PeriodType::Rolling,
    };

    let note = match declared {
        Some(d) if d != period_type => Some(format!(
            "declared cadence {} contradicts window span of {} month(s); window wins",
            d.as_str(),
            months
        )),
        _ => None,
    };

    Ok(ResolvedWindow {
        begin,
        end,
        period_type,
        months_covered: months,
        ambiguous: false,
        note,
    })
}

/// Recover the cash flow window by matching the statement's beginning
/// cash against prior-period ending cash. The most recent matching
/// prior wins; multiple matches flag the window ambiguous.
fn anchor_cash_window(bundle: &StatementBundle) -> Result<ResolvedWindow, PeriodResolutionError> {
    let period = &bundle.period;
    let st = StatementType::CashFlow;
    let stmt = bundle.current(st).ok_or(PeriodResolutionError::MissingStatement {
        statement_type: st,
        period: period.key(),
    })?;

    let beginning = stmt.amount(accounts::CF_BEGINNING_CASH).ok_or_else(|| {
        PeriodResolutionError::NoConsistentWindow {
            statement_type: st,
            period: period.key(),
            detail: "beginning cash line absent, cannot anchor".to_string(),
        }
    })?;

    // Priors are ordered newest first.
    let matches: Vec<PeriodKey> = bundle
        .priors(st)
        .filter(|p| p.amount(accounts::CF_ENDING_CASH) == Some(beginning))
        .map(|p| p.period)
        .collect();

    let anchor = matches.first().copied().ok_or_else(|| {
        PeriodResolutionError::NoConsistentWindow {
            statement_type: st,
            period: period.key(),
            detail: format!(
                "no prior ending cash equals beginning cash of {} cents",
                beginning
            ),
        }
    })?;

    let months = period.key().months_since(&anchor).max(1) as u32;
    let first = anchor.next();
    let begin = NaiveDate::from_ymd_opt(first.year, first.month, 1).ok_or_else(|| {
        PeriodResolutionError::NoConsistentWindow {
            statement_type: st,
            period: period.key(),
            detail: format!("anchor period {first} out of calendar range"),
        }
    })?;

    let period_type = match months {
        1 => PeriodType::Monthly,
        3 => PeriodType::Quarterly,
        12 => PeriodType::Annual,
        _ => PeriodType::Rolling,
    };

    Ok(ResolvedWindow {
        begin,
        end: period.end,
        period_type,
        months_covered: months,
        ambiguous: matches.len() > 1,
        note: Some(format!("window anchored on ending cash of {anchor}")),
    })
}

/// Inclusive whole months between two dates' calendar months.
fn span_months(begin: NaiveDate, end: NaiveDate) -> u32 {
    let months =
        (end.year() - begin.year()) * 12 + end.month() as i32 - begin.month() as i32 + 1;
    months.max(1) as u32
}

/// First day of the month `months - 1` before `period`.
fn window_begin_for(period: PeriodKey, months: u32) -> NaiveDate {
    let mut key = period;
    for _ in 1..months {
        key = key.prev();
    }
    // Day 1 of a valid PeriodKey month always exists.
    NaiveDate::from_ymd_opt(key.year, key.month, 1)
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tieout_core::accounts;

    #[test]
    fn point_in_time_windows_cover_the_month() {
        let bundle = fixtures::clean_bundle(2025, 7, 6);
        let windows = WindowMap::resolve_all(&bundle);
        let w = windows.resolved(StatementType::BalanceSheet).unwrap();
        assert_eq!(w.begin, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(w.end, NaiveDate::from_ymd_opt(2025, 7, 31).unwrap());
        assert!(w.is_monthly());
    }

    #[test]
    fn cash_window_anchors_on_prior_ending_cash() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        // Strip declared windows so the anchor search has to run.
        fx.clear_windows(StatementType::CashFlow);
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);

        let w = windows.resolved(StatementType::CashFlow).unwrap();
        assert!(w.is_monthly());
        assert!(!w.ambiguous);
        assert_eq!(w.begin, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn ambiguous_anchor_prefers_most_recent() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        fx.clear_windows(StatementType::CashFlow);
        // Make an older month's ending cash collide with the current
        // beginning cash as well.
        let beginning = fx
            .amount(StatementType::CashFlow, PeriodKey::new(2025, 7), accounts::CF_BEGINNING_CASH)
            .unwrap();
        fx.set(StatementType::CashFlow, PeriodKey::new(2025, 4), accounts::CF_ENDING_CASH, beginning);
        let bundle = fx.bundle();

        let w = WindowMap::resolve_all(&bundle)
            .resolved(StatementType::CashFlow)
            .cloned()
            .unwrap();
        assert!(w.ambiguous);
        // Most recent match (June) still wins: a one-month window.
        assert_eq!(w.months_covered, 1);
    }

    #[test]
    fn no_anchor_match_is_unresolvable() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        fx.clear_windows(StatementType::CashFlow);
        fx.set(
            StatementType::CashFlow,
            PeriodKey::new(2025, 7),
            accounts::CF_BEGINNING_CASH,
            999_999_999,
        );
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);
        assert!(windows.resolved(StatementType::CashFlow).is_none());
        assert!(matches!(
            windows.error(StatementType::CashFlow),
            Some(PeriodResolutionError::NoConsistentWindow { .. })
        ));
    }

    #[test]
    fn annual_cadence_with_monthly_columns_reclassified() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        fx.declare_period_type(StatementType::IncomeStatement, PeriodType::Annual);
        fx.set_header(StatementType::IncomeStatement, "month_columns", "12");
        let bundle = fx.bundle();

        let w = WindowMap::resolve_all(&bundle)
            .resolved(StatementType::IncomeStatement)
            .cloned()
            .unwrap();
        assert!(w.is_monthly());
        assert!(w.note.as_deref().unwrap_or("").contains("reclassified"));
        assert_eq!(w.annualization_factor(), 12.0);
    }

    #[test]
    fn declared_window_span_overrides_cadence() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        fx.declare_period_type(StatementType::IncomeStatement, PeriodType::Monthly);
        fx.declare_window(
            StatementType::IncomeStatement,
            NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        );
        let bundle = fx.bundle();

        let w = WindowMap::resolve_all(&bundle)
            .resolved(StatementType::IncomeStatement)
            .cloned()
            .unwrap();
        assert_eq!(w.period_type, PeriodType::Annual);
        assert_eq!(w.months_covered, 12);
        assert!(w.note.is_some());
        assert_eq!(w.annualization_factor(), 1.0);
    }

    #[test]
    fn missing_statement_reported_per_type() {
        let mut fx = fixtures::Fixture::new(2025, 7, 6);
        fx.drop_statement(StatementType::MortgageStatement, PeriodKey::new(2025, 7));
        let bundle = fx.bundle();
        let windows = WindowMap::resolve_all(&bundle);
        assert!(matches!(
            windows.error(StatementType::MortgageStatement),
            Some(PeriodResolutionError::MissingStatement { .. })
        ));
        assert!(windows.resolved(StatementType::BalanceSheet).is_some());
    }
}
