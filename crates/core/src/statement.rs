//! Extracted financial statements, the read-only input to the engine.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Cents;
use crate::property::{PeriodKey, Property, ReportingPeriod};

/// The five statement types the engine ties out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
    RentRoll,
    MortgageStatement,
}

impl StatementType {
    pub const ALL: [StatementType; 5] = [
        StatementType::BalanceSheet,
        StatementType::IncomeStatement,
        StatementType::CashFlow,
        StatementType::RentRoll,
        StatementType::MortgageStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::BalanceSheet => "balance_sheet",
            StatementType::IncomeStatement => "income_statement",
            StatementType::CashFlow => "cash_flow",
            StatementType::RentRoll => "rent_roll",
            StatementType::MortgageStatement => "mortgage_statement",
        }
    }

    pub fn parse(s: &str) -> Option<StatementType> {
        StatementType::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Flow statements cover a window; the rest are point-in-time.
    pub fn is_flow(&self) -> bool {
        matches!(self, StatementType::IncomeStatement | StatementType::CashFlow)
    }
}

impl std::fmt::Display for StatementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared reporting cadence of a flow statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Monthly,
    Quarterly,
    Annual,
    Rolling,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::Annual => "annual",
            PeriodType::Rolling => "rolling",
        }
    }

    pub fn parse(s: &str) -> Option<PeriodType> {
        match s {
            "monthly" => Some(PeriodType::Monthly),
            "quarterly" => Some(PeriodType::Quarterly),
            "annual" => Some(PeriodType::Annual),
            "rolling" => Some(PeriodType::Rolling),
            _ => None,
        }
    }
}

/// One extracted statement line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub account_code: String,
    pub account_name: String,
    pub amount_cents: Cents,
}

impl LineItem {
    pub fn new(code: &str, name: &str, amount_cents: Cents) -> Self {
        Self {
            account_code: code.to_string(),
            account_name: name.to_string(),
            amount_cents,
        }
    }
}

/// One extracted statement for a (property, period, type).
///
/// Produced upstream by the extraction pipeline; the engine never
/// mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementRecord {
    pub id: Uuid,
    pub property_id: Uuid,
    pub period: PeriodKey,
    pub statement_type: StatementType,
    /// Declared cadence, if the source document stated one.
    pub period_type: Option<PeriodType>,
    /// Declared comparison window, if the source document stated one.
    pub window_begin: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub lines: Vec<LineItem>,
    /// Type-specific header fields passed through from extraction.
    pub headers: BTreeMap<String, String>,
}

impl StatementRecord {
    pub fn line(&self, account_code: &str) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.account_code == account_code)
    }

    pub fn amount(&self, account_code: &str) -> Option<Cents> {
        self.line(account_code).map(|l| l.amount_cents)
    }

    /// Sum of all line amounts whose code starts with `prefix`,
    /// excluding subtotal lines (codes ending in `999` or `99`).
    pub fn sum_prefix(&self, prefix: &str) -> Cents {
        self.lines
            .iter()
            .filter(|l| l.account_code.starts_with(prefix) && !is_subtotal_code(&l.account_code))
            .map(|l| l.amount_cents)
            .sum()
    }

    /// All detail (non-subtotal) amounts, for statistical screens.
    pub fn detail_amounts(&self) -> Vec<Cents> {
        self.lines
            .iter()
            .filter(|l| !is_subtotal_code(&l.account_code))
            .map(|l| l.amount_cents)
            .collect()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Stable reference string for result payloads, e.g.
    /// `balance_sheet/2025-07`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.statement_type, self.period.label())
    }
}

/// Subtotal codes never participate in prefix sums or digit screens.
/// Covers `1999`/`2999`/`3999`/`4999`/`5999` totals and `9999` net income.
pub fn is_subtotal_code(code: &str) -> bool {
    code.ends_with("999")
}

/// All loaded statements for a run: the subject period plus the
/// trailing periods delta- and anchor-rules need.
#[derive(Debug, Clone)]
pub struct StatementBundle {
    pub property: Property,
    pub period: ReportingPeriod,
    /// Statements for the subject period, one per type at most.
    current: Vec<StatementRecord>,
    /// Statements for earlier periods, newest first.
    prior: Vec<StatementRecord>,
}

impl StatementBundle {
    pub fn new(
        property: Property,
        period: ReportingPeriod,
        mut statements: Vec<StatementRecord>,
    ) -> Self {
        let key = period.key();
        statements.sort_by(|a, b| b.period.cmp(&a.period));
        let (current, prior): (Vec<_>, Vec<_>) =
            statements.into_iter().partition(|s| s.period == key);
        Self { property, period, current, prior }
    }

    /// The subject-period statement of the given type, if extracted.
    pub fn current(&self, statement_type: StatementType) -> Option<&StatementRecord> {
        self.current.iter().find(|s| s.statement_type == statement_type)
    }

    /// Prior-period statements of a type, newest first.
    pub fn priors(&self, statement_type: StatementType) -> impl Iterator<Item = &StatementRecord> {
        self.prior.iter().filter(move |s| s.statement_type == statement_type)
    }

    /// The statement of `statement_type` for the immediately previous
    /// calendar month, if present.
    pub fn previous(&self, statement_type: StatementType) -> Option<&StatementRecord> {
        let prev = self.period.key().prev();
        self.priors(statement_type).find(|s| s.period == prev)
    }

    /// Statement of a type at a specific prior period.
    pub fn at(&self, statement_type: StatementType, period: PeriodKey) -> Option<&StatementRecord> {
        if period == self.period.key() {
            return self.current(statement_type);
        }
        self.priors(statement_type).find(|s| s.period == period)
    }

    /// Sum an account over the fiscal year to date (January through the
    /// subject month), counting only months where the statement exists.
    pub fn ytd_sum(&self, statement_type: StatementType, account_code: &str) -> Option<Cents> {
        let mut key = self.period.fiscal_year_start();
        let end = self.period.key();
        let mut total: Cents = 0;
        let mut seen = false;
        loop {
            if let Some(stmt) = self.at(statement_type, key) {
                if let Some(v) = stmt.amount(account_code) {
                    total += v;
                    seen = true;
                }
            }
            if key == end {
                break;
            }
            key = key.next();
        }
        if seen { Some(total) } else { None }
    }

    pub fn statement_count(&self) -> usize {
        self.current.len() + self.prior.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts;

    fn record(period: PeriodKey, st: StatementType, lines: Vec<LineItem>) -> StatementRecord {
        StatementRecord {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            period,
            statement_type: st,
            period_type: None,
            window_begin: None,
            window_end: None,
            lines,
            headers: BTreeMap::new(),
        }
    }

    fn bundle(statements: Vec<StatementRecord>) -> StatementBundle {
        let property = Property {
            id: Uuid::new_v4(),
            code: "TEST-01".into(),
            name: "Test".into(),
        };
        let period = ReportingPeriod::new(property.id, 2025, 7).unwrap();
        StatementBundle::new(property, period, statements)
    }

    #[test]
    fn lookup_by_code_and_prefix() {
        let rec = record(
            PeriodKey::new(2025, 7),
            StatementType::IncomeStatement,
            vec![
                LineItem::new(accounts::RENTAL_INCOME, "Rental income", 100_000_00),
                LineItem::new(accounts::PARKING_INCOME, "Parking", 5_000_00),
                LineItem::new(accounts::TOTAL_REVENUE, "Total revenue", 105_000_00),
            ],
        );
        assert_eq!(rec.amount(accounts::RENTAL_INCOME), Some(100_000_00));
        assert_eq!(rec.amount("0000"), None);
        // Subtotal excluded from the prefix sum.
        assert_eq!(rec.sum_prefix("4"), 105_000_00);
    }

    #[test]
    fn bundle_partitions_current_and_prior() {
        let current = record(PeriodKey::new(2025, 7), StatementType::BalanceSheet, vec![]);
        let prior = record(PeriodKey::new(2025, 6), StatementType::BalanceSheet, vec![]);
        let older = record(PeriodKey::new(2025, 5), StatementType::BalanceSheet, vec![]);
        let b = bundle(vec![older.clone(), current.clone(), prior.clone()]);

        assert_eq!(b.current(StatementType::BalanceSheet).map(|s| s.period), Some(current.period));
        assert_eq!(b.previous(StatementType::BalanceSheet).map(|s| s.period), Some(prior.period));
        let priors: Vec<PeriodKey> = b.priors(StatementType::BalanceSheet).map(|s| s.period).collect();
        assert_eq!(priors, vec![prior.period, older.period]);
        assert!(b.current(StatementType::CashFlow).is_none());
    }

    #[test]
    fn ytd_sum_spans_fiscal_year() {
        let mut stmts = Vec::new();
        for month in 1..=7 {
            stmts.push(record(
                PeriodKey::new(2025, month),
                StatementType::IncomeStatement,
                vec![LineItem::new(accounts::NET_INCOME, "Net income", 10_000_00)],
            ));
        }
        let b = bundle(stmts);
        assert_eq!(
            b.ytd_sum(StatementType::IncomeStatement, accounts::NET_INCOME),
            Some(70_000_00)
        );
        assert_eq!(b.ytd_sum(StatementType::IncomeStatement, "0000"), None);
    }
}
