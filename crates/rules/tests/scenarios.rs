//! End-to-end runs over the in-memory store, exercising the canonical
//! reconciliation scenarios: a clean mortgage tie, a security-deposit
//! shortfall, a DSCR covenant breach, and an annual-labelled statement
//! that is really monthly.

use std::sync::Arc;

use tieout_core::accounts as a;
use tieout_core::{Outcome, PeriodKey, PeriodType, RuleResult, StatementType};
use tieout_notify::Dispatcher;
use tieout_rules::engine::{Engine, RunOptions, RunOutput};
use tieout_rules::fixtures::{standard_covenants, Fixture};
use tieout_storage::{MemStore, Store};

const PERIOD: PeriodKey = PeriodKey { year: 2025, month: 7 };

fn store_for(fx: &Fixture) -> Arc<MemStore> {
    let store = Arc::new(MemStore::new());
    store.insert_property(fx.property().clone());
    for stmt in fx.statements() {
        store.insert_statement(stmt.clone());
    }
    for covenant in standard_covenants(fx.property().id) {
        store.insert_covenant(covenant);
    }
    for link in fx.escrow_links() {
        store.insert_escrow_link(link.clone());
    }
    store
}

async fn run(fx: &Fixture) -> (Arc<MemStore>, RunOutput) {
    let store = store_for(fx);
    let engine = Engine::new(store.clone(), Dispatcher::empty());
    let output = engine
        .run(fx.property().id, PERIOD, &RunOptions::default())
        .await
        .expect("run should complete");
    (store, output)
}

fn result<'a>(output: &'a RunOutput, code: &str) -> &'a RuleResult {
    output
        .results
        .iter()
        .find(|r| r.rule_code == code)
        .unwrap_or_else(|| panic!("no result for {code}"))
}

// ── Scenario: mortgage principal ties exactly ───────────────────────

#[tokio::test]
async fn matching_mortgage_principal_passes_with_zero_variance() {
    let fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    let ledger = fx
        .amount(StatementType::BalanceSheet, PERIOD, a::MORTGAGE_PAYABLE)
        .unwrap();
    let servicer = fx
        .amount(StatementType::MortgageStatement, PERIOD, a::MS_PRINCIPAL_BALANCE)
        .unwrap();
    assert_eq!(ledger, servicer, "fixture must agree with itself");

    let (store, output) = run(&fx).await;
    let tie = result(&output, "XD-101");
    assert_eq!(tie.outcome, Outcome::Pass);
    assert_eq!(tie.variance_cents, Some(0));
    assert_eq!(store.alert_count(), 0);
}

// ── Scenario: security-deposit shortfall ────────────────────────────

#[tokio::test]
async fn deposit_shortfall_goes_critical_with_the_shortfall_as_variance() {
    let mut fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    fx.set(StatementType::RentRoll, PERIOD, a::RR_TOTAL_DEPOSITS, 45_000_00);
    fx.set(StatementType::BalanceSheet, PERIOD, a::SECURITY_DEPOSITS_HELD, 40_000_00);

    let (_store, output) = run(&fx).await;
    let floor = result(&output, "RB-001");
    assert_eq!(floor.outcome, Outcome::Critical);
    assert_eq!(floor.variance_cents, Some(5_000_00));
}

#[tokio::test]
async fn deposit_overage_is_not_a_finding() {
    let mut fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    // Holding more than the roll says is owed is fine.
    fx.set(StatementType::BalanceSheet, PERIOD, a::SECURITY_DEPOSITS_HELD, 200_000_00);

    let (_store, output) = run(&fx).await;
    assert_eq!(result(&output, "RB-001").outcome, Outcome::Pass);
}

// ── Scenario: DSCR covenant ─────────────────────────────────────────

#[tokio::test]
async fn dscr_breach_is_critical_and_always_escalates() {
    let mut fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    // Raise the monthly interest portion so annual debt service
    // overwhelms NOI: DSCR lands near 0.93 against the 1.25 floor.
    fx.set(
        StatementType::MortgageStatement,
        PERIOD,
        a::MS_INTEREST_PORTION,
        150_000_00,
    );

    let (store, output) = run(&fx).await;
    assert_eq!(result(&output, "CV-001").outcome, Outcome::Critical);

    // Covenant breaches bypass the materiality gate.
    let alert = store
        .find_alert(fx.property().id, "CV-001", PERIOD)
        .await
        .unwrap()
        .expect("covenant breach must open an alert");
    assert_eq!(alert.trigger_count, 1);
}

#[tokio::test]
async fn comfortable_dscr_passes_the_covenant() {
    let fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    let (store, output) = run(&fx).await;
    assert_eq!(result(&output, "CV-001").outcome, Outcome::Pass);
    assert!(store
        .find_alert(fx.property().id, "CV-001", PERIOD)
        .await
        .unwrap()
        .is_none());
}

// ── Scenario: annual label over monthly figures ─────────────────────

#[tokio::test]
async fn annual_labelled_monthly_statement_is_annualized_not_trusted() {
    let mut fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    fx.declare_period_type(StatementType::IncomeStatement, PeriodType::Annual);
    fx.set_header(StatementType::IncomeStatement, "month_columns", "12");

    let (_store, output) = run(&fx).await;
    // Had the annual label been trusted, monthly NOI would be divided
    // by nothing and every NOI-dependent check would collapse.
    assert_eq!(result(&output, "CV-001").outcome, Outcome::Pass, "DSCR");
    assert_eq!(result(&output, "AN-003").outcome, Outcome::Pass, "DSCR band");
    assert_eq!(result(&output, "AN-001").outcome, Outcome::Pass, "NOI floor");
    assert_eq!(output.run.counts.critical, 0);
}

// ── Re-running is append-only ───────────────────────────────────────

#[tokio::test]
async fn each_run_appends_history() {
    let fx = Fixture::new(PERIOD.year, PERIOD.month, 6);
    let store = store_for(&fx);
    let engine = Engine::new(store.clone(), Dispatcher::empty());

    let first = engine
        .run(fx.property().id, PERIOD, &RunOptions::default())
        .await
        .unwrap();
    let second = engine
        .run(fx.property().id, PERIOD, &RunOptions::default())
        .await
        .unwrap();

    assert_ne!(first.run.id, second.run.id);
    assert_eq!(store.run_count(), 2);

    let fetched = store.fetch_run(first.run.id).await.unwrap().unwrap();
    assert_eq!(fetched.0.counts, first.run.counts);
    assert_eq!(fetched.1.len(), first.results.len());
}
