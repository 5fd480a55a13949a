//! audit-worker: evaluate the reconciliation catalog from the command
//! line, for one property-period or a full sweep.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tieout_core::config::{load_dotenv, Config};
use tieout_core::{Outcome, PeriodKey, Property};
use tieout_notify::Dispatcher;
use tieout_rules::engine::{Engine, RunOptions, RunOutput};
use tieout_rules::fixtures::{standard_covenants, Fixture};
use tieout_storage::{MemStore, PgStore, Store};

#[derive(Parser, Debug)]
#[command(name = "audit-worker", about = "Cross-document reconciliation runner")]
struct Cli {
    /// Property code to reconcile (e.g. MAPLE-01).
    #[arg(long)]
    property: Option<String>,

    /// Reporting period as YYYY-MM. Defaults to the latest period with
    /// extracted statements.
    #[arg(long)]
    period: Option<String>,

    /// Reconcile every property instead of one.
    #[arg(long)]
    all: bool,

    /// Evaluate the built-in demo history in memory; nothing external
    /// is touched.
    #[arg(long)]
    dry_run: bool,

    /// Postgres connection string; falls back to the PG_* environment.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

fn parse_period(s: &str) -> anyhow::Result<PeriodKey> {
    let (year, month) = s
        .split_once('-')
        .with_context(|| format!("period must be YYYY-MM, got {s:?}"))?;
    let year: i32 = year.parse().with_context(|| format!("bad year in {s:?}"))?;
    let month: u32 = month.parse().with_context(|| format!("bad month in {s:?}"))?;
    if !(1..=12).contains(&month) {
        bail!("month out of range in {s:?}");
    }
    Ok(PeriodKey::new(year, month))
}

fn report(property: &Property, output: &RunOutput) {
    let run = &output.run;
    tracing::info!(
        property = %property.code,
        period = %run.period,
        status = run.status.as_str(),
        "run {} finished: {} pass, {} warning, {} critical, {} info, {} skip, {} error",
        run.id,
        run.counts.pass,
        run.counts.warning,
        run.counts.critical,
        run.counts.info,
        run.counts.skip,
        run.counts.error,
    );
    for result in &output.results {
        if matches!(result.outcome, Outcome::Pass | Outcome::Skip) {
            continue;
        }
        tracing::info!(
            rule = %result.rule_code,
            category = %result.category,
            outcome = %result.outcome,
            "{}",
            result.explanation
        );
    }
    for (code, event) in &output.escalations {
        tracing::info!(rule = %code, "escalation: {event:?}");
    }
}

async fn run_for_property(
    engine: &Engine,
    store: &dyn Store,
    property: &Property,
    period: Option<PeriodKey>,
    options: &RunOptions,
) -> anyhow::Result<()> {
    let period = match period {
        Some(p) => p,
        None => store
            .statement_periods(property.id)
            .await?
            .into_iter()
            .max()
            .with_context(|| format!("no statements extracted for {}", property.code))?,
    };
    let output = engine.run(property.id, period, options).await?;
    report(property, &output);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let period = cli.period.as_deref().map(parse_period).transpose()?;
    let options = RunOptions { lookback_months: config.engine.lookback_months };

    if cli.dry_run {
        let key = period.unwrap_or(PeriodKey::new(2025, 7));
        let fixture = Fixture::new(key.year, key.month, options.lookback_months.min(12));
        let store = Arc::new(MemStore::new());
        store.insert_property(fixture.property().clone());
        for stmt in fixture.statements() {
            store.insert_statement(stmt.clone());
        }
        for covenant in standard_covenants(fixture.property().id) {
            store.insert_covenant(covenant);
        }
        for link in fixture.escrow_links() {
            store.insert_escrow_link(link.clone());
        }

        let property = fixture.property().clone();
        let engine = Engine::new(store.clone(), Dispatcher::empty());
        let output = engine.run(property.id, key, &options).await?;
        report(&property, &output);
        return Ok(());
    }

    let url = cli
        .database_url
        .unwrap_or_else(|| config.postgres.connection_string());
    let store: Arc<dyn Store> =
        Arc::new(PgStore::connect(&url, config.postgres.max_connections).await?);

    let dispatcher = Dispatcher::from_config(&config.alerting)?;
    tracing::info!(channels = dispatcher.channel_count(), "alert channels configured");
    let engine = Arc::new(Engine::new(store.clone(), dispatcher));

    if cli.all {
        let properties = store.properties().await?;
        if properties.is_empty() {
            bail!("no properties in the database");
        }
        let total = properties.len();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            config.engine.property_concurrency.max(1) as usize,
        ));
        let mut tasks = tokio::task::JoinSet::new();
        for property in properties {
            let engine = engine.clone();
            let store = store.clone();
            let semaphore = semaphore.clone();
            let options = options.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    run_for_property(&engine, store.as_ref(), &property, period, &options).await;
                (property.code, outcome)
            });
        }

        let mut failures = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((code, Err(err))) => {
                    failures += 1;
                    tracing::error!(property = %code, error = %err, "run failed");
                }
                Err(err) => {
                    failures += 1;
                    tracing::error!(error = %err, "run task panicked");
                }
            }
        }
        if failures > 0 {
            bail!("{failures} of {total} property runs failed");
        }
        return Ok(());
    }

    let code = cli
        .property
        .context("pass --property <CODE>, --all, or --dry-run")?;
    let property = store
        .properties()
        .await?
        .into_iter()
        .find(|p| p.code == code)
        .with_context(|| format!("no property with code {code:?}"))?;

    run_for_property(&engine, store.as_ref(), &property, period, &options).await
}
