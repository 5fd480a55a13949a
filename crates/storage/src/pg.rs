//! PostgreSQL store backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tieout_core::{
    AlertStatus, CommitteeAlert, ComparisonOperator, ConfigScope, ConfigValue, CovenantThreshold,
    CovenantType, EscrowDocumentLink, LineItem, Outcome, OutcomeCounts, PeriodKey, Property,
    ReconciliationRun, RuleCategory, RuleResult, RunStatus, StatementRecord, StatementType,
    PeriodType,
};

use crate::error::StoreError;
use crate::store::Store;

/// sqlx-backed store. Cheap to clone (pool handle).
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ── Row types ────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    code: String,
    name: String,
}

impl From<PropertyRow> for Property {
    fn from(r: PropertyRow) -> Self {
        Property { id: r.id, code: r.code, name: r.name }
    }
}

#[derive(sqlx::FromRow)]
struct StatementRow {
    id: Uuid,
    property_id: Uuid,
    year: i32,
    month: i32,
    statement_type: String,
    period_type: Option<String>,
    window_begin: Option<chrono::NaiveDate>,
    window_end: Option<chrono::NaiveDate>,
    headers: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    statement_id: Uuid,
    account_code: String,
    account_name: String,
    amount_cents: i64,
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    key: String,
    scope: String,
    scope_ref: Option<String>,
    value: f64,
}

#[derive(sqlx::FromRow)]
struct CovenantRow {
    id: Uuid,
    property_id: Uuid,
    covenant_type: String,
    threshold_value: f64,
    operator: String,
    effective_date: chrono::NaiveDate,
    expiration_date: Option<chrono::NaiveDate>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    property_id: Uuid,
    year: i32,
    month: i32,
    status: String,
    started_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pass_count: i32,
    warning_count: i32,
    critical_count: i32,
    info_count: i32,
    skip_count: i32,
    error_count: i32,
}

impl TryFrom<RunRow> for ReconciliationRun {
    type Error = StoreError;

    fn try_from(r: RunRow) -> Result<Self, StoreError> {
        Ok(ReconciliationRun {
            id: r.id,
            property_id: r.property_id,
            period: PeriodKey::new(r.year, r.month as u32),
            status: RunStatus::parse(&r.status)
                .ok_or_else(|| StoreError::unknown("run status", &r.status))?,
            started_at: r.started_at,
            completed_at: r.completed_at,
            counts: OutcomeCounts {
                pass: r.pass_count as u32,
                warning: r.warning_count as u32,
                critical: r.critical_count as u32,
                info: r.info_count as u32,
                skip: r.skip_count as u32,
                error: r.error_count as u32,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: Uuid,
    run_id: Uuid,
    rule_code: String,
    category: String,
    outcome: String,
    explanation: serde_json::Value,
    source_ref: Option<String>,
    target_ref: Option<String>,
    variance_cents: Option<i64>,
}

impl TryFrom<ResultRow> for RuleResult {
    type Error = StoreError;

    fn try_from(r: ResultRow) -> Result<Self, StoreError> {
        Ok(RuleResult {
            id: r.id,
            run_id: r.run_id,
            rule_code: r.rule_code,
            category: RuleCategory::parse(&r.category)
                .ok_or_else(|| StoreError::unknown("rule category", &r.category))?,
            outcome: Outcome::parse(&r.outcome)
                .ok_or_else(|| StoreError::unknown("outcome", &r.outcome))?,
            explanation: r.explanation,
            source_ref: r.source_ref,
            target_ref: r.target_ref,
            variance_cents: r.variance_cents,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    property_id: Uuid,
    rule_code: String,
    year: i32,
    month: i32,
    status: String,
    materiality_cents: i64,
    explanation: serde_json::Value,
    first_seen: chrono::DateTime<chrono::Utc>,
    last_seen: chrono::DateTime<chrono::Utc>,
    trigger_count: i32,
    snooze_until: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<AlertRow> for CommitteeAlert {
    type Error = StoreError;

    fn try_from(r: AlertRow) -> Result<Self, StoreError> {
        Ok(CommitteeAlert {
            id: r.id,
            property_id: r.property_id,
            rule_code: r.rule_code,
            period: PeriodKey::new(r.year, r.month as u32),
            status: AlertStatus::parse(&r.status)
                .ok_or_else(|| StoreError::unknown("alert status", &r.status))?,
            materiality_cents: r.materiality_cents,
            explanation: r.explanation,
            first_seen: r.first_seen,
            last_seen: r.last_seen,
            trigger_count: r.trigger_count as u32,
            snooze_until: r.snooze_until,
        })
    }
}

fn statement_from_rows(row: StatementRow, lines: Vec<LineItem>) -> Result<StatementRecord, StoreError> {
    let headers: BTreeMap<String, String> =
        serde_json::from_value(row.headers).unwrap_or_default();
    Ok(StatementRecord {
        id: row.id,
        property_id: row.property_id,
        period: PeriodKey::new(row.year, row.month as u32),
        statement_type: StatementType::parse(&row.statement_type)
            .ok_or_else(|| StoreError::unknown("statement type", &row.statement_type))?,
        period_type: match row.period_type.as_deref() {
            Some(raw) => Some(
                PeriodType::parse(raw)
                    .ok_or_else(|| StoreError::unknown("period type", raw))?,
            ),
            None => None,
        },
        window_begin: row.window_begin,
        window_end: row.window_end,
        lines,
        headers,
    })
}

// ── Store impl ───────────────────────────────────────────────────

#[async_trait]
impl Store for PgStore {
    async fn property(&self, id: Uuid) -> Result<Option<Property>, StoreError> {
        let row = sqlx::query_as::<_, PropertyRow>(
            "SELECT id, code, name FROM properties WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Property::from))
    }

    async fn properties(&self) -> Result<Vec<Property>, StoreError> {
        let rows = sqlx::query_as::<_, PropertyRow>(
            "SELECT id, code, name FROM properties ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Property::from).collect())
    }

    async fn statements_in_range(
        &self,
        property_id: Uuid,
        from: PeriodKey,
        to: PeriodKey,
    ) -> Result<Vec<StatementRecord>, StoreError> {
        let rows = sqlx::query_as::<_, StatementRow>(
            "SELECT id, property_id, year, month, statement_type, period_type,
                    window_begin, window_end, headers
             FROM statements
             WHERE property_id = $1
               AND (year, month) >= ($2, $3)
               AND (year, month) <= ($4, $5)
             ORDER BY year DESC, month DESC",
        )
        .bind(property_id)
        .bind(from.year)
        .bind(from.month as i32)
        .bind(to.year)
        .bind(to.month as i32)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, LineRow>(
            "SELECT statement_id, account_code, account_name, amount_cents
             FROM statement_lines
             WHERE statement_id = ANY($1)
             ORDER BY statement_id, line_no",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_stmt: BTreeMap<Uuid, Vec<LineItem>> = BTreeMap::new();
        for lr in line_rows {
            lines_by_stmt.entry(lr.statement_id).or_default().push(LineItem {
                account_code: lr.account_code,
                account_name: lr.account_name,
                amount_cents: lr.amount_cents,
            });
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_stmt.remove(&row.id).unwrap_or_default();
                statement_from_rows(row, lines)
            })
            .collect()
    }

    async fn statement_periods(&self, property_id: Uuid) -> Result<Vec<PeriodKey>, StoreError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT DISTINCT year, month FROM statements
             WHERE property_id = $1 ORDER BY year, month",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(y, m)| PeriodKey::new(y, m as u32)).collect())
    }

    async fn config_values(&self) -> Result<Vec<ConfigValue>, StoreError> {
        let rows = sqlx::query_as::<_, ConfigRow>(
            "SELECT key, scope, scope_ref, value FROM config_values",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                Ok(ConfigValue {
                    key: r.key,
                    scope: ConfigScope::parse(&r.scope)
                        .ok_or_else(|| StoreError::unknown("config scope", &r.scope))?,
                    scope_ref: r.scope_ref,
                    value: r.value,
                })
            })
            .collect()
    }

    async fn covenant_thresholds(
        &self,
        property_id: Uuid,
    ) -> Result<Vec<CovenantThreshold>, StoreError> {
        let rows = sqlx::query_as::<_, CovenantRow>(
            "SELECT id, property_id, covenant_type, threshold_value, operator,
                    effective_date, expiration_date, is_active
             FROM covenant_thresholds
             WHERE property_id = $1
             ORDER BY effective_date",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                Ok(CovenantThreshold {
                    id: r.id,
                    property_id: r.property_id,
                    covenant_type: CovenantType::parse(&r.covenant_type)
                        .ok_or_else(|| StoreError::unknown("covenant type", &r.covenant_type))?,
                    threshold_value: r.threshold_value,
                    operator: ComparisonOperator::parse(&r.operator)
                        .ok_or_else(|| StoreError::unknown("operator", &r.operator))?,
                    effective_date: r.effective_date,
                    expiration_date: r.expiration_date,
                    is_active: r.is_active,
                })
            })
            .collect()
    }

    async fn escrow_links(
        &self,
        statement_id: Uuid,
    ) -> Result<Vec<EscrowDocumentLink>, StoreError> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            "SELECT statement_id, account_code, document_ref
             FROM escrow_document_links WHERE statement_id = $1",
        )
        .bind(statement_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(statement_id, account_code, document_ref)| EscrowDocumentLink {
                statement_id,
                account_code,
                document_ref,
            })
            .collect())
    }

    async fn persist_run(
        &self,
        run: &ReconciliationRun,
        results: &[RuleResult],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reconciliation_runs
               (id, property_id, year, month, status, started_at, completed_at,
                pass_count, warning_count, critical_count, info_count, skip_count, error_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(run.id)
        .bind(run.property_id)
        .bind(run.period.year)
        .bind(run.period.month as i32)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.counts.pass as i32)
        .bind(run.counts.warning as i32)
        .bind(run.counts.critical as i32)
        .bind(run.counts.info as i32)
        .bind(run.counts.skip as i32)
        .bind(run.counts.error as i32)
        .execute(&mut *tx)
        .await?;

        for result in results {
            sqlx::query(
                "INSERT INTO rule_results
                   (id, run_id, rule_code, category, outcome, explanation,
                    source_ref, target_ref, variance_cents)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(result.id)
            .bind(result.run_id)
            .bind(&result.rule_code)
            .bind(result.category.as_str())
            .bind(result.outcome.as_str())
            .bind(&result.explanation)
            .bind(&result.source_ref)
            .bind(&result.target_ref)
            .bind(result.variance_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_run(
        &self,
        run_id: Uuid,
    ) -> Result<Option<(ReconciliationRun, Vec<RuleResult>)>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            "SELECT id, property_id, year, month, status, started_at, completed_at,
                    pass_count, warning_count, critical_count, info_count, skip_count, error_count
             FROM reconciliation_runs WHERE id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let run = ReconciliationRun::try_from(row)?;

        let result_rows = sqlx::query_as::<_, ResultRow>(
            "SELECT id, run_id, rule_code, category, outcome, explanation,
                    source_ref, target_ref, variance_cents
             FROM rule_results WHERE run_id = $1
             ORDER BY rule_code",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        let results = result_rows
            .into_iter()
            .map(RuleResult::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some((run, results)))
    }

    async fn list_runs(
        &self,
        property_id: Uuid,
        period: Option<PeriodKey>,
    ) -> Result<Vec<ReconciliationRun>, StoreError> {
        let rows = sqlx::query_as::<_, RunRow>(
            "SELECT id, property_id, year, month, status, started_at, completed_at,
                    pass_count, warning_count, critical_count, info_count, skip_count, error_count
             FROM reconciliation_runs
             WHERE property_id = $1
               AND ($2::int IS NULL OR (year = $2 AND month = $3))
             ORDER BY started_at DESC
             LIMIT 100",
        )
        .bind(property_id)
        .bind(period.map(|p| p.year))
        .bind(period.map(|p| p.month as i32))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ReconciliationRun::try_from).collect()
    }

    async fn find_alert(
        &self,
        property_id: Uuid,
        rule_code: &str,
        period: PeriodKey,
    ) -> Result<Option<CommitteeAlert>, StoreError> {
        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT id, property_id, rule_code, year, month, status, materiality_cents,
                    explanation, first_seen, last_seen, trigger_count, snooze_until
             FROM committee_alerts
             WHERE property_id = $1 AND rule_code = $2 AND year = $3 AND month = $4",
        )
        .bind(property_id)
        .bind(rule_code)
        .bind(period.year)
        .bind(period.month as i32)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CommitteeAlert::try_from).transpose()
    }

    async fn upsert_alert(&self, alert: &CommitteeAlert) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO committee_alerts
               (id, property_id, rule_code, year, month, status, materiality_cents,
                explanation, first_seen, last_seen, trigger_count, snooze_until)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (property_id, rule_code, year, month) DO UPDATE SET
               id = EXCLUDED.id,
               first_seen = EXCLUDED.first_seen,
               status = EXCLUDED.status,
               materiality_cents = EXCLUDED.materiality_cents,
               explanation = EXCLUDED.explanation,
               last_seen = EXCLUDED.last_seen,
               trigger_count = EXCLUDED.trigger_count,
               snooze_until = EXCLUDED.snooze_until",
        )
        .bind(alert.id)
        .bind(alert.property_id)
        .bind(&alert.rule_code)
        .bind(alert.period.year)
        .bind(alert.period.month as i32)
        .bind(alert.status.as_str())
        .bind(alert.materiality_cents)
        .bind(&alert.explanation)
        .bind(alert.first_seen)
        .bind(alert.last_seen)
        .bind(alert.trigger_count as i32)
        .bind(alert.snooze_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_alert_status(
        &self,
        alert_id: Uuid,
        status: AlertStatus,
        snooze_until: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE committee_alerts SET status = $2, snooze_until = $3 WHERE id = $1",
        )
        .bind(alert_id)
        .bind(status.as_str())
        .bind(snooze_until)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::unknown("alert id", &alert_id.to_string()));
        }
        Ok(())
    }

    async fn open_alerts(
        &self,
        property_id: Option<Uuid>,
    ) -> Result<Vec<CommitteeAlert>, StoreError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT id, property_id, rule_code, year, month, status, materiality_cents,
                    explanation, first_seen, last_seen, trigger_count, snooze_until
             FROM committee_alerts
             WHERE ($1::uuid IS NULL OR property_id = $1)
               AND (status = 'open'
                    OR (status = 'suppressed' AND snooze_until IS NOT NULL AND snooze_until <= now()))
             ORDER BY last_seen DESC",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CommitteeAlert::try_from).collect()
    }
}
