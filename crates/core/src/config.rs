//! Process configuration from environment variables.
//!
//! This covers infrastructure settings only (database, worker,
//! alert delivery). Business thresholds and tolerances are data,
//! resolved per property through `ConfigValue` rows.

use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub engine: EngineConfig,
    pub alerting: AlertingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig::from_env(),
            engine: EngineConfig::from_env(),
            alerting: AlertingConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  postgres:  host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!(
            "  engine:    lookback_months={}, concurrency={}",
            self.engine.lookback_months,
            self.engine.property_concurrency
        );
        tracing::info!(
            "  alerting:  webhook={}, smtp={}",
            self.alerting.webhook_url.as_deref().unwrap_or("(none)"),
            self.alerting.smtp_host.as_deref().unwrap_or("(none)")
        );
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("PG_HOST", "localhost"),
            port: env_u16("PG_PORT", 5432),
            database: env_or("PG_DATABASE", "tieout"),
            username: env_opt("PG_USERNAME"),
            password: env_opt("PG_PASSWORD"),
            ssl_mode: env_or("PG_SSL_MODE", "prefer"),
            max_connections: env_u32("PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many trailing months of statements to load per run. The
    /// cash-anchor search and YTD sums never look further back.
    pub lookback_months: u32,
    /// How many properties may run concurrently in a sweep.
    pub property_concurrency: u32,
    /// Per-rule execution log cap.
    pub run_log_max_entries: u32,
}

impl EngineConfig {
    fn from_env() -> Self {
        Self {
            lookback_months: env_u32("ENGINE_LOOKBACK_MONTHS", 13),
            property_concurrency: env_u32("ENGINE_PROPERTY_CONCURRENCY", 4),
            run_log_max_entries: env_u32("ENGINE_RUN_LOG_MAX", 500),
        }
    }
}

// ── Alert delivery ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub webhook_url: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Vec<String>,
}

impl AlertingConfig {
    fn from_env() -> Self {
        Self {
            webhook_url: env_opt("ALERT_WEBHOOK_URL"),
            smtp_host: env_opt("ALERT_SMTP_HOST"),
            smtp_port: env_u16("ALERT_SMTP_PORT", 587),
            smtp_username: env_opt("ALERT_SMTP_USERNAME"),
            smtp_password: env_opt("ALERT_SMTP_PASSWORD"),
            email_from: env_opt("ALERT_EMAIL_FROM"),
            email_to: env_opt("ALERT_EMAIL_TO")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn webhook_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.email_from.is_some() && !self.email_to.is_empty()
    }
}
