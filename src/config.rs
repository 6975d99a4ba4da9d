use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::models::notification::KpiTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_max_connections: u32,

    // Slack configuration
    pub slack_bot_token: String,
    pub slack_api_base_url: String,
    pub slack_mock_mode: bool,
    pub slack_retry_after_default_secs: f64,
    pub slack_max_retries: u32,
    pub slack_max_rate_limit_retries: u32,
    pub slack_api_timeout_secs: u64,

    // Notification rules
    pub notification_inactivity_days: i64,

    // Scheduler configuration
    pub api_base_url: String,
    pub scheduler_enabled: bool,
    pub scheduler_utc_offset_hours: i32,
    pub progress_check_hour: u32,
    pub kpi_check_weekday: Weekday,
    pub kpi_check_hour: u32,
    pub kpi_targets: Vec<KpiTarget>,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let kpi_check_weekday = env::var("KPI_CHECK_WEEKDAY")
            .unwrap_or_else(|_| "mon".to_string())
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("KPI_CHECK_WEEKDAY must be a weekday name"))?;

        let kpi_targets = match env::var("KPI_TARGETS") {
            Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_env("SERVER_PORT", "3000")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "opportunity_tracker=debug,tower_http=debug".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://opportunity_tracker.db?mode=rwc".to_string()),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "5")?,

            slack_bot_token: env::var("SLACK_BOT_TOKEN").unwrap_or_default(),
            slack_api_base_url: env::var("SLACK_API_BASE_URL")
                .unwrap_or_else(|_| "https://slack.com/api".to_string()),
            slack_mock_mode: parse_env("SLACK_MOCK_MODE", "false")?,
            slack_retry_after_default_secs: parse_env("SLACK_RETRY_AFTER_DEFAULT_SECS", "1.0")?,
            slack_max_retries: parse_env("SLACK_MAX_RETRIES", "3")?,
            slack_max_rate_limit_retries: parse_env("SLACK_MAX_RATE_LIMIT_RETRIES", "10")?,
            slack_api_timeout_secs: parse_env("SLACK_API_TIMEOUT_SECS", "30")?,

            notification_inactivity_days: parse_env("NOTIFICATION_INACTIVITY_DAYS", "3")?,

            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            scheduler_enabled: parse_env("SCHEDULER_ENABLED", "true")?,
            scheduler_utc_offset_hours: parse_env("SCHEDULER_UTC_OFFSET_HOURS", "9")?,
            progress_check_hour: parse_env("PROGRESS_CHECK_HOUR", "9")?,
            kpi_check_weekday,
            kpi_check_hour: parse_env("KPI_CHECK_HOUR", "9")?,
            kpi_targets,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "test".to_string(),
            log_level: "opportunity_tracker=debug".to_string(),
            log_format: "pretty".to_string(),
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            slack_bot_token: String::new(),
            slack_api_base_url: "https://slack.com/api".to_string(),
            slack_mock_mode: true,
            slack_retry_after_default_secs: 1.0,
            slack_max_retries: 3,
            slack_max_rate_limit_retries: 10,
            slack_api_timeout_secs: 30,
            notification_inactivity_days: 3,
            api_base_url: "http://127.0.0.1:3000".to_string(),
            scheduler_enabled: false,
            scheduler_utc_offset_hours: 9,
            progress_check_hour: 9,
            kpi_check_weekday: Weekday::Mon,
            kpi_check_hour: 9,
            kpi_targets: Vec::new(),
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
}
