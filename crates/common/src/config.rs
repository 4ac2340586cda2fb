//! Application configuration.

use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (status cache + job queue).
    pub redis: RedisConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Retry/backoff configuration for failed sends.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Retention sweep configuration.
    #[serde(default)]
    pub cleanup: CleanupSettings,
    /// Telegram sender configuration (channel disabled when absent).
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    /// Email sender configuration (channel disabled when absent).
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
}

/// Scheduler tick configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between claim-and-publish ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Maximum rows claimed per tick.
    #[serde(default = "default_query_limit")]
    pub query_limit: u64,
}

/// Retry configuration for failed sends.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of delivery retries before a notification stays failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Base delay of the exponential backoff, in seconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    /// Ceiling for the computed backoff, in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

/// Retention sweep configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupSettings {
    /// Terminal rows older than this many days are deleted.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

/// Telegram Bot API sender configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
}

/// SMTP sender configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// From address for outgoing mail.
    pub from: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_tick_interval() -> u64 {
    5
}

const fn default_query_limit() -> u64 {
    50
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_base_delay() -> u64 {
    300
}

const fn default_max_delay() -> u64 {
    86_400
}

const fn default_retention_days() -> i64 {
    30
}

const fn default_smtp_port() -> u16 {
    587
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            query_limit: default_query_limit(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
        }
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `NOTIFIER_ENV`)
    /// 3. Environment variables with `NOTIFIER` prefix
    pub fn load() -> AppResult<Self> {
        let env = std::env::var("NOTIFIER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NOTIFIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("NOTIFIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configured bounds; startup fails fast on violations.
    pub fn validate(&self) -> AppResult<()> {
        if self.database.max_connections == 0 {
            return Err(AppError::Validation(
                "database.max_connections must be >= 1".to_string(),
            ));
        }
        if self.scheduler.query_limit == 0 || self.scheduler.query_limit > 100 {
            return Err(AppError::Validation(
                "scheduler.query_limit must be within 1..=100".to_string(),
            ));
        }
        if self.scheduler.tick_interval_secs == 0 || self.scheduler.tick_interval_secs > 60 {
            return Err(AppError::Validation(
                "scheduler.tick_interval_secs must be within 1..=60".to_string(),
            ));
        }
        if !(0..=10).contains(&self.retry.max_retries) {
            return Err(AppError::Validation(
                "retry.max_retries must be within 0..=10".to_string(),
            ));
        }
        if self.retry.base_delay_secs == 0 || self.retry.base_delay_secs > 3600 {
            return Err(AppError::Validation(
                "retry.base_delay_secs must be within 1..=3600".to_string(),
            ));
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(AppError::Validation(
                "retry.max_delay_secs must be >= retry.base_delay_secs".to_string(),
            ));
        }
        if self.cleanup.retention_days < 1 {
            return Err(AppError::Validation(
                "cleanup.retention_days must be >= 1".to_string(),
            ));
        }
        if let Some(email) = &self.email {
            if email.smtp_host.is_empty() || email.from.is_empty() {
                return Err(AppError::Validation(
                    "email.smtp_host and email.from are required when email is configured"
                        .to_string(),
                ));
            }
        }
        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.is_empty() {
                return Err(AppError::Validation(
                    "telegram.bot_token is required when telegram is configured".to_string(),
                ));
            }
        }
        Ok(())
    }
}
