//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`TELEGRAM__BOT_TOKEN`, `SESSION__PENDING_TTL_MINUTES`).
//!
//! See [`TelegramConfig`](ledgerbot_integration::TelegramConfig) and
//! [`StorageConfig`](ledgerbot_integration::StorageConfig) for the client
//! settings.

use ledgerbot_conversation::{DEFAULT_MAX_PASSWORD_ATTEMPTS, DEFAULT_PENDING_TTL_MINUTES};
use ledgerbot_integration::{StorageConfig, TelegramConfig};
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    pub telegram: TelegramConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Chat session rules.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of an unfinished login, in minutes.
    #[serde(default = "default_pending_ttl_minutes")]
    pub pending_ttl_minutes: i64,

    /// Password attempts before a login is dropped.
    #[serde(default = "default_max_password_attempts")]
    pub max_password_attempts: u32,

    /// Interval between sweeps of expired logins, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_pending_ttl_minutes() -> i64 {
    DEFAULT_PENDING_TTL_MINUTES
}

fn default_max_password_attempts() -> u32 {
    DEFAULT_MAX_PASSWORD_ATTEMPTS
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pending_ttl_minutes: default_pending_ttl_minutes(),
            max_password_attempts: default_max_password_attempts(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Listener and outbound HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Timeout for calls to the messaging platform and blob store.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Compare-and-swap attempts per balance update.
    #[serde(default = "default_balance_retry_limit")]
    pub balance_retry_limit: u32,
}

fn default_balance_retry_limit() -> u32 {
    5
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            balance_retry_limit: default_balance_retry_limit(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.pending_ttl_minutes, 10);
        assert_eq!(config.max_password_attempts, 4);
        assert_eq!(config.cleanup_interval_seconds, 300);
    }

    #[test]
    fn http_and_ledger_defaults() {
        assert_eq!(HttpConfig::default().timeout(), Duration::from_secs(15));
        assert_eq!(LedgerConfig::default().balance_retry_limit, 5);
    }

    #[test]
    fn nested_keys_deserialize() {
        let config: ServerConfig = config::Config::builder()
            .set_override("database_url", "postgres://localhost/ledger")
            .and_then(|b| b.set_override("telegram.bot_token", "123:abc"))
            .and_then(|b| b.set_override("storage.base_url", "https://store.test"))
            .and_then(|b| b.set_override("storage.service_key", "key"))
            .and_then(|b| b.set_override("session.pending_ttl_minutes", 3))
            .and_then(|b| b.build())
            .and_then(config::Config::try_deserialize)
            .expect("config");
        assert_eq!(config.session.pending_ttl_minutes, 3);
        assert_eq!(config.storage.bucket, "receipts");
        assert_eq!(config.http.bind_addr, "0.0.0.0:8080");
        assert!(config.telegram.webhook_secret.is_none());
    }
}
