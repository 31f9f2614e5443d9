//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// SMS delivery configuration.
    #[serde(default)]
    pub sms: SmsConfig,
    /// One-time code policy.
    #[serde(default)]
    pub otp: OtpConfig,
    /// Voter session signing.
    pub session: SessionConfig,
    /// Administrator access.
    pub admin: AdminConfig,
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

/// SMS gateway configuration.
///
/// Leaving `api_key` unset runs delivery in simulated mode.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// Gateway API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Sender ID shown on the handset.
    #[serde(default = "default_sender_id")]
    pub sender_id: String,
    /// Gateway endpoint.
    #[serde(default = "default_sms_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_sms_timeout")]
    pub timeout_secs: u64,
}

/// One-time code issuance policy.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Minimum spacing between two issuances for one student.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
    /// Maximum issuances per rolling window.
    #[serde(default = "default_hourly_limit")]
    pub hourly_limit: u64,
    /// Length of the rolling window.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    /// Lifetime of an issued code.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: i64,
    /// How long expired codes are kept before purging.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
    /// How often the purge task runs.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

/// Voter session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for session tokens.
    pub secret: String,
    /// Lifetime of a session token in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: i64,
}

/// Administrator access configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Bearer token accepted on admin endpoints.
    pub token: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            sender_id: default_sender_id(),
            endpoint: default_sms_endpoint(),
            timeout_secs: default_sms_timeout(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            hourly_limit: default_hourly_limit(),
            window_secs: default_window_secs(),
            ttl_secs: default_ttl_secs(),
            retention_secs: default_retention_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_sender_id() -> String {
    "EVOTE".to_string()
}

fn default_sms_endpoint() -> String {
    "https://api.mnotify.com/api/sms/quick".to_string()
}

const fn default_sms_timeout() -> u64 {
    10
}

const fn default_cooldown_secs() -> i64 {
    120
}

const fn default_hourly_limit() -> u64 {
    3
}

const fn default_window_secs() -> i64 {
    3600
}

const fn default_ttl_secs() -> i64 {
    600
}

const fn default_retention_secs() -> i64 {
    86_400
}

const fn default_purge_interval_secs() -> u64 {
    3600
}

const fn default_session_ttl() -> i64 {
    1800
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `BALLOT_ENV`)
    /// 4. Environment variables with `BALLOT__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("BALLOT_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BALLOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BALLOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let raw = r#"
            [server]
            [database]
            url = "postgres://localhost/ballot"
            [session]
            secret = "s3cret"
            [admin]
            token = "admin-token"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.sms.api_key.is_none());
        assert_eq!(config.otp.cooldown_secs, 120);
        assert_eq!(config.otp.hourly_limit, 3);
        assert_eq!(config.otp.ttl_secs, 600);
        assert_eq!(config.session.ttl_secs, 1800);
    }
}
