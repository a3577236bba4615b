//! Service configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the token signing secret are redacted in Debug output.

use base64::{engine::general_purpose, Engine as _};
use common::secret::SecretBox;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default gRPC bind address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:9090";

/// Default session token lifetime (24 hours).
pub const DEFAULT_TOKEN_MAX_AGE_SECONDS: u64 = 86_400;

/// Default deadline for a single credential store call.
pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;

/// Default deadline for a whole RPC.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default Postgres pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Default graceful shutdown drain period.
pub const DEFAULT_DRAIN_SECONDS: u64 = 5;

/// Default bcrypt cost factor (~200ms per hash).
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum accepted bcrypt cost.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum accepted bcrypt cost.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Minimum signing secret length for HMAC-SHA256 (32 bytes).
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

/// Deployment mode. Selects the log format and default verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvMode {
    /// Developer machine: text logs, debug level.
    Local,
    /// Shared development environment: JSON logs, debug level.
    Dev,
    /// Production: text logs, warn level.
    #[default]
    Prod,
}

impl FromStr for EnvMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(EnvMode::Local),
            "dev" => Ok(EnvMode::Dev),
            "prod" => Ok(EnvMode::Prod),
            other => Err(ConfigError::InvalidEnvMode(format!(
                "ENV_MODE must be one of local, dev, prod, got '{}'",
                other
            ))),
        }
    }
}

/// Service configuration.
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// gRPC server bind address (default: "0.0.0.0:9090").
    pub grpc_bind_address: String,

    /// HMAC key used to sign session tokens.
    pub signing_secret: SecretBox<Vec<u8>>,

    /// Session token lifetime (default: 24h).
    pub token_max_age: Duration,

    /// Deadline applied to every credential store call.
    pub store_timeout: Duration,

    /// Deadline applied to every inbound RPC.
    pub request_timeout: Duration,

    /// Bcrypt cost used when hashing new account passwords.
    pub bcrypt_cost: u32,

    /// Postgres pool size.
    pub db_max_connections: u32,

    /// Deployment mode.
    pub env_mode: EnvMode,

    /// Time to wait after the server stops before closing the pool.
    pub drain_period: Duration,

    /// Prometheus exporter address. `None` disables the exporter.
    pub metrics_bind_address: Option<String>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("grpc_bind_address", &self.grpc_bind_address)
            .field("signing_secret", &"[REDACTED]")
            .field("token_max_age", &self.token_max_age)
            .field("store_timeout", &self.store_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("db_max_connections", &self.db_max_connections)
            .field("env_mode", &self.env_mode)
            .field("drain_period", &self.drain_period)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing secret: {0}")]
    InvalidSigningSecret(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid pool size configuration: {0}")]
    InvalidPoolSize(String),

    #[error("Invalid environment mode: {0}")]
    InvalidEnvMode(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let grpc_bind_address = vars
            .get("GRPC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRPC_BIND_ADDRESS.to_string());

        let secret_base64 = vars
            .get("TODO_SIGNING_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("TODO_SIGNING_SECRET".to_string()))?;

        let secret_bytes = general_purpose::STANDARD
            .decode(secret_base64)
            .map_err(ConfigError::Base64Error)?;

        if secret_bytes.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(ConfigError::InvalidSigningSecret(format!(
                "Expected at least {} bytes, got {}",
                MIN_SIGNING_SECRET_BYTES,
                secret_bytes.len()
            )));
        }

        let token_max_age = positive_seconds(
            vars,
            "TOKEN_MAX_AGE_SECONDS",
            DEFAULT_TOKEN_MAX_AGE_SECONDS,
        )?;
        let store_timeout = positive_seconds(
            vars,
            "STORE_TIMEOUT_SECONDS",
            DEFAULT_STORE_TIMEOUT_SECONDS,
        )?;
        let request_timeout = positive_seconds(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        // Parse bcrypt cost with validation
        let bcrypt_cost = if let Some(value_str) = vars.get("BCRYPT_COST") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
                return Err(ConfigError::InvalidBcryptCost(format!(
                    "BCRYPT_COST must be between {} and {}, got {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
                )));
            }

            value
        } else {
            DEFAULT_BCRYPT_COST
        };

        let db_max_connections = if let Some(value_str) = vars.get("DB_MAX_CONNECTIONS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidPoolSize(format!(
                    "DB_MAX_CONNECTIONS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidPoolSize(
                    "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_DB_MAX_CONNECTIONS
        };

        let env_mode = match vars.get("ENV_MODE") {
            Some(value) => value.parse()?,
            None => EnvMode::default(),
        };

        // Zero is allowed and skips the drain
        let drain_period = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => Duration::from_secs(value_str.parse().map_err(|e| {
                ConfigError::InvalidDuration(format!(
                    "DRAIN_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?),
            None => Duration::from_secs(DEFAULT_DRAIN_SECONDS),
        };

        let metrics_bind_address = vars
            .get("METRICS_BIND_ADDRESS")
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(Config {
            database_url,
            grpc_bind_address,
            signing_secret: SecretBox::new(Box::new(secret_bytes)),
            token_max_age,
            store_timeout,
            request_timeout,
            bcrypt_cost,
            db_max_connections,
            env_mode,
            drain_period,
            metrics_bind_address,
        })
    }
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    // 32 bytes of 0x41, base64-encoded
    const TEST_SECRET_B64: &str = "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUE=";

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/todo_test".to_string(),
            ),
            (
                "TODO_SIGNING_SECRET".to_string(),
                TEST_SECRET_B64.to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/todo_test");
        assert_eq!(config.grpc_bind_address, DEFAULT_GRPC_BIND_ADDRESS);
        assert_eq!(config.signing_secret.expose_secret().len(), 32);
        assert_eq!(config.token_max_age, Duration::from_secs(86_400));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        assert_eq!(config.env_mode, EnvMode::Prod);
        assert_eq!(config.drain_period, Duration::from_secs(5));
        assert!(config.metrics_bind_address.is_none());
    }

    #[test]
    fn test_from_vars_with_overrides() {
        let mut vars = base_vars();
        vars.insert("GRPC_BIND_ADDRESS".to_string(), "127.0.0.1:7000".to_string());
        vars.insert("TOKEN_MAX_AGE_SECONDS".to_string(), "3600".to_string());
        vars.insert("STORE_TIMEOUT_SECONDS".to_string(), "2".to_string());
        vars.insert("BCRYPT_COST".to_string(), "10".to_string());
        vars.insert("ENV_MODE".to_string(), "dev".to_string());
        vars.insert("DRAIN_SECONDS".to_string(), "0".to_string());
        vars.insert("METRICS_BIND_ADDRESS".to_string(), "0.0.0.0:9100".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.grpc_bind_address, "127.0.0.1:7000");
        assert_eq!(config.token_max_age, Duration::from_secs(3600));
        assert_eq!(config.store_timeout, Duration::from_secs(2));
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.env_mode, EnvMode::Dev);
        assert_eq!(config.drain_period, Duration::ZERO);
        assert_eq!(config.metrics_bind_address.as_deref(), Some("0.0.0.0:9100"));
    }

    #[test]
    fn test_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_missing_signing_secret() {
        let mut vars = base_vars();
        vars.remove("TODO_SIGNING_SECRET");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "TODO_SIGNING_SECRET")
        );
    }

    #[test]
    fn test_signing_secret_not_base64() {
        let mut vars = base_vars();
        vars.insert("TODO_SIGNING_SECRET".to_string(), "not base64!!".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::Base64Error(_))));
    }

    #[test]
    fn test_signing_secret_too_short() {
        let mut vars = base_vars();
        // 16 bytes
        vars.insert(
            "TODO_SIGNING_SECRET".to_string(),
            "QUFBQUFBQUFBQUFBQUFBQQ==".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidSigningSecret(_))));
    }

    #[test]
    fn test_zero_token_max_age_rejected() {
        let mut vars = base_vars();
        vars.insert("TOKEN_MAX_AGE_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidDuration(_))));
    }

    #[test]
    fn test_non_numeric_store_timeout_rejected() {
        let mut vars = base_vars();
        vars.insert("STORE_TIMEOUT_SECONDS".to_string(), "soon".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidDuration(ref msg))
                if msg.contains("STORE_TIMEOUT_SECONDS") && msg.contains("soon"))
        );
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        for cost in ["9", "15"] {
            let mut vars = base_vars();
            vars.insert("BCRYPT_COST".to_string(), cost.to_string());
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidBcryptCost(_))),
                "cost {cost} should be rejected"
            );
        }

        for cost in ["10", "14"] {
            let mut vars = base_vars();
            vars.insert("BCRYPT_COST".to_string(), cost.to_string());
            assert!(Config::from_vars(&vars).is_ok(), "cost {cost} should load");
        }
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut vars = base_vars();
        vars.insert("DB_MAX_CONNECTIONS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidPoolSize(_))));
    }

    #[test]
    fn test_env_mode_parsing() {
        assert_eq!("local".parse::<EnvMode>().unwrap(), EnvMode::Local);
        assert_eq!("dev".parse::<EnvMode>().unwrap(), EnvMode::Dev);
        assert_eq!("prod".parse::<EnvMode>().unwrap(), EnvMode::Prod);
        assert!(matches!(
            "staging".parse::<EnvMode>(),
            Err(ConfigError::InvalidEnvMode(_))
        ));
    }

    #[test]
    fn test_empty_metrics_address_disables_exporter() {
        let mut vars = base_vars();
        vars.insert("METRICS_BIND_ADDRESS".to_string(), String::new());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.metrics_bind_address.is_none());
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let mut vars = base_vars();
        vars.insert(
            "DATABASE_URL".to_string(),
            "postgresql://admin:hunter2@db/todo".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("QUFB"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("grpc_bind_address"));
    }
}
