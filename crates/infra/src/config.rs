//! Configuration loading and representation.
//!
//! Everything is read once at startup into an immutable [`AppConfig`].

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use gomeetup_auth::{AuthConfig, Capability, PermissionSet};

const DEFAULT_SECRET: &str = "DEBUG";
const DEFAULT_TTL: &str = "1d";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not set")]
    Missing { key: &'static str },

    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment environment; selects which database target is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Testing,
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Name of the variable holding this environment's database URL.
    pub fn database_url_key(self) -> &'static str {
        match self {
            Environment::Testing => "DB_TEST",
            Environment::Development => "DB_DEV",
            Environment::Production => "DB_PROD",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "testing" | "test" => Ok(Environment::Testing),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub auth: AuthConfig,
    /// Database URL for the active environment, if set.
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                key: "APP_ENV",
                value: v.clone(),
                reason,
            })?,
            None => Environment::default(),
        };

        let token_secret = match lookup("APP_TOKEN_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("APP_TOKEN_SECRET not set; using insecure dev default");
                DEFAULT_SECRET.to_string()
            }
        };

        let ttl_raw = lookup("APP_TOKEN_TIMEOUT").unwrap_or_else(|| DEFAULT_TTL.to_string());
        let token_ttl = parse_duration(&ttl_raw).map_err(|reason| ConfigError::Invalid {
            key: "APP_TOKEN_TIMEOUT",
            value: ttl_raw.clone(),
            reason,
        })?;

        let default_permissions = match lookup("APP_DEFAULT_PERMISSIONS").filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_permissions(&raw).map_err(|reason| ConfigError::Invalid {
                key: "APP_DEFAULT_PERMISSIONS",
                value: raw.clone(),
                reason,
            })?,
            None => AuthConfig::starter_permissions(),
        };
        if default_permissions.is_empty() {
            tracing::warn!("APP_DEFAULT_PERMISSIONS is empty; new users will hold no permissions");
        }

        let use_persistent_stores = match lookup("USE_PERSISTENT_STORES") {
            Some(v) => v.trim().parse::<bool>().map_err(|e| ConfigError::Invalid {
                key: "USE_PERSISTENT_STORES",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => false,
        };

        let database_url = lookup(environment.database_url_key()).filter(|s| !s.is_empty());
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: environment.database_url_key(),
            });
        }

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            environment,
            auth: AuthConfig::new(token_secret, token_ttl)
                .with_default_permissions(default_permissions),
            database_url,
            use_persistent_stores,
            bind_addr,
        })
    }
}

/// Parse a permission set given as JSON, e.g. `{"events": ["read", "create"]}`.
///
/// Every entry must form a valid `resource:action` capability.
pub fn parse_permissions(raw: &str) -> Result<PermissionSet, String> {
    let permissions: PermissionSet = serde_json::from_str(raw)
        .map_err(|e| format!("expected a {{resource: [actions]}} object: {e}"))?;
    for capability in permissions.capabilities() {
        capability
            .to_string()
            .parse::<Capability>()
            .map_err(|e| e.to_string())?;
    }
    Ok(permissions)
}

/// Parse a duration such as `3600`, `90s`, `15m`, `12h`, `1d`, `2 days`,
/// `1w` or `1y`.
///
/// A bare number is seconds. Units are case-insensitive and may be separated
/// from the number by whitespace. A year is 365.25 days. Zero is rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);

    let amount: i64 = digits
        .parse()
        .map_err(|_| "expected a number optionally followed by a unit".to_string())?;
    if amount <= 0 {
        return Err("duration must be positive".to_string());
    }

    let duration = match unit.trim().to_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(amount),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount),
        "d" | "day" | "days" => Duration::try_days(amount),
        "w" | "week" | "weeks" => amount.checked_mul(7).and_then(Duration::try_days),
        "y" | "yr" | "yrs" | "year" | "years" => {
            amount.checked_mul(8766).and_then(Duration::try_hours)
        }
        other => return Err(format!("unknown unit '{other}'")),
    };
    duration.ok_or_else(|| "duration out of range".to_string())
}
