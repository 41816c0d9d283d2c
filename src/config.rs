// src/config.rs

use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "PEOPLE_DB_PATH";
pub const ENV_DB_PASSWORD: &str = "PEOPLE_DB_PASSWORD";
pub const ENV_BUSY_TIMEOUT_MS: &str = "PEOPLE_DB_BUSY_TIMEOUT_MS";
pub const ENV_TRACE_HOOKS: &str = "PEOPLE_DB_TRACE_HOOKS";

pub const DEFAULT_DB_PATH: &str = "people.sqlite3";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

impl ConfigError {
    pub const EXIT_CODE: u8 = 7;
}

/// Everything needed to open the database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// File path, or `:memory:`.
    pub path: PathBuf,
    /// SQLCipher key. Only encrypts when built with the `sqlcipher` feature.
    pub password: Option<String>,
    pub busy_timeout: Duration,
    /// Log commit/rollback/update hook events.
    pub trace_hooks: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            password: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            trace_hooks: false,
        }
    }
}

// Keeps the password out of logs.
impl Debug for DatabaseConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("busy_timeout", &self.busy_timeout)
            .field("trace_hooks", &self.trace_hooks)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }

    /// Reads `.env` (if present) and then the `PEOPLE_DB_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded .env from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH) {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: ENV_DB_PATH,
                    value: path,
                    reason: "path must not be empty".to_string(),
                });
            }
            config.path = PathBuf::from(path);
        }

        config.password = lookup(ENV_DB_PASSWORD).filter(|p| !p.is_empty());

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    var: ENV_BUSY_TIMEOUT_MS,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(ENV_TRACE_HOOKS) {
            config.trace_hooks = parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: ENV_TRACE_HOOKS,
                value: raw.clone(),
                reason: "expected one of 1/0, true/false, yes/no, on/off".to_string(),
            })?;
        }

        Ok(config)
    }

    /// Connection descriptor for log lines, password redacted.
    pub fn descriptor(&self) -> String {
        let mut out = format!(
            "sqlite://{}?busy_timeout_ms={}",
            self.path.display(),
            self.busy_timeout.as_millis()
        );
        if self.password.is_some() {
            out.push_str("&key=***");
        }
        out
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
