//! Engine configuration.
//!
//! Settings are layered: compiled defaults, then an optional JSON file, then
//! `TASKBOARD_*` environment variables.

use crate::board::{domain::OutOfRangePolicy, ports::TransactionBudget, services::RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable selecting the out-of-range policy.
pub const ENV_OUT_OF_RANGE_POLICY: &str = "TASKBOARD_OUT_OF_RANGE_POLICY";
/// Environment variable for the transaction budget in milliseconds.
pub const ENV_TRANSACTION_TIMEOUT_MS: &str = "TASKBOARD_TRANSACTION_TIMEOUT_MS";
/// Environment variable for the row lock timeout in milliseconds.
pub const ENV_LOCK_TIMEOUT_MS: &str = "TASKBOARD_LOCK_TIMEOUT_MS";
/// Environment variable for the number of conflict retries.
pub const ENV_MAX_CONFLICT_RETRIES: &str = "TASKBOARD_MAX_CONFLICT_RETRIES";
/// Environment variable for the first retry delay in milliseconds.
pub const ENV_INITIAL_BACKOFF_MS: &str = "TASKBOARD_INITIAL_BACKOFF_MS";
/// Environment variable capping retry delays in milliseconds.
pub const ENV_MAX_BACKOFF_MS: &str = "TASKBOARD_MAX_BACKOFF_MS";
/// Environment variable holding the log filter directive.
pub const ENV_LOG: &str = "TASKBOARD_LOG";
/// Environment variable selecting `pretty` or `json` log output.
pub const ENV_LOG_FORMAT: &str = "TASKBOARD_LOG_FORMAT";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`EngineConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// A setting holds an unusable value.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue {
        /// Setting or environment variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_LOG_FORMAT,
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Logging settings consumed by [`crate::telemetry::init_tracing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info,taskboard=debug`.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::Pretty,
        }
    }
}

/// Tunables of the task board engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Handling of move targets past the tail of a partition.
    pub out_of_range_policy: OutOfRangePolicy,
    /// Wall-clock budget of one mutating transaction, in milliseconds.
    pub transaction_timeout_ms: u64,
    /// Longest wait for a row lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Retry schedule for serialization conflicts.
    pub retry: RetryPolicy,
    /// Logging settings.
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            out_of_range_policy: OutOfRangePolicy::Clamp,
            transaction_timeout_ms: 5_000,
            lock_timeout_ms: 2_000,
            retry: RetryPolicy::default(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Rejects out-of-range positions and never retries.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            out_of_range_policy: OutOfRangePolicy::Reject,
            retry: RetryPolicy::none(),
            ..Self::default()
        }
    }

    /// Clamps positions and retries conflicts generously.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            out_of_range_policy: OutOfRangePolicy::Clamp,
            retry: RetryPolicy {
                max_conflict_retries: 8,
                ..RetryPolicy::default()
            },
            ..Self::default()
        }
    }

    /// Reads a JSON configuration file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()
    }

    /// Builds the configuration from defaults, an optional file and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file or a variable is invalid.
    pub fn from_sources(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(file) => Self::load(file)?,
            None => Self::default(),
        };
        base.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `TASKBOARD_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable variables.
    pub fn apply_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(policy) = lookup(ENV_OUT_OF_RANGE_POLICY) {
            self.out_of_range_policy =
                policy.parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_OUT_OF_RANGE_POLICY,
                    value: policy.clone(),
                })?;
        }
        if let Some(value) = parse_var(&lookup, ENV_TRANSACTION_TIMEOUT_MS)? {
            self.transaction_timeout_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_LOCK_TIMEOUT_MS)? {
            self.lock_timeout_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_CONFLICT_RETRIES)? {
            self.retry.max_conflict_retries = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_INITIAL_BACKOFF_MS)? {
            self.retry.initial_backoff_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_BACKOFF_MS)? {
            self.retry.max_backoff_ms = value;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log.filter = filter;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log.format = format.parse()?;
        }
        self.validate()
    }

    /// Starts a transaction budget from the configured timeouts.
    #[must_use]
    pub fn budget(&self) -> TransactionBudget {
        TransactionBudget::start(self.transaction_timeout(), self.lock_timeout())
    }

    /// Returns the transaction budget as a duration.
    #[must_use]
    pub const fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Returns the lock timeout as a duration.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.transaction_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "transaction_timeout_ms",
                value: "0".to_owned(),
            });
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::InvalidValue {
                key: "retry.initial_backoff_ms",
                value: self.retry.initial_backoff_ms.to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue {
                    key,
                    value: raw.clone(),
                })
        })
        .transpose()
}
