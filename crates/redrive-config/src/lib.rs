// redrive-config - per-function configuration for the pipeline
//
// Each Lambda function reads its own small set of environment variables at
// startup and fails fast on anything malformed. Nothing here is re-read per
// batch; parse once, inject everywhere.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Dispatcher: forwards allowed object notifications to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// ARN of the worker function to invoke.
    pub target_arn: String,
    /// Allow-list of identity-path prefixes. Empty means forward everything.
    pub allow_prefixes: Vec<String>,
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            target_arn: require("TARGET_LAMBDA_ARN")?,
            allow_prefixes: parse_prefixes(
                &std::env::var("ALLOW_PREFIXES").unwrap_or_default(),
            ),
        })
    }
}

/// Recorder: persists failure notifications into the error table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub table_name: String,
}

impl RecorderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: require("ERROR_TABLE")?,
        })
    }
}

/// Retrier: re-drives one retry per record off the error table's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrierConfig {
    pub target_arn: String,
    pub table_name: String,
    /// Records whose error count exceeds this are never retried.
    pub max_retry: u64,
}

impl RetrierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            target_arn: require("TARGET_LAMBDA_ARN")?,
            table_name: require("ERROR_TABLE")?,
            max_retry: parse_max_retry(&require("MAX_RETRY")?)?,
        })
    }
}

/// Comma-separated prefix list. Empty or absent means "forward everything";
/// blank entries are dropped rather than acting as match-all sentinels.
pub fn parse_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn parse_max_retry(raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|err: std::num::ParseIntError| {
        ConfigError::Invalid {
            name: "MAX_RETRY",
            reason: err.to_string(),
        }
    })
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}
