//! Error types for sysscope.
//!
//! Probe-level failures are not errors in this sense: they are downgraded
//! to placeholder facts by the aggregator (see `probe::ProbeFailure`).
//! Only sink and configuration problems ever reach the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while writing a report to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open output {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Sink already finished")]
    Finished,
}

/// Failure while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown category in [classification]: {0}")]
    UnknownCategory(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
