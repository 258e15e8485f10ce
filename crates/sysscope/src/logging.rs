//! Logging setup for the binary
//!
//! Logs go to stderr only; stdout carries the report.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Resolve the filter: explicit level, else `RUST_LOG`, else `warn`.
/// An unparsable directive falls back to the default.
pub fn filter_for(level: Option<&str>) -> EnvFilter {
    match level {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
