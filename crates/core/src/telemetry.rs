//! Tracing setup for hosts that do not install their own subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("failed to set subscriber: {0}")]
    AlreadySet(String),
}

/// Install a global subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. `"info"`,
/// `"palm2_core=debug"`) is used. `json` switches to JSON lines.
pub fn init(level: &str, json: bool) -> Result<(), TelemetryError> {
    let filter = build_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| TelemetryError::AlreadySet(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TelemetryError::InvalidFilter { filter: level.to_owned(), reason: e.to_string() })
}
