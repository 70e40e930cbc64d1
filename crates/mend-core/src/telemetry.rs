//! Log output setup for binaries.
//!
//! Library code only emits `tracing` events; whether and at what level they
//! appear is decided here, from the telemetry section of the configuration.
//! Logs go to stderr so stdout stays clean for machine-readable output.

use crate::config::TelemetryConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. A `RUST_LOG` environment variable
/// overrides the configured level; repeated calls are ignored.
pub fn init(config: &TelemetryConfig) {
    if !config.enabled {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
