//! Logging bootstrap for the `drone-monitor` binary
//!
//! The library itself only emits `tracing` events. This module installs a
//! `tracing-subscriber` fmt layer that writes to stderr, so log lines never
//! interleave with the dashboard on stdout.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when neither `--log-level` nor `RUST_LOG` is given
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Build the filter from a level or directive string (`"debug"`,
/// `"drone_modbus=trace"`), falling back to [`DEFAULT_LOG_FILTER`].
pub fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(directives: Option<&str>, ansi: bool) {
    let result = fmt()
        .with_env_filter(build_filter(directives))
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
