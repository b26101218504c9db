//! Tracing subscriber setup for applications embedding progressive_search.
//!
//! The library itself only emits `tracing` events; hosts call
//! [`init_tracing`] once to get human-readable console output.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: RUST_LOG wins, then the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initialize the global tracing subscriber with a fmt layer.
///
/// Returns `Ok(false)` when a global subscriber was already installed, so
/// calling this more than once (e.g. from several tests) is harmless.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let config = config.clone().with_env_overrides();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = tracing_subscriber::registry()
        .with(env_filter(&config))
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level = %config.level, "Console logging active");
    }

    Ok(installed)
}
