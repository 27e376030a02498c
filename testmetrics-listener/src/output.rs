// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging setup for processes hosting the listener.

use crate::errors::ConfigError;
use std::sync::Once;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Controls which log messages are written to stderr, as a `tracing_subscriber` targets filter
/// (for example `testmetrics_listener=debug`).
pub const LOG_ENV: &str = "TESTMETRICS_LOG";

static INIT_LOGGER: Once = Once::new();

/// Parses a targets filter. An empty string selects warnings and errors only.
pub fn parse_log_filter(level_str: &str) -> Result<Targets, ConfigError> {
    if level_str.is_empty() {
        return Ok(Targets::new().with_default(LevelFilter::WARN));
    }
    level_str.parse().map_err(|error| ConfigError::LogFilter {
        var: LOG_ENV,
        input: level_str.to_owned(),
        reason: format!("{error}"),
    })
}

/// Installs a global subscriber writing to stderr, filtered by [`LOG_ENV`].
///
/// Only the first call has any effect. Returns an error if [`LOG_ENV`] is set but can't be parsed,
/// in which case nothing is installed.
pub fn init_logger() -> Result<(), ConfigError> {
    let level_str = std::env::var(LOG_ENV).unwrap_or_default();
    let targets = parse_log_filter(&level_str)?;

    INIT_LOGGER.call_once(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(targets);

        // Another subscriber may already be installed by the host process.
        let _ = tracing_subscriber::registry().with(layer).try_init();
    });
    Ok(())
}
