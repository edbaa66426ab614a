// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Logging setup: `tracing-subscriber` with an env filter, and a switch
//! between human-readable and JSON formatting.

use crate::config::{Config, LogFormat};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Returns nothing to keep alive: unlike
/// a long-lived daemon's non-blocking file appender, a tick process
/// writes to stderr and exits within the same invocation, so there is no
/// background flush worker to guard.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_target(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
