// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "FIXDB_LOG";

/// Diagnostics go to stderr so stdout carries only the run narration.
///
/// `FIXDB_LOG` wins over the configured level; an unparsable level falls back
/// to `warn`.
pub fn init(configured_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
