// SPDX-License-Identifier: Apache-2.0

//! Structured logging setup (`tracing`/`tracing-subscriber`), following
//! the teacher's `cfg::logger` shape but without the `fastrace` span
//! exporter — this crate has no distributed-tracing backend to report
//! spans to, so that half of the teacher's logger is dropped (see
//! DESIGN.md).

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Initializes the global `tracing` subscriber from a [`crate::config::LoggingConfig`].
pub fn init_logger(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .context("failed to parse log level from config or env")?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_line_number(true))
            .try_init()
            .context("failed to set global default subscriber")?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
            .context("failed to set global default subscriber")?,
    }

    Ok(())
}
