//! Tracing setup for acceptance runs.
//!
//! Stage runner, scheduler and drivers log with `case`, `step` and
//! `operation` fields; this module installs the subscriber that prints
//! them. CI runs use `log_format = "json"` so a failed case can be
//! traced by filtering on its `case` field.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tfacc_core::config::GeneralConfig;

/// Filter for a run: a non-empty `RUST_LOG` wins, otherwise `log_level`.
///
/// `RUST_LOG=tfacc_runner=debug` narrows output to driver calls without
/// editing `tfacc.toml`.
pub fn env_filter(config: &GeneralConfig) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(&config.log_level))
        }
        _ => EnvFilter::new(&config.log_level),
    }
}

/// Installs the global subscriber for this test binary.
///
/// Fails when a subscriber is already installed, which happens when
/// several tests in one binary each call it; callers there ignore the error.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()
            .context("tracing subscriber already installed")?,
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_test_writer())
            .try_init()
            .context("tracing subscriber already installed")?,
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    }

    tracing::debug!(
        level = %config.log_level,
        format = %config.log_format,
        "tracing initialized"
    );
    Ok(())
}
