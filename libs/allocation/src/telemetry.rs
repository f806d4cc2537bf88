//! Tracing setup for hosts embedding the allocation service.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::Config;

/// Install a JSON tracing subscriber.
///
/// Prefers `RUST_LOG`, falling back to the configured log level. Fails if a
/// global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .context("Failed to install tracing subscriber")
}
