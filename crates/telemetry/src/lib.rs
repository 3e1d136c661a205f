//! Tracing subscriber setup shared by the server and the CLI.

use anyhow::Context;
use bookstore_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `telemetry.filter`.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    tracing::debug!(target: "bookstore-telemetry", format = ?settings.log_format, "telemetry initialized");
    Ok(())
}

fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter)
            .with_context(|| format!("invalid telemetry.filter '{}'", settings.filter)),
    }
}
