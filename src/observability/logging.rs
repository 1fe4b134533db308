//! Structured logging.
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies
//! to this crate and to `tower_http` request tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
pub fn init(
    config: &ObservabilityConfig,
    level_override: Option<&str>,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = level_override.unwrap_or(&config.log_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}

fn default_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    format!("request_catcher={level},tower_http={level}")
}
