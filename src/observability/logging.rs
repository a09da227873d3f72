//! Structured diagnostic logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber for binaries
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON format for production, pretty format for development
//! - Access log records do not go through here; they go to log sinks

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("http_interceptor={},tower_http=debug", config.level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(true),
            )
            .try_init(),
    }
}
