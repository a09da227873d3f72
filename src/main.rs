//! Demo server for the HTTP interceptor.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ server ─▶ dispatcher ─▶ demo app (Router)  │
//!                          │                │                             │
//!     Client Response      │                ▼                             │
//!     ◀────────────────────┼── recorded response + X-Request-ID           │
//!                          │                ┆ (background)                │
//!                          │                ▼                             │
//!                          │   log sinks (stdout, file) + counters        │
//!                          └──────────────────────────────────────────────┘
//! ```
//!
//! `GET /__/counters` on any prefix returns the per-route hit counts.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::OriginalUri;
use axum::routing::any;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use http_interceptor::config::{
    load_config, validate_config, ConfigError, InterceptorConfig, LogFormat,
};
use http_interceptor::lifecycle::signals::shutdown_on_ctrl_c;
use http_interceptor::observability::{logging, metrics};
use http_interceptor::{Dispatcher, FileSink, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "http-interceptor")]
#[command(about = "Demo server wrapped by the request-interception middleware")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log level (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit diagnostic logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_tracing(&config.logging)?;
    tracing::info!("http-interceptor v{} starting", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        metrics::init_metrics(config.metrics.address.parse()?)?;
    }

    let mut builder = Dispatcher::builder()
        .service(demo_app())
        .body_limit(config.listener.body_limit_bytes);
    if !config.access_log.stdout {
        builder = builder.without_default_sink();
    }
    if let Some(path) = &config.access_log.file {
        builder = builder.sink(FileSink::open(path)?);
        tracing::info!(path = %path, "Appending access log to file");
    }
    let dispatcher = builder.build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown_on_ctrl_c(shutdown.clone());

    HttpServer::new(&config, dispatcher)
        .run(listener, shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Config file (or defaults) with command-line overrides, validated as a whole.
fn resolve_config(cli: &Cli) -> Result<InterceptorConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => InterceptorConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Greets every path.
fn demo_app() -> Router {
    let hello = any(|OriginalUri(uri): OriginalUri| async move { format!("Hello, {:?}", uri.path()) });
    Router::new().route("/", hello.clone()).route("/{*path}", hello)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_interceptor::config::ValidationError;

    #[test]
    fn test_overrides_are_applied() {
        let cli = Cli::parse_from([
            "http-interceptor",
            "--bind",
            "127.0.0.1:9000",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_overrides_are_validated() {
        let cli = Cli::parse_from(["http-interceptor", "--log-level", "bogus"]);
        match resolve_config(&cli) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::UnknownLogLevel("bogus".into())]);
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
