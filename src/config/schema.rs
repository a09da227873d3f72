//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files,
//! and every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

/// Root configuration for the interceptor server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Access log sinks.
    pub access_log: AccessLogConfig,

    /// Diagnostic logging.
    pub logging: LoggingConfig,

    /// Prometheus exporter.
    pub metrics: MetricsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8008").
    pub bind_address: String,

    /// Maximum request or response body buffered by the dispatcher.
    pub body_limit_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8008".to_string(),
            body_limit_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Where access log records go.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogConfig {
    /// Install the default JSON-lines sink on stdout.
    pub stdout: bool,

    /// Also append records to this file.
    pub file: Option<String>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            file: None,
        }
    }
}

/// Output format of diagnostic logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Diagnostic logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus endpoint.
    pub enabled: bool,

    /// Metrics endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}
