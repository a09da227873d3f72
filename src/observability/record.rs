//! Access log record.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed request, as handed to every log sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Human-readable elapsed time, e.g. `34.679µs`.
    pub duration: String,
    pub duration_ms: f64,
    /// Peer address, empty when the transport did not report one.
    pub ip_address: String,
    pub request_id: String,
    pub status: u16,
    /// When the request started.
    pub time: DateTime<Utc>,
    /// Request URL with any password removed.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useragent: Option<String>,
}

impl LogRecord {
    pub fn new(
        request_id: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        remote_addr: Option<SocketAddr>,
        status: u16,
        url: String,
        useragent: Option<String>,
    ) -> Self {
        Self {
            duration: format!("{elapsed:?}"),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            ip_address: remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            request_id,
            status,
            time: started_at,
            url,
            useragent,
        }
    }
}
