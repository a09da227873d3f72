//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (after the response is sent):
//!     → record.rs (one LogRecord per request)
//!     → sink.rs (fan-out to every registered sink)
//!     → counters.rs (per-route hit count)
//!     → metrics.rs (aggregate Prometheus metrics)
//!
//! Diagnostics from every subsystem:
//!     → logging.rs (tracing subscriber, pretty or JSON)
//! ```

pub mod counters;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod sink;

pub use counters::CounterTable;
pub use record::LogRecord;
pub use sink::{FileSink, JsonSink, LogSink};
