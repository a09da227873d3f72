//! Log sinks.
//!
//! # Responsibilities
//! - Define the pluggable consumer of access log records
//! - Provide the default JSON-lines sink (stdout)
//! - Provide an append-only file sink
//!
//! # Design Decisions
//! - `log` has no return value; sinks report their own failures through
//!   `tracing` and never affect the request or other sinks
//! - Sinks may be called concurrently, so shared writers sit behind a mutex

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::observability::record::LogRecord;

/// Consumer of one [`LogRecord`] per completed request.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, record: &LogRecord);
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord) + Send + Sync + 'static,
{
    fn log(&self, record: &LogRecord) {
        self(record)
    }
}

/// Writes each record as one line of JSON.
///
/// This is the sink every dispatcher installs unless told otherwise.
pub struct JsonSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonSink {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Sink writing to an arbitrary writer.
    pub fn new<W: Write + Send + 'static>(out: W) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }
}

impl Default for JsonSink {
    fn default() -> Self {
        Self::stdout()
    }
}

/// One JSON line for `value`, or an in-band error line if it cannot be encoded.
fn json_line<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode access log record");
            format!("error marshaling log data: {:?}", e.to_string())
        }
    }
}

impl LogSink for JsonSink {
    fn log(&self, record: &LogRecord) {
        let line = json_line(record);

        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Failed to write access log line");
        }
    }
}

/// Appends records to a file, one JSON line each.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl LogSink for FileSink {
    fn log(&self, record: &LogRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, request_id = %record.request_id, "Failed to encode access log record");
                return;
            }
        };
        line.push(b'\n');

        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(&line) {
            tracing::warn!(error = %e, "Failed to append access log line");
        }
    }
}
