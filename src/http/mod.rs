//! HTTP interception subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, timeout)
//!     → dispatcher.rs (request ID, timing, diagnostic route)
//!     → handler.rs (wrapped service or context handler)
//!     → recorder.rs / context.rs (buffered response)
//!     → sanitize.rs (credential-free URL)
//!     → Send to client, then log & count in the background
//! ```

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod recorder;
pub mod request_id;
pub mod sanitize;
pub mod server;

pub use context::RequestContext;
pub use dispatcher::{BuildError, Dispatcher, DispatcherBuilder, COUNTERS_PATH_SUFFIX};
pub use handler::{ContextHandler, Handler};
pub use recorder::{ResponseRecorder, ResponseWriter};
pub use request_id::{RequestIdGenerator, BROKEN_ENTROPY_ID, X_REQUEST_ID};
pub use sanitize::sanitize_url;
pub use server::HttpServer;
