//! HTTP request interception middleware.
//!
//! Wraps a request handler so that every request gets an `X-Request-ID`,
//! is timed, and produces a structured access log record plus a per-route
//! hit count once the response has been sent.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use http_interceptor::Dispatcher;
//!
//! # async fn run() -> std::io::Result<()> {
//! let app = Router::new().route("/", get(|| async { "hello, world!" }));
//! let dispatcher = Dispatcher::new(app);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8008").await?;
//! axum::serve(listener, Router::new().fallback_service(dispatcher)).await
//! # }
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::InterceptorConfig;
pub use http::{
    BuildError, ContextHandler, Dispatcher, DispatcherBuilder, Handler, HttpServer,
    RequestContext, ResponseWriter,
};
pub use lifecycle::Shutdown;
pub use observability::{CounterTable, FileSink, JsonSink, LogRecord, LogSink};
