//! Request interception pipeline.
//!
//! # Per-request flow
//! ```text
//! received
//!     → identified       mint X-Request-ID, start the clock
//!     → handler invoked  wrapped handler writes into a ResponseRecorder
//!     → recorded         effective URL sanitized
//!     → responded        recording copied to the real response + X-Request-ID
//!     ⇢ logged & counted (spawned task, never awaited by the caller)
//! ```
//!
//! Requests whose path ends in `/__/counters` skip the handler and get the
//! counter table as JSON. They are neither logged nor counted.
//!
//! # Design Decisions
//! - The handler kind is resolved once at construction, not per request
//! - Each sink runs on its own blocking task; a slow or panicking sink
//!   cannot hold up other sinks, the counter update or the response
//! - Handler panics are not caught; they surface at the transport's own
//!   fault boundary
//! - The optional handler deadline lives inside the pipeline, so a timed-out
//!   request still gets its ID, a 408, a log record and a count. Context
//!   handlers run synchronously; for them the deadline covers body buffering

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderValue, Request, Response, StatusCode};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use thiserror::Error;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::http::context::{full_uri, RequestContext};
use crate::http::handler::{BoxedService, ContextHandler, Handler};
use crate::http::recorder::{ResponseRecorder, ResponseWriter};
use crate::http::request_id::RequestIdGenerator;
use crate::http::sanitize::sanitize_url;
use crate::observability::metrics;
use crate::observability::{CounterTable, JsonSink, LogRecord, LogSink};

/// Path suffix of the diagnostic route.
pub const COUNTERS_PATH_SUFFIX: &str = "/__/counters";

/// Default cap on buffered request and response bodies.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

type SinkList = Vec<Arc<dyn LogSink>>;

/// Dispatcher construction failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("no handler supplied: expected a service or a context handler")]
    MissingHandler,

    #[error("ambiguous handler: both a service and a context handler were supplied")]
    AmbiguousHandler,
}

/// Wraps a handler with request IDs, access logging and per-route counters.
///
/// Cloning is cheap; clones share sinks and counters.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Handler,
    shared: Arc<Shared>,
    timeout: Option<Duration>,
}

struct Shared {
    sinks: ArcSwap<SinkList>,
    counters: CounterTable,
    ids: RequestIdGenerator,
    body_limit: usize,
}

/// Everything the background step needs once the response is out.
struct PendingLog {
    request_id: String,
    started: Instant,
    started_at: DateTime<Utc>,
    remote_addr: Option<SocketAddr>,
    status: u16,
    url: String,
    user_agent: Option<String>,
}

impl Dispatcher {
    /// Wrap `handler` with the default stdout sink.
    pub fn new(handler: impl Into<Handler>) -> Self {
        Self::from_parts(
            handler.into(),
            vec![Arc::new(JsonSink::stdout())],
            RequestIdGenerator::new(),
            DEFAULT_BODY_LIMIT,
            None,
        )
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    fn from_parts(
        handler: Handler,
        sinks: SinkList,
        ids: RequestIdGenerator,
        body_limit: usize,
        timeout: Option<Duration>,
    ) -> Self {
        tracing::debug!(
            handler = handler.kind(),
            sinks = sinks.len(),
            body_limit,
            timeout = ?timeout,
            "Dispatcher created"
        );
        Self {
            handler,
            timeout,
            shared: Arc::new(Shared {
                sinks: ArcSwap::from_pointee(sinks),
                counters: CounterTable::new(),
                ids,
                body_limit,
            }),
        }
    }

    /// Register another log sink.
    ///
    /// Requests already past the response stage keep the list they saw.
    pub fn add_sink<S: LogSink>(&self, sink: S) {
        let sink: Arc<dyn LogSink> = Arc::new(sink);
        self.shared.sinks.rcu(|current| {
            let mut next = SinkList::clone(current);
            next.push(sink.clone());
            next
        });
    }

    /// Same dispatcher (shared sinks and counters) with a handler deadline.
    ///
    /// Requests that run past `timeout` are answered with 408 and are still
    /// logged and counted.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn sink_count(&self) -> usize {
        self.shared.sinks.load().len()
    }

    /// Per-route hit counters.
    pub fn counters(&self) -> &CounterTable {
        &self.shared.counters
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Run one request through the pipeline.
    ///
    /// The returned future resolves as soon as the response is ready;
    /// logging and counting continue on a spawned task.
    pub fn dispatch(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Response<Body>> + Send + 'static {
        self.clone().run(request)
    }

    async fn run(self, request: Request<Body>) -> Response<Body> {
        let Dispatcher {
            handler,
            shared,
            timeout,
        } = self;
        let (request_id, header) = shared.ids.mint_header();

        if request.uri().path().ends_with(COUNTERS_PATH_SUFFIX) {
            return shared.counters_response(header);
        }

        let started = Instant::now();
        let started_at = Utc::now();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let user_agent = request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let url = match &handler {
            Handler::Service(_) => request.uri().to_string(),
            Handler::Context(_) => full_uri(request.uri(), request.headers()),
        };

        let invoke = async {
            match handler {
                Handler::Service(service) => shared.call_service(service, request).await,
                Handler::Context(handler) => {
                    shared
                        .call_context(handler.as_ref(), request, remote_addr, started_at)
                        .await
                }
            }
        };
        let recorder = match timeout {
            Some(limit) => match tokio::time::timeout(limit, invoke).await {
                Ok(recorder) => recorder,
                Err(_) => {
                    tracing::warn!(
                        request_id = %request_id,
                        timeout = ?limit,
                        "Handler timed out"
                    );
                    ResponseRecorder::with_status(StatusCode::REQUEST_TIMEOUT)
                }
            },
            None => invoke.await,
        };

        let url = sanitize_url(&url).into_owned();
        let status = recorder.status().as_u16();
        let response = recorder.into_response(header);

        let pending = PendingLog {
            request_id,
            started,
            started_at,
            remote_addr,
            status,
            url,
            user_agent,
        };
        tokio::spawn(shared.finish(pending));

        response
    }
}

impl Shared {
    async fn call_service(&self, service: BoxedService, request: Request<Body>) -> ResponseRecorder {
        let response = match service.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        match ResponseRecorder::capture(response, self.body_limit).await {
            Ok(recorder) => recorder,
            Err(e) => {
                tracing::error!(error = %e, "Failed to buffer handler response");
                ResponseRecorder::with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    async fn call_context(
        &self,
        handler: &dyn ContextHandler,
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
        started_at: DateTime<Utc>,
    ) -> ResponseRecorder {
        let (parts, body) = request.into_parts();
        match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => {
                let mut ctx =
                    RequestContext::new(Request::from_parts(parts, bytes), remote_addr, started_at);
                handler.handle(&mut ctx);
                ctx.into_response()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to buffer request body");
                ResponseRecorder::with_status(StatusCode::BAD_REQUEST)
            }
        }
    }

    fn counters_response(&self, request_id: HeaderValue) -> Response<Body> {
        let body = match serde_json::to_vec(&self.counters.snapshot()) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode counters");
                b"{}".to_vec()
            }
        };

        let mut recorder = ResponseRecorder::new();
        recorder
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        recorder.write_body(&body);
        recorder.into_response(request_id)
    }

    async fn finish(self: Arc<Self>, pending: PendingLog) {
        let elapsed = pending.started.elapsed();
        let record = Arc::new(LogRecord::new(
            pending.request_id,
            pending.started_at,
            elapsed,
            pending.remote_addr,
            pending.status,
            pending.url,
            pending.user_agent,
        ));

        let sinks = self.sinks.load_full();
        let deliveries: Vec<_> = sinks
            .iter()
            .cloned()
            .map(|sink| {
                let record = record.clone();
                tokio::task::spawn_blocking(move || sink.log(&record))
            })
            .collect();

        let hits = self.counters.increment(&record.url);
        metrics::record_request(record.status, elapsed);
        tracing::debug!(
            request_id = %record.request_id,
            url = %record.url,
            status = record.status,
            hits,
            "Request completed"
        );

        for (index, delivery) in deliveries.into_iter().enumerate() {
            if let Err(e) = delivery.await {
                tracing::error!(
                    sink = index,
                    request_id = %record.request_id,
                    error = %e,
                    "Log sink failed"
                );
            }
        }
    }
}

impl Service<Request<Body>> for Dispatcher {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let response = self.dispatch(request);
        Box::pin(async move { Ok(response.await) })
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler", &self.handler)
            .field("timeout", &self.timeout)
            .field("sinks", &self.sink_count())
            .field("routes", &self.shared.counters.len())
            .finish()
    }
}

/// Fallible construction of a [`Dispatcher`].
///
/// Exactly one of [`service`](Self::service) or
/// [`context_handler`](Self::context_handler) must be supplied.
pub struct DispatcherBuilder {
    service: Option<BoxedService>,
    context: Option<Arc<dyn ContextHandler>>,
    sinks: SinkList,
    default_sink: bool,
    ids: RequestIdGenerator,
    body_limit: usize,
    timeout: Option<Duration>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            context: None,
            sinks: Vec::new(),
            default_sink: true,
            ids: RequestIdGenerator::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            timeout: None,
        }
    }

    /// Wrap a request/response service.
    pub fn service<S>(mut self, service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.service = Some(BoxCloneSyncService::new(service));
        self
    }

    /// Wrap a context handler.
    pub fn context_handler<H: ContextHandler>(mut self, handler: H) -> Self {
        self.context = Some(Arc::new(handler));
        self
    }

    /// Add a sink after the default one.
    pub fn sink<S: LogSink>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Do not install the stdout sink.
    pub fn without_default_sink(mut self) -> Self {
        self.default_sink = false;
        self
    }

    pub fn id_generator(mut self, ids: RequestIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Cap on buffered request and response bodies, in bytes.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Deadline for the wrapped handler; none by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let handler = match (self.service, self.context) {
            (Some(service), None) => Handler::Service(service),
            (None, Some(context)) => Handler::Context(context),
            (None, None) => return Err(BuildError::MissingHandler),
            (Some(_), Some(_)) => return Err(BuildError::AmbiguousHandler),
        };

        let mut sinks: SinkList = Vec::with_capacity(self.sinks.len() + 1);
        if self.default_sink {
            sinks.push(Arc::new(JsonSink::stdout()));
        }
        sinks.extend(self.sinks);

        Ok(Dispatcher::from_parts(
            handler,
            sinks,
            self.ids,
            self.body_limit,
            self.timeout,
        ))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    fn router() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    #[test]
    fn test_builder_requires_a_handler() {
        let err = Dispatcher::builder().build().unwrap_err();
        assert_eq!(err, BuildError::MissingHandler);
    }

    #[test]
    fn test_builder_rejects_two_handlers() {
        let err = Dispatcher::builder()
            .service(router())
            .context_handler(|_: &mut RequestContext| {})
            .build()
            .unwrap_err();
        assert_eq!(err, BuildError::AmbiguousHandler);
    }

    #[test]
    fn test_handler_kind_is_resolved_at_build() {
        let d = Dispatcher::builder().service(router()).build().unwrap();
        assert_eq!(d.handler().kind(), "service");

        let d = Dispatcher::builder()
            .context_handler(|_: &mut RequestContext| {})
            .build()
            .unwrap();
        assert_eq!(d.handler().kind(), "context");
    }

    #[test]
    fn test_default_sink_is_first_and_optional() {
        let d = Dispatcher::new(router());
        assert_eq!(d.sink_count(), 1);

        let d = Dispatcher::builder()
            .service(router())
            .without_default_sink()
            .build()
            .unwrap();
        assert_eq!(d.sink_count(), 0);
    }

    #[test]
    fn test_add_sink_appends() {
        let d = Dispatcher::new(router());
        d.add_sink(|_: &LogRecord| {});
        d.add_sink(|_: &LogRecord| {});
        assert_eq!(d.sink_count(), 3);

        let clone = d.clone();
        assert_eq!(clone.sink_count(), 3);
    }

    #[test]
    fn test_with_timeout_shares_state() {
        let d = Dispatcher::new(router());
        assert_eq!(d.timeout(), None);

        let timed = d.clone().with_timeout(Duration::from_secs(5));
        assert_eq!(timed.timeout(), Some(Duration::from_secs(5)));
        timed.counters().increment("/");
        assert_eq!(d.counters().get("/"), Some(1));
    }
}
