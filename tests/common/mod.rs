//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use http_interceptor::{CounterTable, Dispatcher, HttpServer, InterceptorConfig, LogRecord, LogSink, Shutdown};

pub const TEST_RESPONSE_BODY: &str = "hello, world!";

/// How long background logging gets before a test gives up.
pub const LOG_DEADLINE: Duration = Duration::from_secs(2);

/// Sink forwarding every record into a channel.
pub struct ChannelSink(mpsc::UnboundedSender<LogRecord>);

impl LogSink for ChannelSink {
    fn log(&self, record: &LogRecord) {
        let _ = self.0.send(record.clone());
    }
}

pub fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<LogRecord>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink(tx), rx)
}

/// Next record delivered to a [`ChannelSink`], failing the test after [`LOG_DEADLINE`].
pub async fn next_record(rx: &mut mpsc::UnboundedReceiver<LogRecord>) -> LogRecord {
    tokio::time::timeout(LOG_DEADLINE, rx.recv())
        .await
        .expect("nothing was logged in time")
        .expect("sink channel closed")
}

/// Poll until `key` reaches `expected` hits.
pub async fn wait_for_count(counters: &CounterTable, key: &str, expected: u64) {
    let poll = async {
        while counters.get(key) != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(LOG_DEADLINE, poll).await.is_err() {
        panic!(
            "counter for {key:?} is {:?}, expected {expected}",
            counters.get(key)
        );
    }
}

/// Answers every GET with [`TEST_RESPONSE_BODY`] and the default status.
pub fn hello_app() -> Router {
    Router::new()
        .route("/", get(|| async { TEST_RESPONSE_BODY }))
        .route("/{*path}", get(|| async { TEST_RESPONSE_BODY }))
}

/// Answers every request with 404 and [`TEST_RESPONSE_BODY`].
pub fn not_found_app() -> Router {
    Router::new().route(
        "/",
        any(|| async { (StatusCode::NOT_FOUND, TEST_RESPONSE_BODY) }),
    )
}

pub fn request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("user-agent", "interceptor-tests/1.0")
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Serve `dispatcher` on an ephemeral port.
pub async fn start_server(dispatcher: Dispatcher) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    start_server_with(&InterceptorConfig::default(), dispatcher).await
}

/// Serve `dispatcher` on an ephemeral port with a custom configuration.
pub async fn start_server_with(
    config: &InterceptorConfig,
    dispatcher: Dispatcher,
) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, dispatcher);
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    (addr, shutdown, handle)
}
