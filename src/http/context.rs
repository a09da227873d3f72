//! Single-value request context for context-style handlers.

use std::io;
use std::net::SocketAddr;

use axum::http::header::{HOST, USER_AGENT};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::http::recorder::{ResponseRecorder, ResponseWriter};

/// Everything a [`ContextHandler`](crate::http::handler::ContextHandler) sees:
/// the buffered request, connection metadata and the response being built.
#[derive(Debug)]
pub struct RequestContext {
    request: Request<Bytes>,
    remote_addr: Option<SocketAddr>,
    started_at: DateTime<Utc>,
    response: ResponseRecorder,
}

impl RequestContext {
    pub fn new(
        request: Request<Bytes>,
        remote_addr: Option<SocketAddr>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request,
            remote_addr,
            started_at,
            response: ResponseRecorder::new(),
        }
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn request_headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Peer address of the connection, when the transport provides one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    /// Instant the dispatcher started handling the request.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Absolute URI of the request.
    ///
    /// Origin-form targets are completed from the `Host` header; without one
    /// the target is returned as received.
    pub fn full_uri(&self) -> String {
        full_uri(self.request.uri(), self.request.headers())
    }

    /// The response recorded so far.
    pub fn response(&self) -> &ResponseRecorder {
        &self.response
    }

    pub(crate) fn into_response(self) -> ResponseRecorder {
        self.response
    }
}

/// Absolute form of a request target, completed from `Host` when needed.
pub(crate) fn full_uri(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.authority().is_some() {
        return uri.to_string();
    }
    match headers.get(HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => {
            let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            format!("http://{host}{target}")
        }
        None => uri.to_string(),
    }
}

impl ResponseWriter for RequestContext {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.response.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.response.write_body(chunk);
    }
}

impl io::Write for RequestContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.response.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
