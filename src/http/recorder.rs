//! Buffered response recording.
//!
//! # Responsibilities
//! - Stand in for the client-facing response while a handler runs
//! - Buffer headers, status and body so they can be inspected
//! - Flush the recorded output into the real response with the request ID
//!
//! # Design Decisions
//! - Bodies are fully buffered; streaming responses are not supported
//! - The first explicit status wins; writing body bytes commits 200
//! - `X-Request-ID` is inserted after the recorded headers, replacing any
//!   value the handler set

use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode};
use bytes::{Bytes, BytesMut};

use crate::http::request_id::X_REQUEST_ID;

/// The mutable surface a handler writes its response through.
pub trait ResponseWriter {
    /// Response headers; mutations are kept verbatim.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Set the status code. Ignored once a status has been committed.
    fn set_status(&mut self, status: StatusCode);

    /// Append bytes to the response body.
    fn write_body(&mut self, chunk: &[u8]);
}

/// Buffers a handler's response instead of sending it.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: BytesMut,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a response produced by a service, buffering at most `limit` body bytes.
    pub async fn capture(response: Response<Body>, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, limit).await?;
        Ok(Self {
            headers: parts.headers,
            status: Some(parts.status),
            body: BytesMut::from(&bytes[..]),
        })
    }

    /// Recorder holding only a status, for responses the handler never produced.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Recorded status, 200 if the handler never set one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Copy the recording into a real response and attach the request ID.
    pub fn into_response(self, request_id: HeaderValue) -> Response<Body> {
        let status = self.status();
        let mut response = Response::new(Body::from(Bytes::from(self.body)));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response.headers_mut().insert(X_REQUEST_ID.clone(), request_id);
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(chunk);
    }
}

impl io::Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
