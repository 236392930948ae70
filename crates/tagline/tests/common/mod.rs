//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::Value;
use tagline::{Config, Exchange, Locals, Logger, Sink};

// ============================================================================
// Exchange double
// ============================================================================

/// A finished request/response pair built field by field.
#[derive(Debug, Clone)]
pub struct TestExchange {
    pub method: Method,
    pub uri: Uri,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub status: StatusCode,
    pub remote_addr: Option<SocketAddr>,
    pub request_body: Vec<u8>,
    pub response_body: Vec<u8>,
    pub locals: Locals,
}

impl TestExchange {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().unwrap(),
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            status: StatusCode::OK,
            remote_addr: Some("0.0.0.0:0".parse().unwrap()),
            request_body: Vec::new(),
            response_body: Vec::new(),
            locals: Locals::new(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.request_headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn with_response_header(mut self, name: &'static str, value: &str) -> Self {
        self.response_headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn with_local(mut self, key: &str, value: Value) -> Self {
        self.locals.insert(key.to_string(), value);
        self
    }

    /// What a handler does: set the status and the body it sent.
    pub fn respond(&mut self, status: u16, body: &str) {
        self.status = StatusCode::from_u16(status).unwrap();
        self.response_body = body.as_bytes().to_vec();
    }
}

impl Exchange for TestExchange {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    fn locals(&self) -> &Locals {
        &self.locals
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Records every write as a separate line.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|line| String::from_utf8(line.clone()).unwrap())
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    /// The only line written; panics unless exactly one was.
    pub fn single(&self) -> String {
        let lines = self.lines();
        assert_eq!(lines.len(), 1, "expected one line, got {:?}", lines);
        lines.into_iter().next().unwrap()
    }
}

impl Sink for CaptureSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.lines.lock().unwrap().push(line.to_vec());
        Ok(())
    }
}

/// Fails every write and counts the attempts.
#[derive(Debug, Default)]
pub struct FailingSink {
    calls: AtomicUsize,
}

impl FailingSink {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sink for FailingSink {
    fn write_line(&self, _: &[u8]) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::other("output closed"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// An error type a handler might return.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError(pub String);

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandlerError {}

/// A logger writing to a fresh capture sink, colors off.
pub fn capture(config: Config) -> (Logger, Arc<CaptureSink>) {
    let sink = CaptureSink::new();
    let logger = Logger::new(
        config
            .colors(false)
            .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
    )
    .unwrap();
    (logger, sink)
}

/// Runs one request through `logger` with a handler that answers
/// `status`/`body`.
pub fn serve(logger: &Logger, exchange: &mut TestExchange, status: u16, body: &str) {
    logger
        .handle(exchange, |ex| {
            ex.respond(status, body);
            Ok::<_, HandlerError>(())
        })
        .unwrap();
}
