//! The per-request snapshot handed to tag resolvers.

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

use crate::exchange::{Exchange, Locals};

/// Read-only view of one finished request.
///
/// Built once after the downstream handler returns, rendered once, then
/// dropped. Every field borrows from the host's [`Exchange`] or from the
/// logger, so capturing a snapshot does not copy headers or bodies.
#[derive(Clone, Copy)]
pub struct Data<'a> {
    /// Process id of the server.
    pub pid: u32,
    /// Request method.
    pub method: &'a Method,
    /// Request target as received.
    pub uri: &'a Uri,
    /// Matched route pattern.
    pub route: &'a str,
    /// `https` for TLS requests, `http` otherwise.
    pub protocol: &'static str,
    /// Response status.
    pub status: StatusCode,
    /// Time spent in the downstream handler.
    pub latency: Duration,
    /// Peer address.
    pub remote_addr: Option<SocketAddr>,
    /// Request headers.
    pub request_headers: &'a HeaderMap,
    /// Response headers.
    pub response_headers: &'a HeaderMap,
    /// Buffered request body.
    pub request_body: &'a [u8],
    /// Buffered response body.
    pub response_body: &'a [u8],
    /// Bytes received from the client.
    pub bytes_received: usize,
    /// Bytes sent to the client.
    pub bytes_sent: usize,
    /// Per-request key/value store.
    pub locals: &'a Locals,
    /// Error returned by the downstream handler.
    pub error: Option<&'a dyn fmt::Display>,
    /// Cached formatted time; empty when the format has no `${time}`.
    pub timestamp: &'a str,
    /// The host context itself, for custom tags that need more.
    pub exchange: &'a dyn Exchange,
}

impl<'a> Data<'a> {
    /// Captures a snapshot from a finished exchange.
    pub fn capture(
        exchange: &'a dyn Exchange,
        pid: u32,
        latency: Duration,
        error: Option<&'a dyn fmt::Display>,
        timestamp: &'a str,
    ) -> Self {
        Self {
            pid,
            method: exchange.method(),
            uri: exchange.uri(),
            route: exchange.route(),
            protocol: if exchange.is_tls() { "https" } else { "http" },
            status: exchange.status(),
            latency,
            remote_addr: exchange.remote_addr(),
            request_headers: exchange.request_headers(),
            response_headers: exchange.response_headers(),
            request_body: exchange.request_body(),
            response_body: exchange.response_body(),
            bytes_received: exchange.bytes_received(),
            bytes_sent: exchange.bytes_sent(),
            locals: exchange.locals(),
            error,
            timestamp,
            exchange,
        }
    }

    /// Request path without the query string.
    pub fn path(&self) -> &'a str {
        self.uri.path()
    }

    /// Raw query string, empty if there is none.
    pub fn query(&self) -> &'a str {
        self.uri.query().unwrap_or("")
    }

    /// Path and query as received.
    pub fn original_url(&self) -> &'a str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// The `Host` header, falling back to the URI authority.
    pub fn host(&self) -> &'a str {
        self.request_header(http::header::HOST.as_str())
            .or_else(|| self.uri.host())
            .unwrap_or("")
    }

    /// First value of a request header, if present and valid UTF-8.
    pub fn request_header(&self, name: &str) -> Option<&'a str> {
        header_str(self.request_headers, name)
    }

    /// First value of a response header, if present and valid UTF-8.
    pub fn response_header(&self, name: &str) -> Option<&'a str> {
        header_str(self.response_headers, name)
    }

    /// Decoded value of the first query parameter called `name`.
    pub fn query_param(&self, name: &str) -> Option<Cow<'a, str>> {
        find_pair(self.query().as_bytes(), name)
    }

    /// Decoded value of a urlencoded form field from the request body.
    ///
    /// Only `application/x-www-form-urlencoded` bodies are parsed.
    pub fn form_value(&self, name: &str) -> Option<Cow<'a, str>> {
        let content_type = header_str(self.request_headers, CONTENT_TYPE.as_str())?;
        let mime = content_type.split(';').next().unwrap_or("").trim();
        if !mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return None;
        }
        find_pair(self.request_body, name)
    }

    /// Value of the request cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&'a str> {
        self.request_headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim_matches('"'))
    }

    /// A value from the per-request store.
    pub fn local(&self, key: &str) -> Option<&'a Value> {
        self.locals.get(key)
    }
}

impl fmt::Debug for Data<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("pid", &self.pid)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("route", &self.route)
            .field("status", &self.status)
            .field("latency", &self.latency)
            .field("remote_addr", &self.remote_addr)
            .field("bytes_received", &self.bytes_received)
            .field("bytes_sent", &self.bytes_sent)
            .field("has_error", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn find_pair<'a>(encoded: &'a [u8], name: &str) -> Option<Cow<'a, str>> {
    form_urlencoded::parse(encoded)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}
