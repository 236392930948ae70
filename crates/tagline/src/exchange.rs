//! The host's view of one request/response pair.
//!
//! The logger does not own an HTTP server. Whatever framework hosts it
//! implements [`Exchange`] for its per-request context, and the logger reads
//! everything it renders through that trait.

use std::net::SocketAddr;

use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

/// Per-request key/value store shared between handlers.
///
/// Values are JSON values so handlers can store strings, numbers, booleans
/// or structured data without the logger knowing their Rust types.
pub type Locals = serde_json::Map<String, Value>;

/// Locals key under which request-id middleware stores the request id.
pub const REQUEST_ID_KEY: &str = "requestid";

/// Request/response state exposed by the host for logging.
///
/// All accessors are read after the downstream handler has run, so status,
/// response headers and body reflect the final outcome.
pub trait Exchange {
    /// The request method.
    fn method(&self) -> &Method;

    /// The request target as received, including the query string.
    fn uri(&self) -> &Uri;

    /// The route pattern that matched, such as `/users/:id`.
    ///
    /// Hosts without a router report the request path.
    fn route(&self) -> &str {
        self.uri().path()
    }

    /// Whether the request arrived over TLS.
    fn is_tls(&self) -> bool {
        self.uri().scheme() == Some(&http::uri::Scheme::HTTPS)
    }

    /// Request headers.
    fn request_headers(&self) -> &HeaderMap;

    /// Response headers.
    fn response_headers(&self) -> &HeaderMap;

    /// The response status.
    fn status(&self) -> StatusCode;

    /// The peer address, if known.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// The request body, as far as the host buffered it.
    fn request_body(&self) -> &[u8];

    /// The response body, as far as the host buffered it.
    fn response_body(&self) -> &[u8];

    /// The per-request key/value store.
    fn locals(&self) -> &Locals;

    /// Bytes received from the client.
    fn bytes_received(&self) -> usize {
        self.request_body().len()
    }

    /// Bytes sent to the client.
    fn bytes_sent(&self) -> usize {
        self.response_body().len()
    }
}

/// Writes a local value the way a log line shows it.
///
/// - strings: verbatim, without quotes
/// - numbers and booleans: their natural string form (`55`, `1.5`, `true`)
/// - null: nothing
/// - arrays and objects: compact JSON
pub fn format_local(value: &Value, out: &mut crate::LineBuffer) -> crate::error::Result<usize> {
    match value {
        Value::String(s) => out.write_str(s),
        Value::Number(n) => write!(out, "{}", n),
        Value::Bool(b) => write!(out, "{}", b),
        Value::Null => Ok(0),
        Value::Array(_) | Value::Object(_) => write!(out, "{}", value),
    }
}
