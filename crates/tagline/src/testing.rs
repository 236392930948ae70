//! In-crate test double for [`Exchange`].

use std::net::SocketAddr;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde_json::Value;

use crate::data::Data;
use crate::exchange::{Exchange, Locals};

pub(crate) struct TestExchange {
    pub method: Method,
    pub uri: Uri,
    pub route: Option<String>,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub status: StatusCode,
    pub remote_addr: Option<SocketAddr>,
    pub request_body: Vec<u8>,
    pub response_body: Vec<u8>,
    pub locals: Locals,
}

impl TestExchange {
    pub fn get(uri: &str) -> Self {
        Self {
            method: Method::GET,
            uri: uri.parse().unwrap(),
            route: None,
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            status: StatusCode::OK,
            remote_addr: Some("0.0.0.0:0".parse().unwrap()),
            request_body: Vec::new(),
            response_body: Vec::new(),
            locals: Locals::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).unwrap();
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.request_headers
            .append(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
        self
    }

    pub fn with_response_header(mut self, name: &'static str, value: &str) -> Self {
        self.response_headers
            .append(HeaderName::from_static(name), HeaderValue::from_str(value).unwrap());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.request_body = body.as_bytes().to_vec();
        self
    }

    pub fn with_response_body(mut self, body: &str) -> Self {
        self.response_body = body.as_bytes().to_vec();
        self
    }

    pub fn with_local(mut self, key: &str, value: Value) -> Self {
        self.locals.insert(key.to_string(), value);
        self
    }

    pub fn with_remote(mut self, addr: &str) -> Self {
        self.remote_addr = Some(addr.parse().unwrap());
        self
    }

    pub fn with_route(mut self, route: &str) -> Self {
        self.route = Some(route.to_string());
        self
    }

    /// Snapshot with a fixed pid, zero latency and no timestamp.
    pub fn data(&self) -> Data<'_> {
        Data::capture(self, 4242, Duration::ZERO, None, "")
    }
}

impl Exchange for TestExchange {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn route(&self) -> &str {
        self.route.as_deref().unwrap_or_else(|| self.uri.path())
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
