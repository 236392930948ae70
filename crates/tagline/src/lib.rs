//! # Tagline - Access Log Lines for HTTP Pipelines
//!
//! Tagline renders one line per handled request from a format string made of
//! literal text and `${tag}` references:
//!
//! ```text
//! [${time}] ${status} - ${latency} ${method} ${path}
//! ```
//!
//! It provides:
//!
//! - A format compiler that parses the string once, at setup
//! - A registry of built-in tags plus application-defined custom tags
//! - A cached timestamp refreshed by a background tokio task
//! - A render path that writes into pooled, size-limited buffers
//! - A request adapter that times the downstream handler, logs the outcome
//!   and returns the handler's result untouched
//!
//! The host framework stays outside: it implements [`Exchange`] for its
//! request context and calls [`Logger::handle`] (or [`Logger::start`] and
//! [`Pending::finish`] around an async handler).
//!
//! ## Core Concepts
//!
//! - [`Config`]: builder for format, time layout, zone, sink and hooks
//! - [`Logger`]: validated, shareable middleware state
//! - [`TagRegistry`] and [`Resolver`]: tag name to rendering function
//! - [`Template`]: a compiled format string
//! - [`Data`]: the read-only snapshot handed to resolvers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::net::SocketAddr;
//! use http::{HeaderMap, Method, StatusCode, Uri};
//! use tagline::{Config, Exchange, Locals, Logger};
//!
//! struct Request {
//!     method: Method,
//!     uri: Uri,
//!     headers: HeaderMap,
//!     status: StatusCode,
//!     locals: Locals,
//! }
//!
//! impl Exchange for Request {
//!     fn method(&self) -> &Method { &self.method }
//!     fn uri(&self) -> &Uri { &self.uri }
//!     fn request_headers(&self) -> &HeaderMap { &self.headers }
//!     fn response_headers(&self) -> &HeaderMap { &self.headers }
//!     fn status(&self) -> StatusCode { self.status }
//!     fn remote_addr(&self) -> Option<SocketAddr> { None }
//!     fn request_body(&self) -> &[u8] { &[] }
//!     fn response_body(&self) -> &[u8] { b"Hello" }
//!     fn locals(&self) -> &Locals { &self.locals }
//! }
//!
//! let logger = Logger::new(
//!     Config::new()
//!         .format("${status} ${method} ${path} ${bytesSent}\n")
//!         .writer(std::io::sink()),
//! )?;
//!
//! let mut request = Request {
//!     method: Method::GET,
//!     uri: "/hello".parse()?,
//!     headers: HeaderMap::new(),
//!     status: StatusCode::OK,
//!     locals: Locals::new(),
//! };
//! let body = logger.handle(&mut request, |_| Ok::<_, std::io::Error>("Hello"))?;
//! assert_eq!(body, "Hello");
//! assert_eq!(logger.lines_written(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Tags
//!
//! Custom tags are checked before built-ins, so they may replace one:
//!
//! ```rust
//! use tagline::{Config, Data, LineBuffer};
//!
//! let config = Config::new().custom_tag(
//!     "service",
//!     |out: &mut LineBuffer, _: &Data<'_>, _: &str| out.write_str("billing"),
//! );
//! ```
//!
//! Tags the registry does not know render as nothing. A typo in a format
//! string never fails a request.

pub mod buffer;
pub mod clock;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod logger;
pub mod registry;
pub mod tags;
pub mod template;

#[cfg(test)]
mod testing;

pub use buffer::{BufferPool, LineBuffer, PooledBuffer, DEFAULT_LINE_LIMIT};
pub use clock::{spawn_refresher, Refresher, TimestampCache, Zone};
pub use color::ColorScheme;
pub use config::{
    Config, DoneHook, Settings, Sink, SkipFn, StdoutSink, WriterSink, DEFAULT_FORMAT,
    DEFAULT_TIME_FORMAT, DEFAULT_TIME_INTERVAL,
};
pub use data::Data;
pub use error::{ConfigError, RenderError, Result};
pub use exchange::{format_local, Exchange, Locals, REQUEST_ID_KEY};
pub use logger::{Logger, Pending};
pub use registry::{Registration, Resolver, SharedResolver, TagRegistry};
pub use template::{CompiledSegment, Template};

pub use tagline_parser::{ParseError, Segment, TagRef};
