//! Error types for the access log formatter.
//!
//! Two families exist, matching the two moments things can go wrong:
//!
//! - [`ConfigError`]: raised once, while building a [`Logger`](crate::Logger).
//!   A logger is never constructed from a configuration that fails here.
//! - [`RenderError`]: raised while rendering a single line. These never reach
//!   the request outcome; the logger counts them and moves on.

use tagline_parser::ParseError;

/// Error raised while rendering one log line.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The line would grow past the buffer's hard limit.
    #[error("log line exceeds {limit} bytes")]
    BufferFull {
        /// The configured maximum line size.
        limit: usize,
    },

    /// A `Display` implementation reported an error.
    #[error("formatting a tag value failed")]
    Format,

    /// A custom resolver failed.
    #[error("tag resolver failed: {0}")]
    Resolver(String),

    /// I/O error inside a resolver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Creates a resolver error from a message.
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver(message.into())
    }

    /// Returns true if the error is the buffer limit being hit.
    pub fn is_buffer_full(&self) -> bool {
        matches!(self, RenderError::BufferFull { .. })
    }
}

/// Error raised while validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The time zone identifier is neither `Local` nor a known IANA zone.
    #[error("invalid time zone: {0:?}")]
    InvalidTimeZone(String),

    /// The time format contains an unknown strftime specifier.
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    /// The refresh interval is zero.
    #[error("time interval must be greater than zero")]
    InvalidInterval,

    /// The format string could not be parsed.
    #[error("invalid format: {0}")]
    Template(#[from] ParseError),

    /// The timestamp refresher thread or its runtime could not start.
    #[error("failed to start the timestamp refresher: {0}")]
    Refresher(#[source] std::io::Error),

    /// A settings file could not be read.
    #[error("failed to load settings: {message}")]
    Load {
        /// What went wrong.
        message: String,
    },

    /// A settings document is not valid YAML for [`Settings`](crate::Settings).
    #[error("invalid settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
