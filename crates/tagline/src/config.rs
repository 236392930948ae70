//! Logger configuration.
//!
//! [`Config`] is a builder: start from [`Config::new`] (the classic access
//! log defaults) and override what you need. Nothing is validated here;
//! [`Logger::new`](crate::Logger::new) checks the whole configuration at
//! once and refuses to build a logger from an invalid one.
//!
//! The serializable subset lives in [`Settings`], which can be loaded from
//! YAML and applied on top of a `Config`.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tagline::Config;
//!
//! let config = Config::new()
//!     .format("${status} ${method} ${path}\n")
//!     .time_zone("UTC")
//!     .time_interval(Duration::from_millis(250))
//!     .colors(false);
//! assert_eq!(config.format_str(), "${status} ${method} ${path}\n");
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::{LineBuffer, DEFAULT_LINE_LIMIT};
use crate::clock::LOCAL_ZONE;
use crate::color::ColorScheme;
use crate::data::Data;
use crate::error::{ConfigError, Result};
use crate::exchange::Exchange;
use crate::registry::SharedResolver;

/// Classic access log line.
pub const DEFAULT_FORMAT: &str = "[${time}] ${status} - ${latency} ${method} ${path}\n";

/// Hours, minutes and seconds.
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S";

/// How often the cached timestamp is refreshed.
pub const DEFAULT_TIME_INTERVAL: Duration = Duration::from_millis(500);

/// Idle buffers kept by the pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Destination for rendered lines.
///
/// A sink receives one complete line per call and must write it as a unit:
/// concurrent calls may not interleave their bytes.
pub trait Sink: Send + Sync {
    /// Writes one line.
    fn write_line(&self, line: &[u8]) -> io::Result<()>;

    /// Whether this sink is the process's standard output.
    fn is_stdout(&self) -> bool {
        false
    }
}

/// Writes lines to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(line)
    }

    fn is_stdout(&self) -> bool {
        true
    }
}

/// Wraps any writer; a mutex keeps lines whole.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_all(line)
    }
}

/// Decides, before the downstream handler runs, whether a request is logged.
pub type SkipFn = Arc<dyn Fn(&dyn Exchange) -> bool + Send + Sync>;

/// Called after each line is written, with the exchange and the line.
pub type DoneHook = Arc<dyn Fn(&dyn Exchange, &[u8]) + Send + Sync>;

/// Logger configuration builder.
#[derive(Clone)]
pub struct Config {
    pub(crate) skip: Option<SkipFn>,
    pub(crate) done: Option<DoneHook>,
    pub(crate) custom_tags: Vec<(String, SharedResolver)>,
    pub(crate) format: String,
    pub(crate) time_format: String,
    pub(crate) time_zone: String,
    pub(crate) time_interval: Duration,
    pub(crate) output: Arc<dyn Sink>,
    pub(crate) colors: Option<bool>,
    pub(crate) color_scheme: ColorScheme,
    pub(crate) max_line_bytes: usize,
    pub(crate) pool_size: usize,
}

impl Config {
    /// The classic defaults: stdout, automatic colors, [`DEFAULT_FORMAT`].
    pub fn new() -> Self {
        Self {
            skip: None,
            done: None,
            custom_tags: Vec::new(),
            format: DEFAULT_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: LOCAL_ZONE.to_string(),
            time_interval: DEFAULT_TIME_INTERVAL,
            output: Arc::new(StdoutSink),
            colors: None,
            color_scheme: ColorScheme::default(),
            max_line_bytes: DEFAULT_LINE_LIMIT,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Skips logging for requests the predicate accepts.
    pub fn skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Exchange) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    /// Observes each written line.
    pub fn done<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn Exchange, &[u8]) + Send + Sync + 'static,
    {
        self.done = Some(Arc::new(hook));
        self
    }

    /// Adds a custom tag. Custom tags take precedence over built-ins, and a
    /// later tag with the same name replaces an earlier one.
    pub fn custom_tag<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&mut LineBuffer, &Data<'_>, &str) -> Result<usize> + Send + Sync + 'static,
    {
        self.custom_tags.push((name.into(), Arc::new(resolver)));
        self
    }

    /// Adds a custom tag from a shared resolver.
    pub fn custom_resolver(mut self, name: impl Into<String>, resolver: SharedResolver) -> Self {
        self.custom_tags.push((name.into(), resolver));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the strftime layout of `${time}`.
    pub fn time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = format.into();
        self
    }

    /// Sets the zone of `${time}`: `Local` or an IANA name such as `UTC`.
    pub fn time_zone(mut self, zone: impl Into<String>) -> Self {
        self.time_zone = zone.into();
        self
    }

    /// Sets how often the cached timestamp is refreshed.
    pub fn time_interval(mut self, interval: Duration) -> Self {
        self.time_interval = interval;
        self
    }

    /// Sets the sink.
    pub fn output<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.output = Arc::new(sink);
        self
    }

    /// Sets a shared sink, keeping a handle for the caller.
    pub fn shared_output(mut self, sink: Arc<dyn Sink>) -> Self {
        self.output = sink;
        self
    }

    /// Writes lines to any [`Write`] implementation.
    pub fn writer<W: Write + Send + 'static>(self, writer: W) -> Self {
        self.output(WriterSink::new(writer))
    }

    /// Forces colors on or off. By default they are on only for a
    /// color-capable stdout.
    pub fn colors(mut self, enabled: bool) -> Self {
        self.colors = Some(enabled);
        self
    }

    pub fn color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = scheme;
        self
    }

    /// Sets the hard size limit of one line.
    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    /// Sets how many idle buffers the pool keeps.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn format_str(&self) -> &str {
        &self.format
    }

    pub fn time_format_str(&self) -> &str {
        &self.time_format
    }

    pub fn time_zone_str(&self) -> &str {
        &self.time_zone
    }

    pub fn interval(&self) -> Duration {
        self.time_interval
    }

    /// Whether `status`, `method` and `error` will be colored.
    pub fn colors_enabled(&self) -> bool {
        self.colors
            .unwrap_or_else(|| self.output.is_stdout() && console::colors_enabled())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("format", &self.format)
            .field("time_format", &self.time_format)
            .field("time_zone", &self.time_zone)
            .field("time_interval", &self.time_interval)
            .field("colors", &self.colors)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("pool_size", &self.pool_size)
            .field("custom_tags", &self.custom_tags.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("has_skip", &self.skip.is_some())
            .field("has_done", &self.done.is_some())
            .finish_non_exhaustive()
    }
}

/// The file-loadable part of a [`Config`].
///
/// Every field is optional; missing fields keep the value of the config the
/// settings are applied to.
///
/// ```yaml
/// format: "${time} ${status} ${method} ${url}\n"
/// time_format: "%Y-%m-%dT%H:%M:%S"
/// time_zone: UTC
/// time_interval_ms: 250
/// colors: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub format: Option<String>,
    pub time_format: Option<String>,
    pub time_zone: Option<String>,
    pub time_interval_ms: Option<u64>,
    pub colors: Option<bool>,
    pub color_scheme: Option<ColorScheme>,
    pub max_line_bytes: Option<usize>,
    pub pool_size: Option<usize>,
}

impl Settings {
    /// Parses settings from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed YAML or unknown keys.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read and
    /// [`ConfigError::Yaml`] if it cannot be parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    /// Overrides the fields of `config` that are set here.
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(time_format) = self.time_format {
            config.time_format = time_format;
        }
        if let Some(zone) = self.time_zone {
            config.time_zone = zone;
        }
        if let Some(ms) = self.time_interval_ms {
            config.time_interval = Duration::from_millis(ms);
        }
        if let Some(colors) = self.colors {
            config.colors = Some(colors);
        }
        if let Some(scheme) = self.color_scheme {
            config.color_scheme = scheme;
        }
        if let Some(limit) = self.max_line_bytes {
            config.max_line_bytes = limit;
        }
        if let Some(size) = self.pool_size {
            config.pool_size = size;
        }
        config
    }
}
