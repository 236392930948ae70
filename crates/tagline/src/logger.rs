//! The request pipeline adapter.
//!
//! A [`Logger`] wraps one downstream handler call per request:
//!
//! 1. The skip predicate decides whether the request is logged at all.
//! 2. A start instant is taken and the handler runs.
//! 3. A [`Data`] snapshot is captured from the finished exchange.
//! 4. The compiled template renders into a pooled buffer.
//! 5. The line goes to the sink, then to the done hook.
//! 6. The handler's result is returned unchanged.
//!
//! Steps 3 to 5 never affect the handler's result. Render and sink failures
//! are counted and traced, nothing more. A line whose render fails still
//! reaches the sink: whatever rendered before the failure, followed by the
//! error text.
//!
//! Synchronous hosts call [`Logger::handle`]. Hosts whose handlers are async
//! call [`Logger::start`] before awaiting the handler and
//! [`Pending::finish`] after it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::buffer::{BufferPool, LineBuffer};
use crate::clock::{spawn_refresher, validate_time_format, Refresher, TimestampCache, Zone};
use crate::config::{Config, DoneHook, Sink, SkipFn};
use crate::data::Data;
use crate::error::{ConfigError, RenderError, Result};
use crate::exchange::Exchange;
use crate::registry::TagRegistry;
use crate::tags;
use crate::template::Template;

/// Access logger for one middleware instance.
///
/// Cloning is cheap and every clone shares the same template, pool, sink and
/// counters. The timestamp refresher stops when [`shutdown`](Self::shutdown)
/// is called or the last clone is dropped.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

struct Inner {
    template: Template,
    pool: BufferPool,
    sink: Arc<dyn Sink>,
    skip: Option<SkipFn>,
    done: Option<DoneHook>,
    clock: Option<Arc<TimestampCache>>,
    refresher: Option<Refresher>,
    pid: u32,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    lines_written: AtomicU64,
    write_errors: AtomicU64,
    render_errors: AtomicU64,
    skipped: AtomicU64,
}

impl Logger {
    /// Validates `config` and builds a logger.
    ///
    /// The time zone, time format and interval are checked even when the
    /// format has no `${time}`. The refresher is started only when it does:
    /// on the current tokio runtime if there is one, otherwise on a
    /// dedicated thread.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; no logger exists for an invalid configuration.
    pub fn new(config: Config) -> std::result::Result<Self, ConfigError> {
        let zone = Zone::parse(&config.time_zone)?;
        validate_time_format(&config.time_format)?;
        if config.time_interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }

        let colored = config.colors_enabled();
        let mut registry = TagRegistry::builtin(&config.color_scheme, colored);
        for (name, resolver) in config.custom_tags {
            registry.register_shared(name, resolver);
        }

        let template = Template::compile(&config.format, &registry)?;

        let (clock, refresher) = if template.references(tags::TIME) {
            let cache = Arc::new(TimestampCache::new(zone, config.time_format)?);
            let refresher = spawn_refresher(Arc::clone(&cache), config.time_interval)?;
            (Some(cache), Some(refresher))
        } else {
            (None, None)
        };

        tracing::debug!(
            format = %template.source(),
            colored,
            refresher = refresher.is_some(),
            "access logger configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                template,
                pool: BufferPool::new(config.pool_size, config.max_line_bytes),
                sink: config.output,
                skip: config.skip,
                done: config.done,
                clock,
                refresher,
                pid: std::process::id(),
                counters: Counters::default(),
            }),
        })
    }

    /// Begins logging a request.
    ///
    /// Returns `None` when the skip predicate accepts the request; the
    /// caller then runs its handler without logging.
    pub fn start(&self, exchange: &dyn Exchange) -> Option<Pending<'_>> {
        if let Some(skip) = &self.inner.skip {
            if skip(exchange) {
                self.inner.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }
        Some(Pending {
            logger: self,
            started: Instant::now(),
        })
    }

    /// Runs `next` and logs the exchange it leaves behind.
    ///
    /// The handler's result, error included, is returned unchanged.
    pub fn handle<C, T, E, F>(&self, exchange: &mut C, next: F) -> std::result::Result<T, E>
    where
        C: Exchange,
        E: fmt::Display,
        F: FnOnce(&mut C) -> std::result::Result<T, E>,
    {
        let Some(pending) = self.start(exchange) else {
            return next(exchange);
        };
        let result = next(&mut *exchange);
        pending.finish(exchange, result)
    }

    /// Renders and writes one line for a finished exchange.
    ///
    /// This is the tail of [`handle`](Self::handle), exposed for hosts that
    /// measure latency themselves. On a render failure the partial line and
    /// the error text are still written and passed to the done hook, then
    /// the render error is returned. A sink failure is returned as
    /// [`RenderError::Io`].
    ///
    /// [`RenderError::Io`]: crate::RenderError::Io
    pub fn log(
        &self,
        exchange: &dyn Exchange,
        latency: Duration,
        error: Option<&dyn fmt::Display>,
    ) -> Result<usize> {
        let inner = &*self.inner;
        let timestamp = inner.clock.as_ref().map(|clock| clock.load());
        let data = Data::capture(
            exchange,
            inner.pid,
            latency,
            error,
            timestamp.as_ref().map_or("", |ts| ts.as_str()),
        );

        let mut line = inner.pool.acquire();
        let rendered = inner.template.render(&mut line, &data);
        if let Err(err) = &rendered {
            inner.counters.render_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %err, "failed to render access log line");
            append_error(&mut line, err);
        }

        let written = inner.sink.write_line(line.as_bytes());
        match &written {
            Ok(()) => {
                inner.counters.lines_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                inner.counters.write_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "failed to write access log line");
            }
        }

        if let Some(done) = &inner.done {
            done(exchange, line.as_bytes());
        }

        rendered?;
        written?;
        Ok(line.len())
    }

    /// Stops the timestamp refresher. Lines logged afterwards keep the last
    /// published timestamp.
    pub fn shutdown(&self) {
        if let Some(refresher) = &self.inner.refresher {
            refresher.shutdown();
        }
    }

    /// Lines written to the sink successfully.
    pub fn lines_written(&self) -> u64 {
        self.inner.counters.lines_written.load(Ordering::Relaxed)
    }

    /// Sink writes that failed.
    pub fn write_errors(&self) -> u64 {
        self.inner.counters.write_errors.load(Ordering::Relaxed)
    }

    /// Lines whose render failed. They are still written with the error
    /// text appended.
    pub fn render_errors(&self) -> u64 {
        self.inner.counters.render_errors.load(Ordering::Relaxed)
    }

    /// Requests the skip predicate accepted.
    pub fn skipped(&self) -> u64 {
        self.inner.counters.skipped.load(Ordering::Relaxed)
    }

    /// The compiled template.
    pub fn template(&self) -> &Template {
        &self.inner.template
    }

    /// The timestamp cache, present when the format uses `${time}`.
    pub fn clock(&self) -> Option<&TimestampCache> {
        self.inner.clock.as_deref()
    }

    /// Returns true while a refresher task is running.
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .refresher
            .as_ref()
            .is_some_and(|refresher| !refresher.is_finished())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("template", &self.inner.template.source())
            .field("pid", &self.inner.pid)
            .field("lines_written", &self.lines_written())
            .field("write_errors", &self.write_errors())
            .field("render_errors", &self.render_errors())
            .finish_non_exhaustive()
    }
}

/// Appends the text of a render error, cutting the partial line short if
/// both do not fit under the limit.
fn append_error(line: &mut LineBuffer, err: &RenderError) {
    let message = err.to_string();
    if line.write_str(&message).is_err() {
        line.truncate(line.limit().saturating_sub(message.len()));
        if line.write_str(&message).is_err() {
            line.clear();
        }
    }
}

/// A request being timed.
///
/// Created by [`Logger::start`]; consumed by [`Pending::finish`] once the
/// downstream handler has returned.
#[derive(Debug)]
#[must_use = "a pending request logs nothing until finish is called"]
pub struct Pending<'a> {
    logger: &'a Logger,
    started: Instant,
}

impl Pending<'_> {
    /// Logs the exchange and hands back the handler's result unchanged.
    pub fn finish<T, E>(
        self,
        exchange: &dyn Exchange,
        result: std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: fmt::Display,
    {
        let latency = self.started.elapsed();
        let error = result.as_ref().err().map(|err| err as &dyn fmt::Display);
        // Failures are already counted and traced by `log`.
        let _ = self.logger.log(exchange, latency, error);
        result
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriterSink;
    use crate::testing::TestExchange;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<Vec<u8>>>);

    impl Sink for Lines {
        fn write_line(&self, line: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().push(line.to_vec());
            Ok(())
        }
    }

    impl Lines {
        fn text(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|l| String::from_utf8(l.clone()).unwrap())
                .collect()
        }
    }

    struct Broken;

    impl Sink for Broken {
        fn write_line(&self, _: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn logger(format: &str, sink: Arc<Lines>) -> Logger {
        Logger::new(Config::new().format(format).colors(false).shared_output(sink)).unwrap()
    }

    #[test]
    fn test_no_runtime_needed_without_time() {
        let sink = Arc::new(Lines::default());
        let logger = logger("${status}", Arc::clone(&sink));
        assert!(logger.clock().is_none());
        assert!(!logger.is_refreshing());
    }

    #[test]
    fn test_default_format_without_runtime() {
        let sink = Arc::new(Lines::default());
        let logger = Logger::new(
            Config::new()
                .colors(false)
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();
        assert!(logger.is_refreshing());

        let mut exchange = TestExchange::get("/");
        logger.handle(&mut exchange, |_| Ok::<_, String>(())).unwrap();

        let lines = sink.text();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.starts_with('['), "{line:?}");
        let stamp = &line[1..9];
        assert!(
            chrono::NaiveTime::parse_from_str(stamp, "%H:%M:%S").is_ok(),
            "{line:?}"
        );
        assert!(line[9..].starts_with("] 200 - "), "{line:?}");
        assert!(line.ends_with(" GET /\n"), "{line:?}");

        logger.shutdown();
    }

    #[test]
    fn test_invalid_zone_fails_even_without_time() {
        let err = Logger::new(Config::new().format("${status}").time_zone("invalid")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeZone(_)));
    }

    #[test]
    fn test_zero_interval_fails() {
        let err = Logger::new(Config::new().format("x").time_interval(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval));
    }

    #[test]
    fn test_empty_tag_fails() {
        let err = Logger::new(Config::new().format("${}")).unwrap_err();
        assert!(matches!(err, ConfigError::Template(_)));
    }

    #[test]
    fn test_handle_logs_and_returns_result() {
        let sink = Arc::new(Lines::default());
        let logger = logger("${status} ${method} ${path}", Arc::clone(&sink));
        let mut exchange = TestExchange::get("/test");

        let result: std::result::Result<u8, String> = logger.handle(&mut exchange, |ex| {
            ex.status = http::StatusCode::CREATED;
            Ok(7)
        });

        assert_eq!(result, Ok(7));
        assert_eq!(sink.text(), vec!["201 GET /test"]);
        assert_eq!(logger.lines_written(), 1);
    }

    #[test]
    fn test_error_is_logged_and_propagated() {
        let sink = Arc::new(Lines::default());
        let logger = logger("${error}", Arc::clone(&sink));
        let mut exchange = TestExchange::get("/");

        let result: std::result::Result<(), String> =
            logger.handle(&mut exchange, |_| Err("some random error".to_string()));

        assert_eq!(result, Err("some random error".to_string()));
        assert_eq!(sink.text(), vec!["some random error"]);
    }

    #[test]
    fn test_skip() {
        let sink = Arc::new(Lines::default());
        let logger = Logger::new(
            Config::new()
                .format("${path}")
                .skip(|ex| ex.uri().path() == "/health")
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();

        let mut health = TestExchange::get("/health");
        let mut other = TestExchange::get("/other");
        logger.handle(&mut health, |_| Ok::<_, String>(())).unwrap();
        logger.handle(&mut other, |_| Ok::<_, String>(())).unwrap();

        assert_eq!(sink.text(), vec!["/other"]);
        assert_eq!(logger.skipped(), 1);
    }

    #[test]
    fn test_failing_sink_is_counted() {
        let logger = Logger::new(Config::new().format("${status}").output(Broken)).unwrap();
        let mut exchange = TestExchange::get("/");

        let result = logger.handle(&mut exchange, |_| Ok::<_, String>("served"));

        assert_eq!(result, Ok("served"));
        assert_eq!(logger.write_errors(), 1);
        assert_eq!(logger.lines_written(), 0);
    }

    #[test]
    fn test_oversized_line_keeps_prefix_and_error() {
        let sink = Arc::new(Lines::default());
        let logger = Logger::new(
            Config::new()
                .format("${method} ${path}")
                .max_line_bytes(40)
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();
        let exchange = TestExchange::get("/this/path/is/much/too/long/for/the/limit");

        let err = logger.log(&exchange, Duration::ZERO, None).unwrap_err();
        assert!(err.is_buffer_full());
        assert_eq!(sink.text(), vec!["GET log line exceeds 40 bytes"]);
        assert_eq!(logger.render_errors(), 1);
        assert_eq!(logger.lines_written(), 1);
    }

    #[test]
    fn test_error_text_is_cut_to_fit() {
        let sink = Arc::new(Lines::default());
        let logger = Logger::new(
            Config::new()
                .format("${method} ${path} ${path}")
                .max_line_bytes(30)
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();
        let exchange = TestExchange::get("/abcdefghijkl");

        logger.log(&exchange, Duration::ZERO, None).unwrap_err();
        let lines = sink.text();
        assert_eq!(lines, vec!["GET /log line exceeds 30 bytes"]);
        assert!(lines[0].len() <= 30);
    }

    #[test]
    fn test_done_receives_line() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = Arc::clone(&seen);
        let logger = Logger::new(
            Config::new()
                .format("${method} ${path}")
                .writer(Vec::new())
                .done(move |ex, line| {
                    hook.lock()
                        .unwrap()
                        .push((ex.uri().path().to_string(), line.to_vec()));
                }),
        )
        .unwrap();

        let mut exchange = TestExchange::get("/done");
        logger.handle(&mut exchange, |_| Ok::<_, String>(())).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "/done");
        assert_eq!(seen[0].1, b"GET /done");
    }

    #[test]
    fn test_start_and_finish() {
        let sink = Arc::new(Lines::default());
        let logger = logger("${status}|${error}", Arc::clone(&sink));
        let exchange = TestExchange::get("/").with_status(500);

        let pending = logger.start(&exchange).unwrap();
        let result = pending.finish(&exchange, Err::<(), _>("upstream timeout"));

        assert_eq!(result, Err("upstream timeout"));
        assert_eq!(sink.text(), vec!["500|upstream timeout"]);
    }

    #[test]
    fn test_writer_sink_output() {
        let sink = Arc::new(WriterSink::new(Vec::new()));
        let logger = Logger::new(
            Config::new()
                .format("${url}\n")
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();
        let exchange = TestExchange::get("/?foo=bar");
        assert_eq!(logger.log(&exchange, Duration::ZERO, None).unwrap(), 10);
        drop(logger);
        let sink = Arc::try_unwrap(sink).ok().unwrap();
        assert_eq!(sink.into_inner(), b"/?foo=bar\n");
    }

    #[tokio::test]
    async fn test_time_starts_refresher_and_shutdown_stops_it() {
        let sink = Arc::new(Lines::default());
        let logger = Logger::new(
            Config::new()
                .format("${time}")
                .time_format("%Y")
                .time_zone("UTC")
                .time_interval(Duration::from_millis(5))
                .shared_output(Arc::clone(&sink) as Arc<dyn Sink>),
        )
        .unwrap();
        assert!(logger.is_refreshing());

        let exchange = TestExchange::get("/");
        logger.log(&exchange, Duration::ZERO, None).unwrap();
        assert_eq!(sink.text()[0].len(), 4);

        logger.shutdown();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!logger.is_refreshing());
    }
}
