//! Cached timestamp with a background refresher.
//!
//! Formatting the current time on every request is wasted work when a line
//! only shows seconds. [`TimestampCache`] keeps the formatted string behind
//! an [`ArcSwap`], so the hot path is one atomic load, and a task started
//! by [`spawn_refresher`] replaces it on a fixed interval. Readers
//! always see a complete string: a refresh publishes a new `Arc<String>`
//! rather than editing the old one.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arc_swap::{ArcSwap, Guard};
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};
use chrono_tz::Tz;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;

/// Zone name that selects the host's local time.
pub const LOCAL_ZONE: &str = "Local";

/// Time zone used to format timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// The host's local time zone.
    Local,
    /// A named IANA zone, including `UTC`.
    Named(Tz),
}

impl Zone {
    /// Parses `Local` or an IANA zone name. An empty name means UTC.
    ///
    /// Names are matched exactly; surrounding whitespace is an error.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            LOCAL_ZONE => Ok(Zone::Local),
            "" => Ok(Zone::Named(Tz::UTC)),
            _ => name
                .parse::<Tz>()
                .map(Zone::Named)
                .map_err(|_| ConfigError::InvalidTimeZone(name.to_string())),
        }
    }
}

/// Checks a strftime format for unknown specifiers.
pub fn validate_time_format(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimeFormat(format.to_string()));
    }
    Ok(())
}

/// The current time, formatted and shared.
#[derive(Debug)]
pub struct TimestampCache {
    current: ArcSwap<String>,
    generation: AtomicU64,
    zone: Zone,
    format: String,
}

impl TimestampCache {
    /// Creates a cache and fills it with the current time.
    pub fn new(zone: Zone, format: impl Into<String>) -> Result<Self, ConfigError> {
        let format = format.into();
        validate_time_format(&format)?;

        let first = format_now(zone, &format);
        Ok(Self {
            current: ArcSwap::from_pointee(first),
            generation: AtomicU64::new(1),
            zone,
            format,
        })
    }

    /// The most recently published timestamp.
    pub fn load(&self) -> Guard<Arc<String>> {
        self.current.load()
    }

    /// Formats the current time and publishes it.
    pub fn refresh(&self) {
        self.current.store(Arc::new(format_now(self.zone, &self.format)));
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of values published so far, including the initial one.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

fn format_now(zone: Zone, format: &str) -> String {
    let mut out = String::with_capacity(32);
    let result = match zone {
        Zone::Local => write!(out, "{}", Local::now().format(format)),
        Zone::Named(tz) => write!(out, "{}", Utc::now().with_timezone(&tz).format(format)),
    };
    if result.is_err() {
        out.clear();
    }
    out
}

/// Handle to a running refresh task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Refresher {
    token: CancellationToken,
    task: Option<Task>,
}

#[derive(Debug)]
enum Task {
    /// Spawned on the caller's tokio runtime.
    Runtime(JoinHandle<()>),
    /// Runs on its own thread with a private current-thread runtime.
    Thread(thread::JoinHandle<()>),
}

impl Refresher {
    /// Signals the task to stop. Returns immediately.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Stops the task and waits for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        match self.task.take() {
            Some(Task::Runtime(task)) => {
                let _ = task.await;
            }
            Some(Task::Thread(handle)) => {
                let _ = tokio::task::spawn_blocking(move || handle.join()).await;
            }
            None => {}
        }
    }

    /// Returns true if the task runs on a dedicated thread.
    pub fn is_threaded(&self) -> bool {
        matches!(self.task, Some(Task::Thread(_)))
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        match &self.task {
            Some(Task::Runtime(task)) => task.is_finished(),
            Some(Task::Thread(handle)) => handle.is_finished(),
            None => true,
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts a task that refreshes `cache` every `every`.
///
/// Inside a tokio runtime the task is spawned on it. Elsewhere a dedicated
/// thread drives the same loop on a current-thread runtime, so synchronous
/// hosts get a refresher too.
///
/// # Errors
///
/// [`ConfigError::InvalidInterval`] for a zero interval and
/// [`ConfigError::Refresher`] if the thread or its runtime cannot start.
pub fn spawn_refresher(cache: Arc<TimestampCache>, every: Duration) -> Result<Refresher, ConfigError> {
    if every.is_zero() {
        return Err(ConfigError::InvalidInterval);
    }

    let token = CancellationToken::new();
    let cancelled = token.clone();
    let task = match Handle::try_current() {
        Ok(runtime) => Task::Runtime(runtime.spawn(refresh_loop(cache, every, cancelled))),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(ConfigError::Refresher)?;
            let handle = thread::Builder::new()
                .name("tagline-clock".to_string())
                .spawn(move || runtime.block_on(refresh_loop(cache, every, cancelled)))
                .map_err(ConfigError::Refresher)?;
            Task::Thread(handle)
        }
    };

    Ok(Refresher {
        token,
        task: Some(task),
    })
}

async fn refresh_loop(cache: Arc<TimestampCache>, every: Duration, cancelled: CancellationToken) {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(interval = ?every, "timestamp refresher started");

    loop {
        tokio::select! {
            _ = cancelled.cancelled() => break,
            _ = tick.tick() => cache.refresh(),
        }
    }

    tracing::debug!("timestamp refresher stopped");
}
