use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Dispatch strategy ─────────────────────────────────────────

/// How pending tasks are matched against free keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStrategy {
    /// Dispatcher thread scans the pending queue and parks until a task is
    /// enqueued or a key is released.
    #[default]
    Notify,
    /// Dispatcher thread scans the pending queue and sleeps a fixed
    /// interval between unproductive passes.
    Poll,
    /// No dispatcher thread: each key owns a FIFO lane and a finishing task
    /// hands its slot straight to the next task in the lane.
    Lanes,
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStrategy::Notify => "notify",
            DispatchStrategy::Poll => "poll",
            DispatchStrategy::Lanes => "lanes",
        };
        f.write_str(name)
    }
}

impl FromStr for DispatchStrategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notify" | "event" => Ok(DispatchStrategy::Notify),
            "poll" => Ok(DispatchStrategy::Poll),
            "lanes" | "reactive" => Ok(DispatchStrategy::Lanes),
            other => Err(SchedulerError::InvalidConfig(format!(
                "unknown dispatch strategy '{other}' (expected notify, poll or lanes)"
            ))),
        }
    }
}

// ── Scheduler config ──────────────────────────────────────────

/// Scheduler configuration. Every field has a serde default, so a partial
/// TOML/JSON document (or an empty one) deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. `None` = derive from host parallelism.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Double the automatic worker count for I/O-bound work.
    #[serde(default)]
    pub io_bound: bool,
    /// Dispatch strategy.
    #[serde(default)]
    pub strategy: DispatchStrategy,
    /// Sleep between unproductive passes for [`DispatchStrategy::Poll`].
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Close the scheduler once a drain completes.
    #[serde(default = "default_shutdown_on_drain")]
    pub shutdown_on_drain: bool,
    /// Worker thread name prefix.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_poll_interval_ms() -> u64 { 20 }
fn default_shutdown_on_drain() -> bool { true }
fn default_thread_name() -> String { "keylane-worker".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            io_bound: false,
            strategy: DispatchStrategy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_on_drain: default_shutdown_on_drain(),
            thread_name: default_thread_name(),
        }
    }
}

impl SchedulerConfig {
    /// Config with a fixed pool size and defaults everywhere else.
    pub fn with_workers(worker_threads: usize) -> Self {
        Self {
            worker_threads: Some(worker_threads),
            ..Self::default()
        }
    }

    /// Build config from `KEYLANE_*` environment variables (call
    /// [`load_dotenv`] first). Unset or unparsable values fall back to
    /// defaults; an unknown strategy name is an error.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let defaults = Self::default();
        let strategy = match env_opt("KEYLANE_STRATEGY") {
            Some(s) => s.parse()?,
            None => defaults.strategy,
        };
        let config = Self {
            worker_threads: env_parse("KEYLANE_WORKER_THREADS"),
            io_bound: env_bool("KEYLANE_IO_BOUND", defaults.io_bound),
            strategy,
            poll_interval_ms: env_parse("KEYLANE_POLL_INTERVAL_MS")
                .unwrap_or(defaults.poll_interval_ms),
            shutdown_on_drain: env_bool("KEYLANE_SHUTDOWN_ON_DRAIN", defaults.shutdown_on_drain),
            thread_name: env_opt("KEYLANE_THREAD_NAME").unwrap_or(defaults.thread_name),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.worker_threads == Some(0) {
            return Err(SchedulerError::InvalidConfig(
                "worker_threads must be greater than 0".to_string(),
            ));
        }
        if self.strategy == DispatchStrategy::Poll && self.poll_interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "poll_interval_ms must be greater than 0 for the poll strategy".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve worker thread count. Auto sizing uses available parallelism,
    /// doubled when `io_bound` is set.
    pub fn resolved_worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(n) => n,
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                if self.io_bound { cpus * 2 } else { cpus }
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config:");
        tracing::info!(
            "  workers:     {} ({})",
            self.resolved_worker_threads(),
            if self.worker_threads.is_some() { "fixed" } else if self.io_bound { "auto, io-bound" } else { "auto" }
        );
        tracing::info!("  strategy:    {}", self.strategy);
        tracing::info!("  poll:        {}ms", self.poll_interval_ms);
        tracing::info!("  drain:       {}", if self.shutdown_on_drain { "shutdown" } else { "keep open" });
    }
}
