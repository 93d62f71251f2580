//! Persistence configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "LogReply.csv";

/// Where the latency log is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Always the same file, appended across runs
    Fixed(PathBuf),
    /// A new file per run inside `dir`, named from the run start time and
    /// payload size
    PerRun {
        /// Directory holding the per-run files
        dir: PathBuf,
    },
}

impl LogTarget {
    /// Resolve the file path for a run
    pub fn resolve(&self, started_at: DateTime<Utc>, payload_size: usize) -> PathBuf {
        match self {
            LogTarget::Fixed(path) => path.clone(),
            LogTarget::PerRun { dir } => dir.join(format!(
                "latency_{}_{}b.csv",
                started_at.format("%Y%m%dT%H%M%S"),
                payload_size
            )),
        }
    }
}

impl Default for LogTarget {
    fn default() -> Self {
        LogTarget::Fixed(PathBuf::from(DEFAULT_LOG_FILE))
    }
}

/// What to do when the latency log cannot be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the error, drop the batch, keep benchmarking
    #[default]
    LogAndContinue,
    /// Stop the writer with the error, ending the run
    Fatal,
}

/// Persistence configuration options
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Log file location
    pub target: LogTarget,

    /// Time between flushes
    pub flush_interval: Duration,

    /// Delay before the first flush
    pub initial_delay: Duration,

    /// Behavior on write failure
    pub failure_policy: FailurePolicy,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::default(),
            flush_interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(10),
            failure_policy: FailurePolicy::LogAndContinue,
        }
    }
}

impl PersistenceConfig {
    /// Append to a fixed file
    pub fn fixed_file(mut self, path: impl AsRef<Path>) -> Self {
        self.target = LogTarget::Fixed(path.as_ref().to_path_buf());
        self
    }

    /// Write a new file per run inside `dir`
    pub fn per_run(mut self, dir: impl AsRef<Path>) -> Self {
        self.target = LogTarget::PerRun {
            dir: dir.as_ref().to_path_buf(),
        };
        self
    }

    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the failure policy
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Check the values a writer can run with
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(Error::Config("flush interval must be non-zero".into()));
        }
        Ok(())
    }
}
