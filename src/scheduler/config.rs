//! Scheduler configuration

use std::time::Duration;

/// How deliveries are timed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingMode {
    /// One timer for everyone; each tick shares a single message
    #[default]
    GlobalTick,
    /// One timer per client with random phase and Gaussian jitter; each
    /// firing builds its own message
    PerClientJitter,
}

/// Scheduler configuration options
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timing policy
    pub mode: SchedulingMode,

    /// Base delivery interval
    pub interval: Duration,

    /// Standard deviation of per-client gaps, as a fraction of `interval`
    pub jitter_ratio: f64,

    /// Largest amount a gap may exceed `interval` (None = three standard
    /// deviations)
    pub max_deviation: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::GlobalTick,
            interval: Duration::from_secs(1),
            jitter_ratio: 0.1,
            max_deviation: None,
        }
    }
}

impl SchedulerConfig {
    /// Set the scheduling mode
    pub fn mode(mut self, mode: SchedulingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the base interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the jitter standard deviation ratio
    pub fn jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    /// Set the maximum gap overshoot
    pub fn max_deviation(mut self, deviation: Duration) -> Self {
        self.max_deviation = Some(deviation);
        self
    }
}
