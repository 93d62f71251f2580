//! Randomized delivery gaps
//!
//! Per-client timers start at a uniform random phase within one interval and
//! then wait gaps drawn from `Normal(interval, σ)`. Every gap is clamped to
//! `[0, interval + max_deviation]`.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};

use super::config::SchedulerConfig;

/// Gap generator for per-client timers
#[derive(Debug, Clone)]
pub struct Jitter {
    interval: Duration,
    normal: Option<Normal<f64>>,
    max_gap: Duration,
}

impl Jitter {
    /// Create a generator
    ///
    /// `ratio` is the standard deviation as a fraction of `interval`; zero
    /// disables jitter so every gap equals `interval`.
    pub fn new(interval: Duration, ratio: f64, max_deviation: Option<Duration>) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Config("delivery interval must be non-zero".into()));
        }
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(Error::Config(format!(
                "jitter ratio must be a non-negative number, got {}",
                ratio
            )));
        }

        let mean = interval.as_nanos() as f64;
        let std_dev = mean * ratio;

        let normal = if std_dev > 0.0 {
            Some(Normal::new(mean, std_dev).map_err(|e| Error::Config(e.to_string()))?)
        } else {
            None
        };

        let bound = max_deviation.unwrap_or_else(|| Duration::from_nanos((std_dev * 3.0) as u64));

        Ok(Self {
            interval,
            normal,
            max_gap: interval.saturating_add(bound),
        })
    }

    /// Create a generator from scheduler configuration
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Self::new(config.interval, config.jitter_ratio, config.max_deviation)
    }

    /// Base interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Longest gap this generator can return
    pub fn max_gap(&self) -> Duration {
        self.max_gap
    }

    /// Delay before a client's first delivery, uniform in `[0, interval)`
    pub fn initial_phase<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let interval = u64::try_from(self.interval.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rng.gen_range(0..interval))
    }

    /// Delay between two deliveries to the same client
    pub fn next_gap<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match &self.normal {
            Some(normal) => {
                let max = self.max_gap.as_nanos() as f64;
                let nanos = normal.sample(rng).clamp(0.0, max);
                Duration::from_nanos(nanos as u64).min(self.max_gap)
            }
            None => self.interval,
        }
    }
}
