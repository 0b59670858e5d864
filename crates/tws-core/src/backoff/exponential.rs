use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::Backoff;

/// Exponential backoff curve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// First wait after a reset.
    pub initial_interval: Duration,
    /// Growth factor applied after every wait.
    pub multiplier: f64,
    /// Ceiling for the (pre-jitter) interval.
    pub max_interval: Duration,
    /// Jitter: each wait is drawn from `interval * [1 - f, 1 + f]`. 0 disables it.
    pub randomization_factor: f64,
    /// Give up once this much time has passed since the last reset.
    pub max_elapsed_time: Option<Duration>,
    /// Give up after this many waits since the last reset.
    pub max_retries: Option<u32>,
}

impl BackoffConfig {
    /// Curve for HTTP 503: 5s doubling up to 320s.
    pub fn standard() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            multiplier: 2.0,
            max_interval: Duration::from_secs(320),
            randomization_factor: 0.5,
            max_elapsed_time: Some(Duration::from_secs(15 * 60)),
            max_retries: None,
        }
    }

    /// Curve for HTTP 429/420: one minute doubling up to 16 minutes.
    pub fn aggressive() -> Self {
        Self {
            initial_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_interval: Duration::from_secs(16 * 60),
            randomization_factor: 0.5,
            max_elapsed_time: Some(Duration::from_secs(15 * 60)),
            max_retries: None,
        }
    }
}

/// Exponential backoff with optional jitter and two stop conditions
/// (elapsed time, retry count).
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current: Duration,
    retries: u32,
    started: Instant,
    rng: StdRng,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Same as `new` but with a reproducible jitter sequence.
    pub fn with_seed(config: BackoffConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: BackoffConfig, rng: StdRng) -> Self {
        Self {
            config,
            current: config.initial_interval,
            retries: 0,
            started: Instant::now(),
            rng,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Pre-jitter interval the next call will be based on.
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    fn jittered(&mut self, interval: Duration) -> Duration {
        let factor = self.config.randomization_factor.clamp(0.0, 1.0);
        if factor == 0.0 {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = secs * factor;
        Duration::from_secs_f64(self.rng.gen_range((secs - delta)..=(secs + delta)))
    }

    fn grow(&mut self) {
        let max = self.config.max_interval;
        let next = self.current.as_secs_f64() * self.config.multiplier;
        self.current = if !next.is_finite() || next >= max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(next.max(0.0))
        };
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max) = self.config.max_retries {
            if self.retries >= max {
                return None;
            }
        }
        let wait = self.jittered(self.current);
        if let Some(max_elapsed) = self.config.max_elapsed_time {
            if self.started.elapsed() + wait > max_elapsed {
                return None;
            }
        }
        self.grow();
        self.retries += 1;
        Some(wait)
    }

    fn reset(&mut self) {
        self.current = self.config.initial_interval;
        self.retries = 0;
        self.started = Instant::now();
    }
}
