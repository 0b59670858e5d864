//! Reconnect backoff policies.
//!
//! A session keeps two independent curves: a standard one for transient
//! unavailability (503) and an aggressive one for explicit rate limiting
//! (429 and the nonstandard 420). Both are reset whenever a stream response
//! is received.

mod exponential;

pub use exponential::{BackoffConfig, ExponentialBackoff};

use std::time::Duration;

/// Stateful generator of wait durations between reconnect attempts.
pub trait Backoff: Send {
    /// Next wait, or `None` when retrying should stop.
    fn next_backoff(&mut self) -> Option<Duration>;

    /// Return to the initial interval.
    fn reset(&mut self);
}

/// Parameters for both curves of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffSettings {
    pub standard: BackoffConfig,
    pub aggressive: BackoffConfig,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            standard: BackoffConfig::standard(),
            aggressive: BackoffConfig::aggressive(),
        }
    }
}

impl BackoffSettings {
    /// Fresh policy instances for one session.
    pub fn build(&self) -> BackoffPolicies {
        BackoffPolicies {
            standard: Box::new(ExponentialBackoff::new(self.standard)),
            aggressive: Box::new(ExponentialBackoff::new(self.aggressive)),
        }
    }
}

/// The two live policies owned by a session's stream thread.
pub struct BackoffPolicies {
    pub standard: Box<dyn Backoff>,
    pub aggressive: Box<dyn Backoff>,
}

impl Default for BackoffPolicies {
    fn default() -> Self {
        BackoffSettings::default().build()
    }
}

impl BackoffPolicies {
    pub fn reset_all(&mut self) {
        self.standard.reset();
        self.aggressive.reset();
    }
}
