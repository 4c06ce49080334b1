//! Adaptive throttle for online lookups.
//!
//! Keeps the last N query timestamps and a minimum interval between
//! queries. After every query the interval moves one step:
//!
//! ```text
//! mean spacing of window < target   ->  interval = min(interval + step, cap)
//! otherwise                          ->  interval = max(interval - step, base)
//! ```
//!
//! An API key failure suppresses every query until the cooldown has elapsed,
//! regardless of the interval.
//!
//! Time is passed in explicitly so the controller can be driven
//! deterministically from tests.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use super::config::LocatorConfig;

/// Why a query is not permitted right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttled {
    /// A key failure happened less than the cooldown ago.
    KeyCooldown { remaining: Duration },
    /// The previous query is younger than the adaptive interval.
    Interval { remaining: Duration },
}

/// Adaptive query state, owned and mutated only by the online locator.
#[derive(Debug, Clone)]
pub struct AdaptiveThrottle {
    timestamps: VecDeque<Instant>,
    interval: Duration,
    key_failure_at: Option<Instant>,
    base_interval: Duration,
    max_interval: Duration,
    step: Duration,
    target_interval: Duration,
    history_size: usize,
    key_failure_cooldown: Duration,
}

impl AdaptiveThrottle {
    pub fn new(config: &LocatorConfig) -> Self {
        let base_interval = config.base_interval;
        Self {
            timestamps: VecDeque::with_capacity(config.history_size),
            interval: base_interval,
            key_failure_at: None,
            base_interval,
            max_interval: config.max_interval.max(base_interval),
            step: config.interval_step,
            target_interval: config.target_interval,
            history_size: config.history_size.max(2),
            key_failure_cooldown: config.key_failure_cooldown,
        }
    }

    /// Current minimum spacing between queries.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timestamp of the most recent query.
    pub fn last_query(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }

    /// Number of timestamps currently held.
    pub fn history_len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check whether a query may be issued at `now`.
    pub fn check(&self, now: Instant) -> Result<(), Throttled> {
        if let Some(remaining) = self.cooldown_remaining(now) {
            return Err(Throttled::KeyCooldown { remaining });
        }

        if let Some(last) = self.last_query() {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.interval {
                return Err(Throttled::Interval {
                    remaining: self.interval - elapsed,
                });
            }
        }

        Ok(())
    }

    pub fn permits(&self, now: Instant) -> bool {
        self.check(now).is_ok()
    }

    /// Record an issued query and adjust the interval.
    pub fn record_query(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        while self.timestamps.len() > self.history_size {
            self.timestamps.pop_front();
        }

        let previous = self.interval;
        match self.mean_spacing() {
            Some(mean) if mean < self.target_interval => {
                self.interval = (self.interval + self.step).min(self.max_interval);
            }
            Some(_) => {
                self.interval = self
                    .interval
                    .saturating_sub(self.step)
                    .max(self.base_interval);
            }
            None => {}
        }

        if self.interval != previous {
            tracing::debug!(
                from_secs = previous.as_secs_f64(),
                to_secs = self.interval.as_secs_f64(),
                "Adaptive lookup interval changed"
            );
        }
    }

    /// Start the key-failure cooldown.
    pub fn record_key_failure(&mut self, now: Instant) {
        tracing::warn!(
            cooldown_secs = self.key_failure_cooldown.as_secs(),
            "Suspending online lookups after key failure"
        );
        self.key_failure_at = Some(now);
    }

    /// Forget a previous key failure, e.g. after the key changed.
    pub fn clear_key_failure(&mut self) {
        if self.key_failure_at.take().is_some() {
            tracing::info!("Key failure cooldown cleared");
        }
    }

    /// Time left in the key-failure cooldown, if one is active at `now`.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        let failed_at = self.key_failure_at?;
        let elapsed = now.saturating_duration_since(failed_at);
        (elapsed < self.key_failure_cooldown).then(|| self.key_failure_cooldown - elapsed)
    }

    fn mean_spacing(&self) -> Option<Duration> {
        let first = self.timestamps.front()?;
        let last = self.timestamps.back()?;
        let gaps = self.timestamps.len().checked_sub(1).filter(|&n| n > 0)?;
        Some(last.saturating_duration_since(*first) / gaps as u32)
    }
}
