//! Provider timer configuration.

use std::time::Duration;

use crate::config::{
    DEFAULT_FIX_LOST_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MINIMUM_UPDATE_INTERVAL_MS,
    DEFAULT_UPDATE_INTERVAL_MS,
};

/// Timer durations and lifecycle policy of the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Grace period after the last client reference is released.
    pub idle_timeout: Duration,
    /// Time without a new fix before Available drops to Acquiring.
    pub fix_lost_timeout: Duration,
    /// Recalculation interval when no client requested one.
    pub default_update_interval: Duration,
    /// Lower bound for client requested intervals.
    pub minimum_update_interval: Duration,
    /// Stop the daemon when the idle timer expires.
    pub exit_on_idle: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            fix_lost_timeout: Duration::from_secs(DEFAULT_FIX_LOST_TIMEOUT_SECS),
            default_update_interval: Duration::from_millis(DEFAULT_UPDATE_INTERVAL_MS),
            minimum_update_interval: Duration::from_millis(DEFAULT_MINIMUM_UPDATE_INTERVAL_MS),
            exit_on_idle: false,
        }
    }
}

impl ProviderConfig {
    /// Fix-lost timeout for an update interval.
    ///
    /// Never shorter than two update intervals, otherwise a slow client
    /// would see the fix drop between two regular recalculations.
    pub fn fix_lost_timeout_for(&self, update_interval: Duration) -> Duration {
        self.fix_lost_timeout.max(update_interval * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_lost_timeout_for() {
        let config = ProviderConfig::default();
        assert_eq!(
            config.fix_lost_timeout_for(Duration::from_secs(5)),
            Duration::from_secs(30)
        );
        assert_eq!(
            config.fix_lost_timeout_for(Duration::from_secs(60)),
            Duration::from_secs(120)
        );
    }
}
