//! Online locator configuration.

use std::time::Duration;

use reqwest::Url;

use super::error::TransportError;
use crate::config::{
    DEFAULT_BASE_INTERVAL_SECS, DEFAULT_ENDPOINT, DEFAULT_INTERVAL_STEP_SECS,
    DEFAULT_KEY_FAILURE_COOLDOWN_SECS, DEFAULT_MAX_INTERVAL_SECS, DEFAULT_QUERY_HISTORY_SIZE,
    DEFAULT_REPLY_TIMEOUT_SECS, DEFAULT_TARGET_INTERVAL_SECS,
};

/// Endpoint, request flags, throttle constants and reply timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorConfig {
    /// Geolocate endpoint; the API key is appended as `?key=`.
    pub endpoint: String,
    /// Accept a location-area centroid when the cell is unknown.
    pub fallback_lacf: bool,
    /// Accept an IP based estimate.
    pub fallback_ipf: bool,
    /// A lookup without a reply after this long is abandoned.
    pub reply_timeout: Duration,
    /// Lookups are suppressed this long after a key failure.
    pub key_failure_cooldown: Duration,
    /// Starting and minimum adaptive interval.
    pub base_interval: Duration,
    /// Adaptive interval cap.
    pub max_interval: Duration,
    /// Additive step of the interval controller.
    pub interval_step: Duration,
    /// Mean query spacing below which the interval grows.
    pub target_interval: Duration,
    /// Number of query timestamps kept.
    pub history_size: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fallback_lacf: true,
            fallback_ipf: false,
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
            key_failure_cooldown: Duration::from_secs(DEFAULT_KEY_FAILURE_COOLDOWN_SECS),
            base_interval: Duration::from_secs(DEFAULT_BASE_INTERVAL_SECS),
            max_interval: Duration::from_secs(DEFAULT_MAX_INTERVAL_SECS),
            interval_step: Duration::from_secs(DEFAULT_INTERVAL_STEP_SECS),
            target_interval: Duration::from_secs(DEFAULT_TARGET_INTERVAL_SECS),
            history_size: DEFAULT_QUERY_HISTORY_SIZE,
        }
    }
}

impl LocatorConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_key_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.key_failure_cooldown = cooldown;
        self
    }

    /// Full request URL for an API key.
    ///
    /// The key is appended as a percent-encoded `key` query parameter,
    /// keeping any query the endpoint already carries.
    pub fn request_url(&self, api_key: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| TransportError::InvalidUrl {
            url: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}
