//! Default values for every configuration key.
//!
//! The throttle and timer constants are the documented defaults of the
//! positioning engine; every one of them can be overridden in `config.ini`.

use std::path::PathBuf;

/// Default geolocate endpoint (Google/MLS compatible request format).
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/geolocation/v1/geolocate";

/// Starting (and minimum) interval between online lookups.
pub const DEFAULT_BASE_INTERVAL_SECS: u64 = 10;

/// Upper bound for the adaptive lookup interval.
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 300;

/// Amount the adaptive interval moves per lookup.
pub const DEFAULT_INTERVAL_STEP_SECS: u64 = 10;

/// Lookups spaced closer than this on average grow the interval.
pub const DEFAULT_TARGET_INTERVAL_SECS: u64 = 30;

/// Number of recent lookup timestamps kept for rate estimation.
pub const DEFAULT_QUERY_HISTORY_SIZE: usize = 10;

/// Lookups are suppressed this long after the service rejects the API key.
pub const DEFAULT_KEY_FAILURE_COOLDOWN_SECS: u64 = 3600;

/// Maximum time to wait for a lookup reply.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 20;

/// Grace period before positioning is released once no client is left.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Time without a new fix before the status drops back to acquiring.
pub const DEFAULT_FIX_LOST_TIMEOUT_SECS: u64 = 30;

/// Update interval used when no client asked for one.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 10_000;

/// Smallest update interval a client may request.
pub const DEFAULT_MINIMUM_UPDATE_INTERVAL_MS: u64 = 1_000;

/// Default log file name.
pub const DEFAULT_LOG_FILE_NAME: &str = "cellfix.log";

/// Get the path to the config directory (~/.cellfix).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cellfix")
}

/// Get the path to the config file (~/.cellfix/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default log file location (~/.cellfix/cellfix.log).
pub fn default_log_file() -> PathBuf {
    config_directory().join(DEFAULT_LOG_FILE_NAME)
}
