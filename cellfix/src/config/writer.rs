//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let api_key = config.online.api_key.as_deref().unwrap_or("");
    let scan_file = config
        .scan
        .file
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[positioning]
; Master switch. When off the provider reports Unavailable and never looks up.
enabled = {}
; Resolve visible cells through the local cell location cache
cell_enabled = {}
; Ask the online geolocation service about unknown cells and access points
online_enabled = {}

[permissions]
; Cell tower identifiers may be sent to the online service
cellular_data_allowed = {}
; WLAN access point identifiers may be sent to the online service
wlan_data_allowed = {}

[online]
; API key for the geolocation service. Online lookups are skipped without one.
api_key = {}
; Geolocate endpoint (Google / Mozilla Location Service request format)
endpoint = {}
; Accept a location-area estimate when the cell itself is unknown
fallback_lacf = {}
; Accept an IP-address based estimate
fallback_ipf = {}
; Seconds to wait for a reply before giving up
reply_timeout_secs = {}
; Seconds to stop sending lookups after the key is rejected
key_failure_cooldown_secs = {}
; Adaptive lookup interval: starts at base, grows by step up to max while
; lookups are requested more often than the target interval on average
base_interval_secs = {}
max_interval_secs = {}
interval_step_secs = {}
target_interval_secs = {}
; Number of recent lookup timestamps used for the rate estimate
history_size = {}

[timers]
; Seconds positioning keeps running after the last client leaves
idle_timeout_secs = {}
; Seconds without a new fix before Available drops back to Acquiring
; (never less than twice the update interval)
fix_lost_timeout_secs = {}
; Update interval used when no client asked for one (milliseconds)
default_update_interval_ms = {}
; Smallest update interval a client may request (milliseconds)
minimum_update_interval_ms = {}
; Exit the daemon when the idle timer expires
exit_on_idle = {}

[scan]
; JSON file with visible cells and access points, re-read on every scan.
; Leave empty when cell data comes from a modem.
file = {}

[logging]
; Log file location
file = {}
"#,
        config.positioning.enabled,
        config.positioning.cell_enabled,
        config.positioning.online_enabled,
        config.permissions.cellular_data_allowed,
        config.permissions.wlan_data_allowed,
        api_key,
        config.online.endpoint,
        config.online.fallback_lacf,
        config.online.fallback_ipf,
        config.online.reply_timeout_secs,
        config.online.key_failure_cooldown_secs,
        config.online.base_interval_secs,
        config.online.max_interval_secs,
        config.online.interval_step_secs,
        config.online.target_interval_secs,
        config.online.history_size,
        config.timers.idle_timeout_secs,
        config.timers.fix_lost_timeout_secs,
        config.timers.default_update_interval_ms,
        config.timers.minimum_update_interval_ms,
        config.timers.exit_on_idle,
        scan_file,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
