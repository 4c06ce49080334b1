//! Configuration data structures.
//!
//! [`ConfigFile`] mirrors `config.ini` section by section. The engine never
//! reads it directly; it is converted into the runtime snapshots
//! [`PositioningSettings`], [`crate::locator::LocatorConfig`] and
//! [`crate::provider::ProviderConfig`].

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::locator::LocatorConfig;
use crate::provider::ProviderConfig;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub positioning: PositioningSection,
    pub permissions: PermissionsSection,
    pub online: OnlineSection,
    pub timers: TimersSection,
    pub scan: ScanSection,
    pub logging: LoggingSection,
}

/// `[positioning]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PositioningSection {
    /// Master switch for positioning.
    pub enabled: bool,
    /// Resolve cells locally through the cell location cache.
    pub cell_enabled: bool,
    /// Use the online lookup service.
    pub online_enabled: bool,
}

impl Default for PositioningSection {
    fn default() -> Self {
        Self {
            enabled: true,
            cell_enabled: true,
            online_enabled: true,
        }
    }
}

/// `[permissions]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionsSection {
    /// Cell tower ids may be sent to the online service.
    pub cellular_data_allowed: bool,
    /// WLAN access point ids may be sent to the online service.
    pub wlan_data_allowed: bool,
}

impl Default for PermissionsSection {
    fn default() -> Self {
        Self {
            cellular_data_allowed: true,
            wlan_data_allowed: false,
        }
    }
}

/// `[online]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineSection {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Accept a location-area centroid when the cell itself is unknown.
    pub fallback_lacf: bool,
    /// Accept an IP-address based estimate.
    pub fallback_ipf: bool,
    pub reply_timeout_secs: u64,
    pub key_failure_cooldown_secs: u64,
    pub base_interval_secs: u64,
    pub max_interval_secs: u64,
    pub interval_step_secs: u64,
    pub target_interval_secs: u64,
    pub history_size: usize,
}

impl Default for OnlineSection {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fallback_lacf: true,
            fallback_ipf: false,
            reply_timeout_secs: DEFAULT_REPLY_TIMEOUT_SECS,
            key_failure_cooldown_secs: DEFAULT_KEY_FAILURE_COOLDOWN_SECS,
            base_interval_secs: DEFAULT_BASE_INTERVAL_SECS,
            max_interval_secs: DEFAULT_MAX_INTERVAL_SECS,
            interval_step_secs: DEFAULT_INTERVAL_STEP_SECS,
            target_interval_secs: DEFAULT_TARGET_INTERVAL_SECS,
            history_size: DEFAULT_QUERY_HISTORY_SIZE,
        }
    }
}

/// `[timers]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TimersSection {
    pub idle_timeout_secs: u64,
    pub fix_lost_timeout_secs: u64,
    pub default_update_interval_ms: u64,
    pub minimum_update_interval_ms: u64,
    /// Terminate the daemon once the idle timer expires.
    pub exit_on_idle: bool,
}

impl Default for TimersSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            fix_lost_timeout_secs: DEFAULT_FIX_LOST_TIMEOUT_SECS,
            default_update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            minimum_update_interval_ms: DEFAULT_MINIMUM_UPDATE_INTERVAL_MS,
            exit_on_idle: false,
        }
    }
}

/// `[scan]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSection {
    /// JSON scan file used instead of a modem.
    pub file: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    pub file: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

/// Positioning switches, permissions and API key.
///
/// This is the configuration snapshot the provider owns. It is handed over
/// at construction and replaced only through a configuration change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositioningSettings {
    pub positioning_enabled: bool,
    pub cell_positioning_enabled: bool,
    pub online_positioning_enabled: bool,
    pub cellular_data_allowed: bool,
    pub wlan_data_allowed: bool,
    pub api_key: Option<String>,
}

impl Default for PositioningSettings {
    fn default() -> Self {
        ConfigFile::default().positioning_settings()
    }
}

impl PositioningSettings {
    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Whether any observation may be sent to the online service.
    pub fn online_data_allowed(&self) -> bool {
        self.cellular_data_allowed || self.wlan_data_allowed
    }

    /// Whether online lookups can ever succeed with these settings.
    pub fn online_possible(&self) -> bool {
        self.online_positioning_enabled && self.online_data_allowed() && self.has_api_key()
    }

    /// Describe why positioning can never produce a fix, if that is the case.
    ///
    /// Only meaningful while positioning is enabled.
    pub fn configuration_fault(&self) -> Option<&'static str> {
        if !self.positioning_enabled || self.cell_positioning_enabled || self.online_possible() {
            return None;
        }
        if !self.online_positioning_enabled {
            Some("cell and online positioning are both disabled")
        } else if !self.online_data_allowed() {
            Some("cell positioning disabled and no data may be sent online")
        } else {
            Some("cell positioning disabled and no API key configured")
        }
    }
}

impl ConfigFile {
    /// Extract the positioning snapshot.
    pub fn positioning_settings(&self) -> PositioningSettings {
        PositioningSettings {
            positioning_enabled: self.positioning.enabled,
            cell_positioning_enabled: self.positioning.cell_enabled,
            online_positioning_enabled: self.positioning.online_enabled,
            cellular_data_allowed: self.permissions.cellular_data_allowed,
            wlan_data_allowed: self.permissions.wlan_data_allowed,
            api_key: self.online.api_key.clone(),
        }
    }

    /// Build the online locator configuration.
    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            endpoint: self.online.endpoint.clone(),
            fallback_lacf: self.online.fallback_lacf,
            fallback_ipf: self.online.fallback_ipf,
            reply_timeout: Duration::from_secs(self.online.reply_timeout_secs),
            key_failure_cooldown: Duration::from_secs(self.online.key_failure_cooldown_secs),
            base_interval: Duration::from_secs(self.online.base_interval_secs),
            max_interval: Duration::from_secs(self.online.max_interval_secs),
            interval_step: Duration::from_secs(self.online.interval_step_secs),
            target_interval: Duration::from_secs(self.online.target_interval_secs),
            history_size: self.online.history_size,
        }
    }

    /// Build the provider timer configuration.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            idle_timeout: Duration::from_secs(self.timers.idle_timeout_secs),
            fix_lost_timeout: Duration::from_secs(self.timers.fix_lost_timeout_secs),
            default_update_interval: Duration::from_millis(self.timers.default_update_interval_ms),
            minimum_update_interval: Duration::from_millis(self.timers.minimum_update_interval_ms),
            exit_on_idle: self.timers.exit_on_idle,
        }
    }
}
