//! Configuration key access and validation.
//!
//! Type-safe get/set of configuration values by `section.key` name, used by
//! the `cellfix config` command.

use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::parser::{expand_tilde, parse_bool};
use super::settings::ConfigFile;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Positioning switches
    PositioningEnabled,
    PositioningCellEnabled,
    PositioningOnlineEnabled,

    // Permissions
    PermissionsCellularDataAllowed,
    PermissionsWlanDataAllowed,

    // Online service
    OnlineApiKey,
    OnlineEndpoint,
    OnlineFallbackLacf,
    OnlineFallbackIpf,
    OnlineReplyTimeoutSecs,
    OnlineKeyFailureCooldownSecs,
    OnlineBaseIntervalSecs,
    OnlineMaxIntervalSecs,
    OnlineIntervalStepSecs,
    OnlineTargetIntervalSecs,
    OnlineHistorySize,

    // Timers
    TimersIdleTimeoutSecs,
    TimersFixLostTimeoutSecs,
    TimersDefaultUpdateIntervalMs,
    TimersMinimumUpdateIntervalMs,
    TimersExitOnIdle,

    ScanFile,
    LoggingFile,
}

/// Kind of value a key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Boolean,
    Integer,
    OptionalString,
    Url,
    OptionalPath,
    Path,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "online.api_key").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::PositioningEnabled => "positioning.enabled",
            ConfigKey::PositioningCellEnabled => "positioning.cell_enabled",
            ConfigKey::PositioningOnlineEnabled => "positioning.online_enabled",
            ConfigKey::PermissionsCellularDataAllowed => "permissions.cellular_data_allowed",
            ConfigKey::PermissionsWlanDataAllowed => "permissions.wlan_data_allowed",
            ConfigKey::OnlineApiKey => "online.api_key",
            ConfigKey::OnlineEndpoint => "online.endpoint",
            ConfigKey::OnlineFallbackLacf => "online.fallback_lacf",
            ConfigKey::OnlineFallbackIpf => "online.fallback_ipf",
            ConfigKey::OnlineReplyTimeoutSecs => "online.reply_timeout_secs",
            ConfigKey::OnlineKeyFailureCooldownSecs => "online.key_failure_cooldown_secs",
            ConfigKey::OnlineBaseIntervalSecs => "online.base_interval_secs",
            ConfigKey::OnlineMaxIntervalSecs => "online.max_interval_secs",
            ConfigKey::OnlineIntervalStepSecs => "online.interval_step_secs",
            ConfigKey::OnlineTargetIntervalSecs => "online.target_interval_secs",
            ConfigKey::OnlineHistorySize => "online.history_size",
            ConfigKey::TimersIdleTimeoutSecs => "timers.idle_timeout_secs",
            ConfigKey::TimersFixLostTimeoutSecs => "timers.fix_lost_timeout_secs",
            ConfigKey::TimersDefaultUpdateIntervalMs => "timers.default_update_interval_ms",
            ConfigKey::TimersMinimumUpdateIntervalMs => "timers.minimum_update_interval_ms",
            ConfigKey::TimersExitOnIdle => "timers.exit_on_idle",
            ConfigKey::ScanFile => "scan.file",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "online").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "api_key").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    fn kind(&self) -> ValueKind {
        match self {
            ConfigKey::PositioningEnabled
            | ConfigKey::PositioningCellEnabled
            | ConfigKey::PositioningOnlineEnabled
            | ConfigKey::PermissionsCellularDataAllowed
            | ConfigKey::PermissionsWlanDataAllowed
            | ConfigKey::OnlineFallbackLacf
            | ConfigKey::OnlineFallbackIpf
            | ConfigKey::TimersExitOnIdle => ValueKind::Boolean,
            ConfigKey::OnlineApiKey => ValueKind::OptionalString,
            ConfigKey::OnlineEndpoint => ValueKind::Url,
            ConfigKey::ScanFile => ValueKind::OptionalPath,
            ConfigKey::LoggingFile => ValueKind::Path,
            _ => ValueKind::Integer,
        }
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::PositioningEnabled => config.positioning.enabled.to_string(),
            ConfigKey::PositioningCellEnabled => config.positioning.cell_enabled.to_string(),
            ConfigKey::PositioningOnlineEnabled => config.positioning.online_enabled.to_string(),
            ConfigKey::PermissionsCellularDataAllowed => {
                config.permissions.cellular_data_allowed.to_string()
            }
            ConfigKey::PermissionsWlanDataAllowed => {
                config.permissions.wlan_data_allowed.to_string()
            }
            ConfigKey::OnlineApiKey => config.online.api_key.clone().unwrap_or_default(),
            ConfigKey::OnlineEndpoint => config.online.endpoint.clone(),
            ConfigKey::OnlineFallbackLacf => config.online.fallback_lacf.to_string(),
            ConfigKey::OnlineFallbackIpf => config.online.fallback_ipf.to_string(),
            ConfigKey::OnlineReplyTimeoutSecs => config.online.reply_timeout_secs.to_string(),
            ConfigKey::OnlineKeyFailureCooldownSecs => {
                config.online.key_failure_cooldown_secs.to_string()
            }
            ConfigKey::OnlineBaseIntervalSecs => config.online.base_interval_secs.to_string(),
            ConfigKey::OnlineMaxIntervalSecs => config.online.max_interval_secs.to_string(),
            ConfigKey::OnlineIntervalStepSecs => config.online.interval_step_secs.to_string(),
            ConfigKey::OnlineTargetIntervalSecs => config.online.target_interval_secs.to_string(),
            ConfigKey::OnlineHistorySize => config.online.history_size.to_string(),
            ConfigKey::TimersIdleTimeoutSecs => config.timers.idle_timeout_secs.to_string(),
            ConfigKey::TimersFixLostTimeoutSecs => config.timers.fix_lost_timeout_secs.to_string(),
            ConfigKey::TimersDefaultUpdateIntervalMs => {
                config.timers.default_update_interval_ms.to_string()
            }
            ConfigKey::TimersMinimumUpdateIntervalMs => {
                config.timers.minimum_update_interval_ms.to_string()
            }
            ConfigKey::TimersExitOnIdle => config.timers.exit_on_idle.to_string(),
            ConfigKey::ScanFile => config
                .scan
                .file
                .as_ref()
                .map(|p| path_to_display(p))
                .unwrap_or_default(),
            ConfigKey::LoggingFile => path_to_display(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value before setting; on error the config is unchanged.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        let value = value.trim();

        let integer = || -> Result<u64, ConfigKeyError> {
            value.parse().map_err(|_| self.invalid("must be a positive integer"))
        };

        match self {
            ConfigKey::PositioningEnabled => config.positioning.enabled = parse_bool(value),
            ConfigKey::PositioningCellEnabled => {
                config.positioning.cell_enabled = parse_bool(value)
            }
            ConfigKey::PositioningOnlineEnabled => {
                config.positioning.online_enabled = parse_bool(value)
            }
            ConfigKey::PermissionsCellularDataAllowed => {
                config.permissions.cellular_data_allowed = parse_bool(value)
            }
            ConfigKey::PermissionsWlanDataAllowed => {
                config.permissions.wlan_data_allowed = parse_bool(value)
            }
            ConfigKey::OnlineApiKey => config.online.api_key = optional_string(value),
            ConfigKey::OnlineEndpoint => config.online.endpoint = value.to_string(),
            ConfigKey::OnlineFallbackLacf => config.online.fallback_lacf = parse_bool(value),
            ConfigKey::OnlineFallbackIpf => config.online.fallback_ipf = parse_bool(value),
            ConfigKey::OnlineReplyTimeoutSecs => config.online.reply_timeout_secs = integer()?,
            ConfigKey::OnlineKeyFailureCooldownSecs => {
                config.online.key_failure_cooldown_secs = integer()?
            }
            ConfigKey::OnlineBaseIntervalSecs => config.online.base_interval_secs = integer()?,
            ConfigKey::OnlineMaxIntervalSecs => config.online.max_interval_secs = integer()?,
            ConfigKey::OnlineIntervalStepSecs => config.online.interval_step_secs = integer()?,
            ConfigKey::OnlineTargetIntervalSecs => {
                config.online.target_interval_secs = integer()?
            }
            ConfigKey::OnlineHistorySize => {
                let size = integer()?;
                if size < 2 {
                    return Err(self.invalid("must be at least 2"));
                }
                config.online.history_size = size as usize;
            }
            ConfigKey::TimersIdleTimeoutSecs => config.timers.idle_timeout_secs = integer()?,
            ConfigKey::TimersFixLostTimeoutSecs => {
                config.timers.fix_lost_timeout_secs = integer()?
            }
            ConfigKey::TimersDefaultUpdateIntervalMs => {
                config.timers.default_update_interval_ms = integer()?
            }
            ConfigKey::TimersMinimumUpdateIntervalMs => {
                config.timers.minimum_update_interval_ms = integer()?
            }
            ConfigKey::TimersExitOnIdle => config.timers.exit_on_idle = parse_bool(value),
            ConfigKey::ScanFile => {
                config.scan.file = optional_string(value).map(|v| expand_tilde(&v))
            }
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    /// Validate a value for this key.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        match self.kind() {
            ValueKind::Boolean => {
                let lower = value.to_lowercase();
                let valid = ["true", "false", "yes", "no", "1", "0", "on", "off"];
                if !valid.contains(&lower.as_str()) {
                    return Err(self.invalid("must be true/false, yes/no, 1/0, or on/off"));
                }
            }
            ValueKind::Integer => {
                let Ok(parsed) = value.parse::<u64>() else {
                    return Err(self.invalid("must be a positive integer"));
                };
                let nonzero = matches!(
                    self,
                    ConfigKey::TimersDefaultUpdateIntervalMs
                        | ConfigKey::TimersMinimumUpdateIntervalMs
                );
                if nonzero && parsed == 0 {
                    return Err(self.invalid("must be greater than zero"));
                }
            }
            ValueKind::Url => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(
                        self.invalid("must be a URL starting with 'http://' or 'https://'")
                    );
                }
            }
            ValueKind::Path => {
                if value.is_empty() {
                    return Err(self.invalid("must be a valid path"));
                }
            }
            ValueKind::OptionalString | ValueKind::OptionalPath => {}
        }
        Ok(())
    }

    /// Whether the value should be masked when displayed.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::OnlineApiKey)
    }

    fn invalid(&self, reason: &str) -> ConfigKeyError {
        ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PositioningEnabled,
            ConfigKey::PositioningCellEnabled,
            ConfigKey::PositioningOnlineEnabled,
            ConfigKey::PermissionsCellularDataAllowed,
            ConfigKey::PermissionsWlanDataAllowed,
            ConfigKey::OnlineApiKey,
            ConfigKey::OnlineEndpoint,
            ConfigKey::OnlineFallbackLacf,
            ConfigKey::OnlineFallbackIpf,
            ConfigKey::OnlineReplyTimeoutSecs,
            ConfigKey::OnlineKeyFailureCooldownSecs,
            ConfigKey::OnlineBaseIntervalSecs,
            ConfigKey::OnlineMaxIntervalSecs,
            ConfigKey::OnlineIntervalStepSecs,
            ConfigKey::OnlineTargetIntervalSecs,
            ConfigKey::OnlineHistorySize,
            ConfigKey::TimersIdleTimeoutSecs,
            ConfigKey::TimersFixLostTimeoutSecs,
            ConfigKey::TimersDefaultUpdateIntervalMs,
            ConfigKey::TimersMinimumUpdateIntervalMs,
            ConfigKey::TimersExitOnIdle,
            ConfigKey::ScanFile,
            ConfigKey::LoggingFile,
        ]
    }
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

/// Convert empty string to None, non-empty to Some.
fn optional_string(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
