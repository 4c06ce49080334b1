//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [positioning] section
    if let Some(section) = ini.section(Some("positioning")) {
        if let Some(v) = section.get("enabled") {
            config.positioning.enabled = strict_bool("positioning", "enabled", v)?;
        }
        if let Some(v) = section.get("cell_enabled") {
            config.positioning.cell_enabled = strict_bool("positioning", "cell_enabled", v)?;
        }
        if let Some(v) = section.get("online_enabled") {
            config.positioning.online_enabled = strict_bool("positioning", "online_enabled", v)?;
        }
    }

    // [permissions] section
    if let Some(section) = ini.section(Some("permissions")) {
        if let Some(v) = section.get("cellular_data_allowed") {
            config.permissions.cellular_data_allowed =
                strict_bool("permissions", "cellular_data_allowed", v)?;
        }
        if let Some(v) = section.get("wlan_data_allowed") {
            config.permissions.wlan_data_allowed =
                strict_bool("permissions", "wlan_data_allowed", v)?;
        }
    }

    // [online] section
    if let Some(section) = ini.section(Some("online")) {
        if let Some(v) = section.get("api_key") {
            let v = v.trim();
            if !v.is_empty() {
                config.online.api_key = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("endpoint") {
            let v = v.trim();
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(ConfigFileError::InvalidValue {
                    section: "online".to_string(),
                    key: "endpoint".to_string(),
                    value: v.to_string(),
                    reason: "must be a URL starting with 'http://' or 'https://'".to_string(),
                });
            }
            config.online.endpoint = v.to_string();
        }
        if let Some(v) = section.get("fallback_lacf") {
            config.online.fallback_lacf = strict_bool("online", "fallback_lacf", v)?;
        }
        if let Some(v) = section.get("fallback_ipf") {
            config.online.fallback_ipf = strict_bool("online", "fallback_ipf", v)?;
        }
        let online = &mut config.online;
        set_u64(section, "online", "reply_timeout_secs", &mut online.reply_timeout_secs)?;
        set_u64(
            section,
            "online",
            "key_failure_cooldown_secs",
            &mut online.key_failure_cooldown_secs,
        )?;
        set_u64(section, "online", "base_interval_secs", &mut online.base_interval_secs)?;
        set_u64(section, "online", "max_interval_secs", &mut online.max_interval_secs)?;
        set_u64(section, "online", "interval_step_secs", &mut online.interval_step_secs)?;
        set_u64(section, "online", "target_interval_secs", &mut online.target_interval_secs)?;
        if let Some(v) = section.get("history_size") {
            online.history_size = match v.trim().parse::<usize>() {
                Ok(n) if n >= 2 => n,
                _ => {
                    return Err(ConfigFileError::InvalidValue {
                        section: "online".to_string(),
                        key: "history_size".to_string(),
                        value: v.to_string(),
                        reason: "must be an integer of at least 2".to_string(),
                    });
                }
            };
        }
        if online.max_interval_secs < online.base_interval_secs {
            return Err(ConfigFileError::InvalidValue {
                section: "online".to_string(),
                key: "max_interval_secs".to_string(),
                value: online.max_interval_secs.to_string(),
                reason: "must not be smaller than base_interval_secs".to_string(),
            });
        }
    }

    // [timers] section
    if let Some(section) = ini.section(Some("timers")) {
        let timers = &mut config.timers;
        set_u64(section, "timers", "idle_timeout_secs", &mut timers.idle_timeout_secs)?;
        set_u64(section, "timers", "fix_lost_timeout_secs", &mut timers.fix_lost_timeout_secs)?;
        set_u64(
            section,
            "timers",
            "default_update_interval_ms",
            &mut timers.default_update_interval_ms,
        )?;
        set_u64(
            section,
            "timers",
            "minimum_update_interval_ms",
            &mut timers.minimum_update_interval_ms,
        )?;
        if let Some(v) = section.get("exit_on_idle") {
            timers.exit_on_idle = strict_bool("timers", "exit_on_idle", v)?;
        }
        for (key, value) in [
            ("default_update_interval_ms", timers.default_update_interval_ms),
            ("minimum_update_interval_ms", timers.minimum_update_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigFileError::InvalidValue {
                    section: "timers".to_string(),
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
    }

    // [scan] section
    if let Some(section) = ini.section(Some("scan")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.scan.file = Some(expand_tilde(v));
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Overlay an unsigned integer key if present.
fn set_u64(
    section: &Properties,
    section_name: &str,
    key: &str,
    target: &mut u64,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get(key) {
        *target = v
            .trim()
            .parse()
            .map_err(|_| ConfigFileError::InvalidValue {
                section: section_name.to_string(),
                key: key.to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
    }
    Ok(())
}

/// Parse a boolean, rejecting anything that is not a recognised spelling.
fn strict_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    let v = value.trim().to_lowercase();
    match v.as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be true/false, yes/no, 1/0, or on/off".to_string(),
        }),
    }
}

/// Parse a boolean leniently: anything but a true spelling is false.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
