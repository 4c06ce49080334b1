//! User configuration.
//!
//! `~/.cellfix/config.ini` is read with `rust-ini` into a [`ConfigFile`],
//! which then yields the runtime snapshots used by the engine:
//!
//! - [`PositioningSettings`] - switches, permissions and API key
//! - [`crate::locator::LocatorConfig`] - endpoint, throttle and timeouts
//! - [`crate::provider::ProviderConfig`] - timer durations
//!
//! # Example
//!
//! ```
//! use cellfix::config::{ConfigFile, ConfigKey};
//!
//! let mut config = ConfigFile::default();
//! ConfigKey::OnlineApiKey.set(&mut config, "my-key").unwrap();
//!
//! assert!(config.positioning_settings().has_api_key());
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::ConfigFileError;
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{
    ConfigFile, LoggingSection, OnlineSection, PermissionsSection, PositioningSection,
    PositioningSettings, ScanSection, TimersSection,
};
