//! The location provider.
//!
//! [`PositionProvider`] is the positioning state machine: it subscribes
//! clients, resolves cells through the cache and the online locator, runs
//! the idle, fix-lost and recalculation timers and publishes
//! [`ProviderSignal`]s. [`ProviderDaemon`] drives it from a single tokio
//! task; clients use a [`ProviderHandle`].

mod config;
mod daemon;
mod engine;
mod error;
mod location;
mod status;
mod subscription;
mod timers;

pub use config::ProviderConfig;
pub use daemon::{
    ProviderDaemon, ProviderDaemonConfig, ProviderEvent, ProviderHandle,
    DEFAULT_SIGNAL_CHANNEL_CAPACITY,
};
pub use engine::{PositionProvider, ProviderSignal, PROVIDER_DESCRIPTION, PROVIDER_NAME};
pub use error::ProviderError;
pub use location::{Accuracy, AccuracyLevel, Location, LocationSource, PositionReport};
pub use status::{PositionFields, Status};
pub use subscription::{ClientId, ClientOptions, Subscriptions};
pub use timers::{ProviderTimers, TimerKind};
