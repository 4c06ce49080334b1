//! cellfix - Cell-tower and WLAN based positioning
//!
//! This library determines an approximate device position without satellite
//! positioning. Visible cell towers are resolved through a local
//! cell-location cache and, when needed, an online geolocation service. The
//! result is published through a location-provider interface to any number
//! of subscribed clients.
//!
//! # Architecture
//!
//! ```text
//! CellSource ──► PositionProvider ──► CellLocationCache
//!                      │
//!                      ├──► OnlineLocator ──► LookupTransport (HTTP)
//!                      │         ▲                  │
//!                      │         └── NetworkReply ◄─┘
//!                      ▼
//!               ProviderSignal (StatusChanged / PositionChanged)
//! ```
//!
//! The [`provider::ProviderDaemon`] runs the provider as a single-consumer
//! event loop; clients talk to it through a cloneable
//! [`provider::ProviderHandle`].

pub mod cache;
pub mod cell;
pub mod config;
pub mod locator;
pub mod logging;
pub mod provider;
pub mod sources;

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
