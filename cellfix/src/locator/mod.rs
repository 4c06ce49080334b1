//! Online geolocation lookups.
//!
//! [`OnlineLocator`] turns the visible cells (and, when permitted, WLAN
//! access points) into a geolocate request, applies the
//! [`AdaptiveThrottle`], sends at most one request at a time through a
//! [`LookupTransport`] and reports the outcome.
//!
//! Retries are never immediate: a failed lookup is simply followed by the
//! next natural query once the throttle permits it. A rejected API key
//! suspends lookups for the configured cooldown.

mod config;
mod error;
mod online;
mod query;
mod response;
mod throttle;
mod transport;

pub use config::LocatorConfig;
pub use error::{LookupError, TransportError};
pub use online::{LookupOutcome, NetworkReply, OnlineFix, OnlineLocator, ReplySink};
pub use query::{
    CellTower, Fallbacks, GeolocateRequest, LocationQuery, QueryOptions, QuerySignature,
    WifiAccessPoint, MIN_ACCESS_POINTS,
};
pub use response::{parse_response, ParsedFix};
pub use throttle::{AdaptiveThrottle, Throttled};
pub use transport::{LookupTransport, ReqwestTransport, TransportResponse};

#[cfg(test)]
pub use online::tests::{ChannelSink, RecordingSink};
#[cfg(test)]
pub use transport::tests::MockTransport;
