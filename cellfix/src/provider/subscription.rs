//! Reference-counted client subscriptions.
//!
//! Each client (bus name) holds a reference count and an optional requested
//! update interval. Positioning runs while the total count is nonzero; the
//! recalculation interval is the smallest nonzero request among clients that
//! hold a reference.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

/// Identifies a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClientId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Options a client passes with `SetOptions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Requested update interval in milliseconds, 0 for no preference.
    pub update_interval_ms: Option<u64>,
}

impl ClientOptions {
    pub fn update_interval(ms: u64) -> Self {
        Self {
            update_interval_ms: Some(ms),
        }
    }

    /// Build from a `SetOptions` map. Unknown keys are ignored.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let mut options = Self::default();
        for (key, value) in pairs {
            if key.eq_ignore_ascii_case("UpdateInterval") {
                options.update_interval_ms = Some(value);
            } else {
                debug!(option = key, "Ignoring unknown client option");
            }
        }
        options
    }
}

#[derive(Debug, Clone, Default)]
struct ClientSubscription {
    reference_count: u32,
    update_interval: Option<Duration>,
}

/// All client subscriptions of a provider.
#[derive(Debug, Default)]
pub struct Subscriptions {
    clients: HashMap<ClientId, ClientSubscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reference for `client`. Returns the client's new count.
    pub fn add_reference(&mut self, client: &ClientId) -> u32 {
        let entry = self.clients.entry(client.clone()).or_default();
        entry.reference_count = entry.reference_count.saturating_add(1);
        debug!(client = %client, count = entry.reference_count, "Reference added");
        entry.reference_count
    }

    /// Drop one reference for `client`.
    ///
    /// Returns `false` when the client holds no reference. A client whose
    /// count reaches zero is forgotten, including its requested interval.
    pub fn remove_reference(&mut self, client: &ClientId) -> bool {
        let Some(entry) = self.clients.get_mut(client) else {
            warn!(client = %client, "RemoveReference from unknown client");
            return false;
        };
        if entry.reference_count == 0 {
            warn!(client = %client, "RemoveReference without a reference");
            return false;
        }
        entry.reference_count -= 1;
        debug!(client = %client, count = entry.reference_count, "Reference removed");
        if entry.reference_count == 0 {
            self.clients.remove(client);
        }
        true
    }

    /// Forget a client entirely. Returns the number of references it held.
    pub fn remove_client(&mut self, client: &ClientId) -> u32 {
        match self.clients.remove(client) {
            Some(entry) => {
                debug!(client = %client, released = entry.reference_count, "Client disconnected");
                entry.reference_count
            }
            None => 0,
        }
    }

    /// Record the update interval requested by `client`.
    ///
    /// Zero means "no preference". Only clients holding a reference are
    /// tracked, so a request from any other client is ignored and `false`
    /// returned.
    pub fn set_update_interval(&mut self, client: &ClientId, interval: Duration) -> bool {
        let Some(entry) = self.clients.get_mut(client) else {
            debug!(client = %client, "Ignoring options from client without a reference");
            return false;
        };
        entry.update_interval = (!interval.is_zero()).then_some(interval);
        true
    }

    /// Reference count of one client.
    pub fn reference_count(&self, client: &ClientId) -> u32 {
        self.clients.get(client).map_or(0, |e| e.reference_count)
    }

    /// Sum of all reference counts.
    pub fn total_references(&self) -> u32 {
        self.clients.values().map(|e| e.reference_count).sum()
    }

    /// Number of clients holding at least one reference.
    pub fn active_clients(&self) -> usize {
        self.clients
            .values()
            .filter(|e| e.reference_count > 0)
            .count()
    }

    /// Interval at which positions are recalculated.
    ///
    /// The smallest interval requested by a subscribed client, never below
    /// `minimum`; `default` when no subscribed client asked for one.
    pub fn effective_interval(&self, default: Duration, minimum: Duration) -> Duration {
        self.clients
            .values()
            .filter(|e| e.reference_count > 0)
            .filter_map(|e| e.update_interval)
            .min()
            .map_or(default, |requested| requested.max(minimum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DEFAULT: Duration = Duration::from_secs(10);
    const MINIMUM: Duration = Duration::from_secs(1);

    fn client(name: &str) -> ClientId {
        ClientId::from(name)
    }

    #[test]
    fn test_reference_counting() {
        let mut subs = Subscriptions::new();
        let a = client(":1.10");
        assert_eq!(subs.add_reference(&a), 1);
        assert_eq!(subs.add_reference(&a), 2);
        assert_eq!(subs.total_references(), 2);

        assert!(subs.remove_reference(&a));
        assert_eq!(subs.reference_count(&a), 1);
        assert!(subs.remove_reference(&a));
        assert_eq!(subs.total_references(), 0);
        assert!(!subs.remove_reference(&a));
    }

    #[test]
    fn test_remove_unknown_client_is_ignored() {
        let mut subs = Subscriptions::new();
        subs.add_reference(&client("a"));
        assert!(!subs.remove_reference(&client("b")));
        assert_eq!(subs.total_references(), 1);
    }

    #[test]
    fn test_disconnect_releases_all_references() {
        let mut subs = Subscriptions::new();
        let a = client("a");
        subs.add_reference(&a);
        subs.add_reference(&a);
        subs.add_reference(&client("b"));
        assert_eq!(subs.remove_client(&a), 2);
        assert_eq!(subs.total_references(), 1);
        assert_eq!(subs.active_clients(), 1);
    }

    #[test]
    fn test_effective_interval_is_minimum_request() {
        let mut subs = Subscriptions::new();
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), DEFAULT);

        let a = client("a");
        let b = client("b");
        subs.add_reference(&a);
        subs.add_reference(&b);
        subs.set_update_interval(&a, Duration::from_secs(30));
        subs.set_update_interval(&b, Duration::from_secs(5));
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), Duration::from_secs(5));

        subs.remove_reference(&b);
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), Duration::from_secs(30));
    }

    #[test]
    fn test_effective_interval_clamped() {
        let mut subs = Subscriptions::new();
        let a = client("a");
        subs.add_reference(&a);
        subs.set_update_interval(&a, Duration::from_millis(100));
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), MINIMUM);

        subs.set_update_interval(&a, Duration::ZERO);
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), DEFAULT);
    }

    #[test]
    fn test_options_without_reference_leave_no_entry() {
        let mut subs = Subscriptions::new();
        let a = client("a");
        assert!(!subs.set_update_interval(&a, Duration::from_secs(3)));
        assert_eq!(subs.active_clients(), 0);
        assert_eq!(subs.remove_client(&a), 0);

        subs.add_reference(&a);
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), DEFAULT);
        assert!(subs.set_update_interval(&a, Duration::from_secs(3)));
        assert_eq!(subs.effective_interval(DEFAULT, MINIMUM), Duration::from_secs(3));

        subs.remove_reference(&a);
        assert!(!subs.set_update_interval(&a, Duration::from_secs(5)));
        assert!(subs.clients.is_empty());
    }

    #[test]
    fn test_client_options_from_pairs() {
        let options = ClientOptions::from_pairs([("UpdateInterval", 5000), ("Foo", 1)]);
        assert_eq!(options, ClientOptions::update_interval(5000));
        assert_eq!(ClientOptions::from_pairs([]).update_interval_ms, None);
    }

    proptest! {
        #[test]
        fn test_balanced_add_remove_returns_to_zero(adds in proptest::collection::vec(0usize..4, 0..40)) {
            let names = ["a", "b", "c", "d"];
            let mut subs = Subscriptions::new();
            for i in &adds {
                subs.add_reference(&client(names[*i]));
            }
            prop_assert_eq!(subs.total_references() as usize, adds.len());
            for i in adds.iter().rev() {
                prop_assert!(subs.remove_reference(&client(names[*i])));
            }
            prop_assert_eq!(subs.total_references(), 0);
            prop_assert_eq!(subs.active_clients(), 0);
        }
    }
}
