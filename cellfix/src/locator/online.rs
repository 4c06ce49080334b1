//! The online locator.
//!
//! Builds lookup queries, decides whether one may be sent, runs at most one
//! request at a time on the tokio runtime and turns the reply into an
//! outcome. The reply travels back through a [`ReplySink`] so the owner of
//! the locator can process it on its own control flow; the locator never
//! calls back into its owner directly.
//!
//! ```text
//! find_location ──► spawn(timeout(post_json)) ──► ReplySink::deliver(NetworkReply)
//!                                                           │
//! finish(NetworkReply) ◄── owner's event loop ◄─────────────┘
//! ```

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::LocatorConfig;
use super::error::LookupError;
use super::query::{Fallbacks, LocationQuery, QueryOptions};
use super::response::parse_response;
use super::throttle::{AdaptiveThrottle, Throttled};
use super::transport::{LookupTransport, TransportResponse};
use crate::cell::{CellPositioningData, Coordinates, HomeNetwork, UniqueCellId};
use crate::config::PositioningSettings;
use crate::sources::AccessPointSource;

/// Raw completion of a lookup request.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReply {
    /// Id of the query that produced this reply.
    pub request_id: u64,
    pub result: Result<TransportResponse, LookupError>,
}

/// Receives lookup completions.
///
/// Implemented by whoever owns the locator; the provider daemon forwards
/// replies into its event queue.
pub trait ReplySink: Send + Sync + 'static {
    fn deliver(&self, reply: NetworkReply);
}

/// A location found online.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineFix {
    pub coordinates: Coordinates,
    /// Set when the service fell back to an area or IP estimate.
    pub fallback: Option<String>,
}

impl OnlineFix {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Result of a completed lookup together with the cells it asked about.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub query_cells: Vec<UniqueCellId>,
    pub result: Result<OnlineFix, LookupError>,
}

struct InFlight {
    request_id: u64,
    query_cells: Vec<UniqueCellId>,
    cancel: CancellationToken,
}

/// Queries the online geolocation service.
pub struct OnlineLocator<T: LookupTransport> {
    transport: Arc<T>,
    access_points: Arc<dyn AccessPointSource>,
    sink: Arc<dyn ReplySink>,
    config: LocatorConfig,
    api_key: Option<String>,
    cellular_data_allowed: bool,
    wlan_data_allowed: bool,
    throttle: AdaptiveThrottle,
    in_flight: Option<InFlight>,
    last_sent: Option<u64>,
    next_query_id: u64,
}

impl<T: LookupTransport> OnlineLocator<T> {
    pub fn new(
        transport: Arc<T>,
        access_points: Arc<dyn AccessPointSource>,
        sink: Arc<dyn ReplySink>,
        config: LocatorConfig,
        settings: &PositioningSettings,
    ) -> Self {
        let throttle = AdaptiveThrottle::new(&config);
        Self {
            transport,
            access_points,
            sink,
            config,
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            cellular_data_allowed: settings.cellular_data_allowed,
            wlan_data_allowed: settings.wlan_data_allowed,
            throttle,
            in_flight: None,
            last_sent: None,
            next_query_id: 0,
        }
    }

    /// Take over new key and permission settings.
    ///
    /// A changed key clears the key-failure cooldown.
    pub fn apply_settings(&mut self, settings: &PositioningSettings) {
        let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key != self.api_key {
            info!(has_key = api_key.is_some(), "Location service API key changed");
            self.throttle.clear_key_failure();
            self.api_key = api_key;
        }
        self.cellular_data_allowed = settings.cellular_data_allowed;
        self.wlan_data_allowed = settings.wlan_data_allowed;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn throttle(&self) -> &AdaptiveThrottle {
        &self.throttle
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Build a query for the visible cells and, if permitted, access points.
    ///
    /// When `previous` asks about the same cells and access points and is
    /// younger than the current adaptive interval it is returned unchanged,
    /// keeping its id and timestamp.
    pub fn build_query(
        &mut self,
        cells: &[CellPositioningData],
        home_network: Option<&HomeNetwork>,
        previous: Option<&LocationQuery>,
        now: Instant,
    ) -> LocationQuery {
        let access_points = if self.wlan_data_allowed {
            self.access_points.visible_access_points()
        } else {
            Vec::new()
        };

        let options = QueryOptions {
            include_cells: self.cellular_data_allowed,
            include_access_points: self.wlan_data_allowed,
            fallbacks: Fallbacks {
                lacf: self.config.fallback_lacf,
                ipf: self.config.fallback_ipf,
            },
        };

        let candidate = LocationQuery::build(
            self.next_query_id + 1,
            now,
            cells,
            &access_points,
            home_network,
            options,
        );

        if let Some(previous) = previous {
            let fresh =
                now.saturating_duration_since(previous.created_at()) < self.throttle.interval();
            if fresh && previous.signature() == candidate.signature() {
                return previous.clone();
            }
        }

        self.next_query_id += 1;
        candidate
    }

    /// Send `query` if nothing prevents it.
    ///
    /// Returns `false` without touching the throttle when a request is
    /// already in flight, no API key is configured, the query is empty, this
    /// exact query was already sent, or the throttle refuses.
    pub fn find_location(&mut self, query: &LocationQuery, now: Instant) -> bool {
        if let Some(in_flight) = &self.in_flight {
            debug!(request_id = in_flight.request_id, "Lookup already in flight");
            return false;
        }

        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No API key configured, skipping online lookup");
            return false;
        };

        if query.is_empty() && !self.config.fallback_ipf {
            debug!("Nothing to look up");
            return false;
        }

        if self.last_sent == Some(query.id()) {
            debug!(request_id = query.id(), "Query already sent");
            return false;
        }

        match self.throttle.check(now) {
            Ok(()) => {}
            Err(Throttled::KeyCooldown { remaining }) => {
                debug!(remaining_secs = remaining.as_secs(), "Lookup suppressed by key cooldown");
                return false;
            }
            Err(Throttled::Interval { remaining }) => {
                debug!(
                    remaining_ms = remaining.as_millis() as u64,
                    interval_secs = self.throttle.interval().as_secs(),
                    "Lookup throttled"
                );
                return false;
            }
        }

        let body = match query.to_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize lookup request");
                return false;
            }
        };

        let url = match self.config.request_url(api_key) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(error = %e, "Cannot build lookup URL");
                return false;
            }
        };
        let request_id = query.id();
        let reply_timeout = self.config.reply_timeout;
        let cancel = CancellationToken::new();

        self.throttle.record_query(now);
        self.last_sent = Some(request_id);
        self.in_flight = Some(InFlight {
            request_id,
            query_cells: query.cell_ids().to_vec(),
            cancel: cancel.clone(),
        });

        info!(
            request_id,
            cells = query.request().cell_towers.len(),
            access_points = query.request().wifi_access_points.len(),
            "Sending online lookup"
        );

        let transport = Arc::clone(&self.transport);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = tokio::time::timeout(reply_timeout, transport.post_json(&url, body)) => {
                    match r {
                        Ok(Ok(response)) => Ok(response),
                        Ok(Err(e)) => Err(LookupError::from(e)),
                        Err(_) => Err(LookupError::Timeout(reply_timeout)),
                    }
                }
            };
            sink.deliver(NetworkReply { request_id, result });
        });

        true
    }

    /// Process a reply delivered through the sink.
    ///
    /// Returns `None` for replies that do not belong to the request in
    /// flight (stale or cancelled).
    pub fn finish(&mut self, reply: NetworkReply, now: Instant) -> Option<LookupOutcome> {
        match &self.in_flight {
            Some(in_flight) if in_flight.request_id == reply.request_id => {}
            _ => {
                debug!(request_id = reply.request_id, "Discarding stale lookup reply");
                return None;
            }
        }
        let in_flight = self.in_flight.take()?;

        let result = reply
            .result
            .and_then(|response| parse_response(&response))
            .map(|parsed| OnlineFix {
                coordinates: parsed.coordinates,
                fallback: parsed.fallback,
            });

        match &result {
            Ok(fix) => info!(
                request_id = reply.request_id,
                latitude = fix.coordinates.latitude,
                longitude = fix.coordinates.longitude,
                accuracy = ?fix.coordinates.accuracy,
                fallback = ?fix.fallback,
                "Online lookup found location"
            ),
            Err(e) => {
                warn!(request_id = reply.request_id, error = %e, "Online lookup failed");
                if e.is_key_failure() {
                    self.throttle.record_key_failure(now);
                }
            }
        }

        Some(LookupOutcome {
            query_cells: in_flight.query_cells,
            result,
        })
    }

    /// Abandon the request in flight, if any. Its reply will never be delivered.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            debug!(request_id = in_flight.request_id, "Cancelling online lookup");
            in_flight.cancel.cancel();
        }
    }
}

impl<T: LookupTransport> Drop for OnlineLocator<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::cell::RadioType;
    use crate::locator::transport::tests::MockTransport;
    use crate::sources::StaticScan;
    use crate::locator::TransportError;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Sink forwarding replies into a channel.
    pub struct ChannelSink(pub mpsc::UnboundedSender<NetworkReply>);

    impl ReplySink for ChannelSink {
        fn deliver(&self, reply: NetworkReply) {
            let _ = self.0.send(reply);
        }
    }

    /// Sink that only records.
    #[derive(Default)]
    pub struct RecordingSink(pub Mutex<Vec<NetworkReply>>);

    impl ReplySink for RecordingSink {
        fn deliver(&self, reply: NetworkReply) {
            self.0.lock().unwrap().push(reply);
        }
    }

    const FOUND: &str = r#"{"location": {"lat": 55.75, "lng": 37.61}, "accuracy": 900}"#;
    const KEY_INVALID: &str =
        r#"{"error": {"code": 400, "errors": [{"reason": "keyInvalid"}], "message": "bad key"}}"#;

    fn settings() -> PositioningSettings {
        PositioningSettings {
            positioning_enabled: true,
            cell_positioning_enabled: true,
            online_positioning_enabled: true,
            cellular_data_allowed: true,
            wlan_data_allowed: false,
            api_key: Some("test-key".to_string()),
        }
    }

    fn cells() -> Vec<CellPositioningData> {
        vec![CellPositioningData::new(
            UniqueCellId::new(250, 1, 7700, 42).with_radio(RadioType::Gsm),
            20,
        )]
    }

    struct Harness {
        locator: OnlineLocator<MockTransport>,
        transport: Arc<MockTransport>,
        scan: Arc<StaticScan>,
        replies: mpsc::UnboundedReceiver<NetworkReply>,
    }

    fn harness_with(transport: MockTransport, settings: PositioningSettings) -> Harness {
        let transport = Arc::new(transport);
        let scan = Arc::new(StaticScan::default());
        let (tx, replies) = mpsc::unbounded_channel();
        let locator = OnlineLocator::new(
            Arc::clone(&transport),
            Arc::clone(&scan) as Arc<dyn AccessPointSource>,
            Arc::new(ChannelSink(tx)),
            LocatorConfig::default()
                .with_endpoint("https://location.example.com/v1/geolocate")
                .with_reply_timeout(Duration::from_secs(5)),
            &settings,
        );
        Harness {
            locator,
            transport,
            scan,
            replies,
        }
    }

    fn harness() -> Harness {
        harness_with(MockTransport::new(), settings())
    }

    #[tokio::test]
    async fn test_successful_lookup() {
        let mut h = harness();
        h.transport.push_json(200, FOUND);

        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&query, now));
        assert!(h.locator.is_in_flight());

        let reply = h.replies.recv().await.unwrap();
        let outcome = h.locator.finish(reply, Instant::now()).unwrap();

        let fix = outcome.result.unwrap();
        assert_eq!(fix.coordinates.latitude, 55.75);
        assert_eq!(fix.coordinates.accuracy, Some(900.0));
        assert!(!fix.is_fallback());
        assert_eq!(outcome.query_cells, vec![cells()[0].unique_cell_id]);
        assert!(!h.locator.is_in_flight());

        let (url, _) = &h.transport.requests()[0];
        assert_eq!(url, "https://location.example.com/v1/geolocate?key=test-key");
    }

    #[tokio::test]
    async fn test_second_request_refused_while_in_flight() {
        let mut h = harness();
        let now = Instant::now();
        let first = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&first, now));

        let history = h.locator.throttle().history_len();
        let interval = h.locator.throttle().interval();

        let later = now + Duration::from_secs(600);
        let other = h
            .locator
            .build_query(&[CellPositioningData::new(UniqueCellId::new(1, 1, 1, 1), 5)], None, None, later);
        assert!(!h.locator.find_location(&other, later));
        assert_eq!(h.locator.throttle().history_len(), history);
        assert_eq!(h.locator.throttle().interval(), interval);
    }

    #[tokio::test]
    async fn test_no_api_key_refused() {
        let mut h = harness_with(
            MockTransport::new(),
            PositioningSettings {
                api_key: None,
                ..settings()
            },
        );
        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(!h.locator.find_location(&query, now));
        assert_eq!(h.locator.throttle().history_len(), 0);
    }

    #[tokio::test]
    async fn test_identical_query_reused_and_not_resent() {
        let mut h = harness();
        h.transport.push_json(200, FOUND);
        let now = Instant::now();

        let first = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&first, now));
        let reply = h.replies.recv().await.unwrap();
        h.locator.finish(reply, now);

        let again = h
            .locator
            .build_query(&cells(), None, Some(&first), now + Duration::from_secs(2));
        assert_eq!(again.id(), first.id());
        assert_eq!(again.created_at(), first.created_at());
        assert!(!h.locator.find_location(&again, now + Duration::from_secs(20)));

        // Once the previous query is older than the interval a new one is built.
        let fresh = h
            .locator
            .build_query(&cells(), None, Some(&first), now + Duration::from_secs(20));
        assert_ne!(fresh.id(), first.id());
        assert!(h.locator.find_location(&fresh, now + Duration::from_secs(20)));
    }

    #[tokio::test]
    async fn test_key_failure_starts_cooldown() {
        let mut h = harness();
        h.transport.push_json(400, KEY_INVALID);
        let now = Instant::now();

        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&query, now));
        let reply = h.replies.recv().await.unwrap();
        let outcome = h.locator.finish(reply, now).unwrap();
        assert_eq!(outcome.result, Err(LookupError::InvalidKey));

        let retry_at = now + Duration::from_secs(3599);
        let retry = h.locator.build_query(&cells(), None, None, retry_at);
        assert!(!h.locator.find_location(&retry, retry_at));

        let eligible_at = now + Duration::from_secs(3600);
        let retry = h.locator.build_query(&cells(), None, None, eligible_at);
        h.transport.push_json(200, FOUND);
        assert!(h.locator.find_location(&retry, eligible_at));
    }

    #[tokio::test]
    async fn test_key_change_clears_cooldown() {
        let mut h = harness();
        h.transport.push_json(400, KEY_INVALID);
        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        h.locator.find_location(&query, now);
        let reply = h.replies.recv().await.unwrap();
        h.locator.finish(reply, now);

        h.locator.apply_settings(&PositioningSettings {
            api_key: Some("new-key".to_string()),
            ..settings()
        });

        let later = now + Duration::from_secs(60);
        let query = h.locator.build_query(&cells(), None, None, later);
        assert!(h.locator.find_location(&query, later));
    }

    #[tokio::test]
    async fn test_transport_failure_reported() {
        let mut h = harness();
        h.transport
            .push(Err(TransportError::Request("connection refused".to_string())));
        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&query, now));

        let reply = h.replies.recv().await.unwrap();
        let outcome = h.locator.finish(reply, now).unwrap();
        assert!(matches!(outcome.result, Err(LookupError::Transport(_))));
        assert!(h.locator.throttle().cooldown_remaining(now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_timeout() {
        // Empty script: the mock never answers.
        let mut h = harness();
        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&query, now));

        let reply = h.replies.recv().await.unwrap();
        assert_eq!(reply.result, Err(LookupError::Timeout(Duration::from_secs(5))));
        let outcome = h.locator.finish(reply, Instant::now()).unwrap();
        assert!(outcome.result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_reply() {
        let transport = MockTransport::new().with_delay(Duration::from_secs(1));
        transport.push_json(200, FOUND);
        let mut h = harness_with(transport, settings());
        let now = Instant::now();
        let query = h.locator.build_query(&cells(), None, None, now);
        assert!(h.locator.find_location(&query, now));

        h.locator.cancel();
        assert!(!h.locator.is_in_flight());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(h.replies.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_reply_discarded() {
        let mut h = harness();
        let reply = NetworkReply {
            request_id: 99,
            result: Ok(TransportResponse::new(200, FOUND)),
        };
        assert!(h.locator.finish(reply, Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_wlan_only_when_allowed() {
        let mut h = harness_with(
            MockTransport::new(),
            PositioningSettings {
                wlan_data_allowed: true,
                ..settings()
            },
        );
        h.scan.set_access_points(vec![
            crate::cell::AccessPoint::new("00:11:22:33:44:55", -50),
            crate::cell::AccessPoint::new("00:11:22:33:44:66", -70),
        ]);
        let query = h.locator.build_query(&cells(), None, None, Instant::now());
        assert_eq!(query.request().wifi_access_points.len(), 2);

        h.locator.apply_settings(&settings());
        let query = h.locator.build_query(&cells(), None, None, Instant::now());
        assert!(query.request().wifi_access_points.is_empty());
        assert_eq!(query.request().cell_towers.len(), 1);
    }

    #[tokio::test]
    async fn test_recording_sink_collects_replies() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(404, r#"{"error": {"code": 404, "errors": [{"reason": "notFound"}]}}"#);
        let sink = Arc::new(RecordingSink::default());
        let mut locator = OnlineLocator::new(
            Arc::clone(&transport),
            Arc::new(StaticScan::default()) as Arc<dyn AccessPointSource>,
            Arc::clone(&sink) as Arc<dyn ReplySink>,
            LocatorConfig::default(),
            &settings(),
        );

        let now = Instant::now();
        let query = locator.build_query(&cells(), None, None, now);
        assert!(locator.find_location(&query, now));

        for _ in 0..100 {
            if !sink.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let reply = sink.0.lock().unwrap().pop().unwrap();
        let outcome = locator.finish(reply, now).unwrap();
        assert_eq!(outcome.result, Err(LookupError::NotFound));
    }
}
