//! The position provider state machine.
//!
//! [`PositionProvider`] owns every piece of positioning state: the cell
//! location cache, the online locator, client subscriptions, timers, the
//! current and last location and the status. It is driven entirely from
//! outside, one event at a time, with the current instant passed in. The
//! daemon supplies events and fires timers; tests call the methods
//! directly.
//!
//! A position is calculated as follows:
//!
//! 1. Resolve every visible cell through the cache. Known-unlocatable cells
//!    are skipped. The resolved cells give a signal-weighted centroid.
//! 2. If no cell resolved or some cell was never seen before, ask the online
//!    locator. The locator decides on its own whether the request may go
//!    out. A scan whose cells are all cached or unlocatable stays offline.
//! 3. A cell estimate becomes the current location unless an online fix
//!    younger than the update interval is already in place. Online fixes
//!    arrive asynchronously and are cached against the cells they were
//!    asked for.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::ProviderConfig;
use super::location::{Location, LocationSource, PositionReport};
use super::status::Status;
use super::subscription::{ClientId, ClientOptions, Subscriptions};
use super::timers::{ProviderTimers, TimerKind};
use crate::cache::{CacheLookup, CellLocationCache};
use crate::cell::{weighted_centroid, CellPositioningData, Coordinates, UniqueCellId};
use crate::config::PositioningSettings;
use crate::locator::{LocationQuery, LookupTransport, NetworkReply, OnlineLocator};
use crate::sources::CellSource;

/// Name reported by `GetProviderInfo`.
pub const PROVIDER_NAME: &str = "cellfix";

/// Description reported by `GetProviderInfo`.
pub const PROVIDER_DESCRIPTION: &str = "Cell tower and WLAN based positioning";

/// Signals emitted to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSignal {
    StatusChanged(Status),
    PositionChanged(PositionReport),
    /// The idle timer expired with no client left.
    IdleShutdown,
}

/// Position provider state machine.
pub struct PositionProvider<T: LookupTransport> {
    config: ProviderConfig,
    settings: PositioningSettings,
    cells: Arc<dyn CellSource>,
    cache: CellLocationCache,
    locator: OnlineLocator<T>,
    subscriptions: Subscriptions,
    timers: ProviderTimers,
    status: Status,
    positioning: bool,
    update_interval: Duration,
    current_location: Option<Location>,
    last_location: Option<Location>,
    last_reported: Option<Location>,
    last_online_fix: Option<Instant>,
    last_query: Option<LocationQuery>,
    signals: broadcast::Sender<ProviderSignal>,
}

impl<T: LookupTransport> PositionProvider<T> {
    /// Create a provider.
    ///
    /// The idle timer starts immediately so a provider nobody subscribes to
    /// is released like any other idle one.
    pub fn new(
        config: ProviderConfig,
        settings: PositioningSettings,
        cells: Arc<dyn CellSource>,
        locator: OnlineLocator<T>,
        signals: broadcast::Sender<ProviderSignal>,
        now: Instant,
    ) -> Self {
        let mut timers = ProviderTimers::new();
        timers.arm(TimerKind::Idle, now, config.idle_timeout);

        let mut provider = Self {
            update_interval: config.default_update_interval,
            config,
            settings,
            cells,
            cache: CellLocationCache::new(),
            locator,
            subscriptions: Subscriptions::new(),
            timers,
            status: Status::Unavailable,
            positioning: false,
            current_location: None,
            last_location: None,
            last_reported: None,
            last_online_fix: None,
            last_query: None,
            signals,
        };

        if let Some(reason) = provider.settings.configuration_fault() {
            error!(reason, "Positioning configuration can never produce a fix");
            provider.set_status(Status::Error);
        }
        provider
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn status(&self) -> Status {
        self.status
    }

    /// Current location, or the last one while the fix is lost.
    pub fn position(&self) -> PositionReport {
        PositionReport::from(self.current_location.as_ref().or(self.last_location.as_ref()))
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.current_location.as_ref()
    }

    pub fn last_location(&self) -> Option<&Location> {
        self.last_location.as_ref()
    }

    /// `(name, description)` for `GetProviderInfo`.
    pub fn provider_info(&self) -> (&'static str, &'static str) {
        (PROVIDER_NAME, PROVIDER_DESCRIPTION)
    }

    pub fn is_positioning(&self) -> bool {
        self.positioning
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn settings(&self) -> &PositioningSettings {
        &self.settings
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn timers(&self) -> &ProviderTimers {
        &self.timers
    }

    pub fn cache(&self) -> &CellLocationCache {
        &self.cache
    }

    /// Mutable cache access, for seeding known cell positions.
    pub fn cache_mut(&mut self) -> &mut CellLocationCache {
        &mut self.cache
    }

    pub fn locator(&self) -> &OnlineLocator<T> {
        &self.locator
    }

    /// Nearest armed timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderSignal> {
        self.signals.subscribe()
    }

    // -------------------------------------------------------------------------
    // Client interface
    // -------------------------------------------------------------------------

    /// A client starts using the provider.
    pub fn add_reference(&mut self, client: &ClientId, now: Instant) {
        let was_idle = self.subscriptions.total_references() == 0;
        self.subscriptions.add_reference(client);
        self.refresh_update_interval(now);
        if was_idle {
            self.timers.disarm(TimerKind::Idle);
            self.start_positioning(now);
        }
    }

    /// A client stops using the provider.
    pub fn remove_reference(&mut self, client: &ClientId, now: Instant) {
        if self.subscriptions.remove_reference(client) {
            self.after_release(now);
        }
    }

    /// A client vanished from the bus; all its references are released.
    pub fn client_disconnected(&mut self, client: &ClientId, now: Instant) {
        if self.subscriptions.remove_client(client) > 0 {
            self.after_release(now);
        }
    }

    /// Apply options sent by a client.
    pub fn set_options(&mut self, client: &ClientId, options: ClientOptions, now: Instant) {
        if let Some(ms) = options.update_interval_ms {
            debug!(client = %client, update_interval_ms = ms, "Client requested update interval");
            if self
                .subscriptions
                .set_update_interval(client, Duration::from_millis(ms))
            {
                self.refresh_update_interval(now);
            }
        }
    }

    fn after_release(&mut self, now: Instant) {
        if self.subscriptions.total_references() == 0 {
            info!(
                idle_timeout_secs = self.config.idle_timeout.as_secs(),
                "Last client released, idle timer started"
            );
            self.timers.arm(TimerKind::Idle, now, self.config.idle_timeout);
        }
        self.refresh_update_interval(now);
    }

    fn refresh_update_interval(&mut self, now: Instant) {
        let interval = self.subscriptions.effective_interval(
            self.config.default_update_interval,
            self.config.minimum_update_interval,
        );
        if interval == self.update_interval {
            return;
        }
        debug!(
            from_ms = self.update_interval.as_millis() as u64,
            to_ms = interval.as_millis() as u64,
            "Update interval changed"
        );
        self.update_interval = interval;
        if self.positioning {
            self.timers
                .arm(TimerKind::RecalculatePosition, now, interval);
        }
    }

    // -------------------------------------------------------------------------
    // Collaborator events
    // -------------------------------------------------------------------------

    /// The telephony stack reported a new cell scan.
    pub fn on_cell_scan(&mut self, now: Instant) {
        self.calculate_position(now);
    }

    /// WLAN scan results or connectivity changed.
    pub fn on_wlan_changed(&mut self, now: Instant) {
        if self.settings.wlan_data_allowed {
            self.calculate_position(now);
        }
    }

    /// An online lookup completed.
    pub fn on_network_reply(&mut self, reply: NetworkReply, now: Instant) {
        let Some(outcome) = self.locator.finish(reply, now) else {
            return;
        };
        if !self.positioning {
            debug!("Discarding lookup outcome, positioning stopped");
            return;
        }

        match outcome.result {
            Ok(fix) => {
                let source = if fix.is_fallback() {
                    debug!(fallback = ?fix.fallback, "Fallback answer is not cached");
                    LocationSource::Fallback
                } else {
                    self.cache_online_fix(&outcome.query_cells, fix.coordinates);
                    LocationSource::Online
                };
                self.last_online_fix = Some(now);
                self.update_location(Location::new(fix.coordinates, source), now);
            }
            Err(e) if e.is_not_found() => {
                for cell in &outcome.query_cells {
                    if self.cache.mark_unlocatable(*cell) {
                        debug!(cell = %cell, "Cell marked unlocatable");
                    }
                }
            }
            Err(_) => {}
        }
    }

    /// Positioning settings changed.
    pub fn on_config_change(&mut self, settings: PositioningSettings, now: Instant) {
        if settings == self.settings {
            return;
        }
        info!(
            enabled = settings.positioning_enabled,
            cell = settings.cell_positioning_enabled,
            online = settings.online_positioning_enabled,
            cellular_data = settings.cellular_data_allowed,
            wlan_data = settings.wlan_data_allowed,
            "Positioning settings changed"
        );
        self.locator.apply_settings(&settings);
        self.settings = settings;

        if !self.can_position() {
            if let Some(reason) = self.settings.configuration_fault() {
                error!(reason, "Positioning configuration can never produce a fix");
            }
            self.stop_positioning();
            self.set_status(self.resting_status());
            return;
        }

        if self.status == Status::Error {
            self.set_status(Status::Unavailable);
        }
        if self.positioning {
            self.calculate_position(now);
        } else if self.subscriptions.total_references() > 0 {
            self.start_positioning(now);
        }
    }

    /// Handle every timer due at `now`.
    ///
    /// Returns `true` when the idle timer released the provider.
    pub fn process_timers(&mut self, now: Instant) -> bool {
        let mut idle = false;
        while let Some(kind) = self.timers.pop_expired(now) {
            idle |= self.on_timer(kind, now);
        }
        idle
    }

    fn on_timer(&mut self, kind: TimerKind, now: Instant) -> bool {
        debug!(timer = %kind, "Timer expired");
        match kind {
            TimerKind::Idle => {
                if self.subscriptions.total_references() > 0 {
                    return false;
                }
                info!("Idle timeout, releasing positioning");
                self.stop_positioning();
                let _ = self.signals.send(ProviderSignal::IdleShutdown);
                true
            }
            TimerKind::FixLost => {
                if self.status == Status::Available {
                    info!("Fix lost");
                    if let Some(current) = self.current_location.take() {
                        self.last_location = Some(current);
                    }
                    self.set_status(Status::Acquiring);
                }
                false
            }
            TimerKind::RecalculatePosition => {
                if self.positioning {
                    self.timers
                        .arm(TimerKind::RecalculatePosition, now, self.update_interval);
                    self.calculate_position(now);
                }
                false
            }
        }
    }

    /// Stop all positioning work, e.g. before the daemon exits.
    pub fn shutdown(&mut self) {
        self.stop_positioning();
    }

    // -------------------------------------------------------------------------
    // Positioning
    // -------------------------------------------------------------------------

    fn can_position(&self) -> bool {
        self.settings.positioning_enabled && self.settings.configuration_fault().is_none()
    }

    fn resting_status(&self) -> Status {
        if self.settings.configuration_fault().is_some() {
            Status::Error
        } else {
            Status::Unavailable
        }
    }

    fn start_positioning(&mut self, now: Instant) {
        if self.positioning {
            return;
        }
        if !self.can_position() {
            debug!(status = %self.status, "Positioning requested but disabled");
            return;
        }
        info!(
            update_interval_ms = self.update_interval.as_millis() as u64,
            "Starting positioning"
        );
        self.positioning = true;
        self.timers
            .arm(TimerKind::RecalculatePosition, now, self.update_interval);
        self.calculate_position(now);
    }

    fn stop_positioning(&mut self) {
        if !self.positioning {
            return;
        }
        info!("Stopping positioning");
        self.positioning = false;
        self.locator.cancel();
        self.timers.disarm(TimerKind::RecalculatePosition);
        self.timers.disarm(TimerKind::FixLost);
        if let Some(current) = self.current_location.take() {
            self.last_location = Some(current);
        }
        self.last_query = None;
        self.set_status(self.resting_status());
    }

    fn calculate_position(&mut self, now: Instant) {
        if !self.positioning {
            return;
        }

        let visible = self.cells.visible_cells();
        let (estimate, unresolved) = self.estimate_from_cache(&visible);
        debug!(
            visible = visible.len(),
            unresolved,
            resolved = estimate.is_some(),
            "Calculating position"
        );

        // Fully cached scans never touch the network.
        let online_usable = if estimate.is_none() || unresolved > 0 {
            self.request_online_lookup(&visible, now)
        } else {
            false
        };
        let online_fresh = self.online_fix_is_fresh(now);

        match estimate {
            Some(_) if online_fresh => {
                debug!("Keeping fresher online fix");
            }
            Some(coordinates) => {
                self.update_location(Location::new(coordinates, LocationSource::CellCache), now);
            }
            None if online_usable || self.locator.is_in_flight() => {
                if self.status == Status::Unavailable {
                    self.set_status(Status::Acquiring);
                }
            }
            None => {
                if self.current_location.is_none() {
                    debug!("No usable positioning source");
                    self.set_status(Status::Unavailable);
                }
            }
        }
    }

    /// Centroid of cached cells and the number of cells never resolved.
    fn estimate_from_cache(&self, visible: &[CellPositioningData]) -> (Option<Coordinates>, usize) {
        if !self.settings.cell_positioning_enabled {
            return (None, 0);
        }

        let mut resolved: BTreeMap<UniqueCellId, (Coordinates, u32)> = BTreeMap::new();
        let mut unresolved = 0;
        for cell in visible {
            match self.cache.lookup(&cell.unique_cell_id) {
                CacheLookup::Found(coordinates) => {
                    resolved
                        .entry(cell.unique_cell_id)
                        .or_insert((coordinates, cell.signal_strength));
                }
                CacheLookup::NotFound => unresolved += 1,
                CacheLookup::KnownUnlocatable => {}
            }
        }

        let inputs: Vec<(Coordinates, u32)> = resolved.into_values().collect();
        (weighted_centroid(&inputs), unresolved)
    }

    /// Offer a query to the locator.
    ///
    /// Returns whether the online service is a usable source for the current
    /// observations, whether or not a request went out now.
    fn request_online_lookup(&mut self, visible: &[CellPositioningData], now: Instant) -> bool {
        if !self.settings.online_possible() {
            return false;
        }

        let home_network = self.cells.home_network();
        let query =
            self.locator
                .build_query(visible, home_network.as_ref(), self.last_query.as_ref(), now);
        let usable = !query.is_empty() || self.locator.config().fallback_ipf;
        if usable {
            self.locator.find_location(&query, now);
        }
        self.last_query = Some(query);
        usable
    }

    fn online_fix_is_fresh(&self, now: Instant) -> bool {
        self.last_online_fix
            .is_some_and(|at| now.saturating_duration_since(at) < self.update_interval)
    }

    fn cache_online_fix(&mut self, cells: &[UniqueCellId], coordinates: Coordinates) {
        for cell in cells {
            if !matches!(self.cache.lookup(cell), CacheLookup::Found(_)) {
                debug!(cell = %cell, "Caching online location for cell");
                self.cache.store(*cell, coordinates);
            }
        }
    }

    fn update_location(&mut self, location: Location, now: Instant) {
        if !location.coordinates.is_valid() {
            warn!(
                latitude = location.coordinates.latitude,
                longitude = location.coordinates.longitude,
                "Ignoring invalid location"
            );
            return;
        }

        // Never jump from Unavailable straight to Available.
        if self.status == Status::Unavailable {
            self.set_status(Status::Acquiring);
        }

        self.timers.arm(
            TimerKind::FixLost,
            now,
            self.config.fix_lost_timeout_for(self.update_interval),
        );

        let changed = self
            .last_reported
            .as_ref()
            .map_or(true, |previous| !previous.same_fix(&location));

        self.current_location = Some(location.clone());
        self.set_status(Status::Available);

        if changed {
            info!(
                latitude = location.coordinates.latitude,
                longitude = location.coordinates.longitude,
                accuracy = location.accuracy.horizontal,
                source = %location.source,
                "Position changed"
            );
            let _ = self
                .signals
                .send(ProviderSignal::PositionChanged(PositionReport::from_location(&location)));
            self.last_reported = Some(location);
        }
    }

    fn set_status(&mut self, status: Status) {
        if status == self.status {
            return;
        }
        info!(from = %self.status, to = %status, "Status changed");
        self.status = status;
        let _ = self.signals.send(ProviderSignal::StatusChanged(status));
    }
}
