//! Provider daemon: the single event loop that owns a [`PositionProvider`].
//!
//! All inputs reach the provider as [`ProviderEvent`]s on one channel:
//! client calls, collaborator notifications, configuration changes and
//! online lookup replies. Timers are served from the same loop by sleeping
//! until the provider's nearest deadline, so no two handlers ever run
//! concurrently.
//!
//! ```text
//!  ProviderHandle ──┐
//!  CellSource note ─┼──► mpsc ──► ProviderDaemon ──► PositionProvider
//!  ReplySink ───────┘                 │                     │
//!                                sleep_until           broadcast
//!                               (next deadline)     ProviderSignal
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cellfix::provider::{ProviderDaemon, ProviderDaemonConfig};
//!
//! let (daemon, handle) = ProviderDaemon::new(config, cells, access_points, transport);
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! let mut signals = handle.subscribe();
//! handle.add_reference(":1.42")?;
//! let status = handle.get_status().await?;
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ProviderConfig;
use super::engine::{PositionProvider, ProviderSignal, PROVIDER_DESCRIPTION, PROVIDER_NAME};
use super::error::ProviderError;
use super::location::PositionReport;
use super::status::Status;
use super::subscription::{ClientId, ClientOptions};
use crate::config::{ConfigFile, PositioningSettings};
use crate::locator::{LocatorConfig, LookupTransport, NetworkReply, OnlineLocator, ReplySink};
use crate::sources::{AccessPointSource, CellSource};

// =============================================================================
// Configuration
// =============================================================================

/// Default capacity of the signal broadcast channel.
pub const DEFAULT_SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to build a provider daemon.
#[derive(Clone, Debug, Default)]
pub struct ProviderDaemonConfig {
    pub provider: ProviderConfig,
    pub locator: LocatorConfig,
    pub settings: PositioningSettings,
    pub signal_capacity: Option<usize>,
}

impl ProviderDaemonConfig {
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            provider: config.provider_config(),
            locator: config.locator_config(),
            settings: config.positioning_settings(),
            signal_capacity: None,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Inputs to the provider event loop.
#[derive(Debug)]
pub enum ProviderEvent {
    /// The telephony stack reported new cell observations.
    CellScan,
    /// WLAN scan results or connectivity changed.
    WlanChanged,
    /// An online lookup completed.
    NetworkReply(NetworkReply),
    AddReference(ClientId),
    RemoveReference(ClientId),
    /// The client's bus connection went away.
    ClientDisconnected(ClientId),
    SetOptions {
        client: ClientId,
        options: ClientOptions,
    },
    /// Positioning settings were changed externally.
    ConfigChange(PositioningSettings),
    GetStatus(oneshot::Sender<Status>),
    GetPosition(oneshot::Sender<PositionReport>),
    /// Stop the daemon.
    Shutdown,
}

/// Forwards lookup replies into the event channel.
struct EventSink(mpsc::UnboundedSender<ProviderEvent>);

impl ReplySink for EventSink {
    fn deliver(&self, reply: NetworkReply) {
        if self.0.send(ProviderEvent::NetworkReply(reply)).is_err() {
            debug!("Provider daemon gone, dropping lookup reply");
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable client-side handle to a running daemon.
#[derive(Clone, Debug)]
pub struct ProviderHandle {
    events: mpsc::UnboundedSender<ProviderEvent>,
    signals: broadcast::Sender<ProviderSignal>,
}

impl ProviderHandle {
    /// Receive `StatusChanged`, `PositionChanged` and idle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderSignal> {
        self.signals.subscribe()
    }

    /// Send a raw event.
    pub fn send(&self, event: ProviderEvent) -> Result<(), ProviderError> {
        self.events
            .send(event)
            .map_err(|_| ProviderError::DaemonStopped)
    }

    pub fn add_reference(&self, client: impl Into<ClientId>) -> Result<(), ProviderError> {
        self.send(ProviderEvent::AddReference(client.into()))
    }

    pub fn remove_reference(&self, client: impl Into<ClientId>) -> Result<(), ProviderError> {
        self.send(ProviderEvent::RemoveReference(client.into()))
    }

    pub fn client_disconnected(&self, client: impl Into<ClientId>) -> Result<(), ProviderError> {
        self.send(ProviderEvent::ClientDisconnected(client.into()))
    }

    pub fn set_options(
        &self,
        client: impl Into<ClientId>,
        options: ClientOptions,
    ) -> Result<(), ProviderError> {
        self.send(ProviderEvent::SetOptions {
            client: client.into(),
            options,
        })
    }

    pub fn notify_cell_scan(&self) -> Result<(), ProviderError> {
        self.send(ProviderEvent::CellScan)
    }

    pub fn notify_wlan_changed(&self) -> Result<(), ProviderError> {
        self.send(ProviderEvent::WlanChanged)
    }

    pub fn change_config(&self, settings: PositioningSettings) -> Result<(), ProviderError> {
        self.send(ProviderEvent::ConfigChange(settings))
    }

    pub fn shutdown(&self) -> Result<(), ProviderError> {
        self.send(ProviderEvent::Shutdown)
    }

    pub async fn get_status(&self) -> Result<Status, ProviderError> {
        let (tx, rx) = oneshot::channel();
        self.send(ProviderEvent::GetStatus(tx))?;
        rx.await.map_err(|_| ProviderError::ReplyDropped)
    }

    pub async fn get_position(&self) -> Result<PositionReport, ProviderError> {
        let (tx, rx) = oneshot::channel();
        self.send(ProviderEvent::GetPosition(tx))?;
        rx.await.map_err(|_| ProviderError::ReplyDropped)
    }

    /// `(name, description)`.
    pub fn get_provider_info(&self) -> (&'static str, &'static str) {
        (PROVIDER_NAME, PROVIDER_DESCRIPTION)
    }
}

// =============================================================================
// Daemon
// =============================================================================

/// Runs a [`PositionProvider`] as a long-lived background task.
pub struct ProviderDaemon<T: LookupTransport> {
    provider: PositionProvider<T>,
    events: mpsc::UnboundedReceiver<ProviderEvent>,
    exit_on_idle: bool,
}

impl<T: LookupTransport> ProviderDaemon<T> {
    /// Creates a daemon and the handle clients use to reach it.
    pub fn new(
        config: ProviderDaemonConfig,
        cells: Arc<dyn CellSource>,
        access_points: Arc<dyn AccessPointSource>,
        transport: Arc<T>,
    ) -> (Self, ProviderHandle) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (signal_tx, _) = broadcast::channel(
            config
                .signal_capacity
                .unwrap_or(DEFAULT_SIGNAL_CHANNEL_CAPACITY),
        );

        let locator = OnlineLocator::new(
            transport,
            access_points,
            Arc::new(EventSink(event_tx.clone())),
            config.locator,
            &config.settings,
        );

        let exit_on_idle = config.provider.exit_on_idle;
        let provider = PositionProvider::new(
            config.provider,
            config.settings,
            cells,
            locator,
            signal_tx.clone(),
            Instant::now(),
        );

        let daemon = Self {
            provider,
            events,
            exit_on_idle,
        };
        let handle = ProviderHandle {
            events: event_tx,
            signals: signal_tx,
        };
        (daemon, handle)
    }

    /// Access the provider before the loop starts, e.g. to seed the cache.
    pub fn provider_mut(&mut self) -> &mut PositionProvider<T> {
        &mut self.provider
    }

    /// Runs the event loop until shutdown is signalled.
    ///
    /// Also returns when the idle timer expires and `exit_on_idle` is set,
    /// or when a [`ProviderEvent::Shutdown`] arrives.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(exit_on_idle = self.exit_on_idle, "Provider daemon starting");

        loop {
            let deadline = self.provider.next_deadline();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Provider daemon shutting down");
                    break;
                }

                Some(event) = self.events.recv() => {
                    if !self.handle_event(event) {
                        info!("Provider daemon shutdown requested");
                        break;
                    }
                }

                _ = sleep_until_deadline(deadline) => {
                    let idle = self.provider.process_timers(Instant::now());
                    if idle && self.exit_on_idle {
                        info!("Provider idle, daemon exiting");
                        break;
                    }
                }
            }
        }

        self.provider.shutdown();
        info!("Provider daemon stopped");
    }

    /// Returns `false` when the loop should stop.
    fn handle_event(&mut self, event: ProviderEvent) -> bool {
        let now = Instant::now();
        match event {
            ProviderEvent::CellScan => self.provider.on_cell_scan(now),
            ProviderEvent::WlanChanged => self.provider.on_wlan_changed(now),
            ProviderEvent::NetworkReply(reply) => self.provider.on_network_reply(reply, now),
            ProviderEvent::AddReference(client) => self.provider.add_reference(&client, now),
            ProviderEvent::RemoveReference(client) => {
                self.provider.remove_reference(&client, now)
            }
            ProviderEvent::ClientDisconnected(client) => {
                self.provider.client_disconnected(&client, now)
            }
            ProviderEvent::SetOptions { client, options } => {
                self.provider.set_options(&client, options, now)
            }
            ProviderEvent::ConfigChange(settings) => self.provider.on_config_change(settings, now),
            ProviderEvent::GetStatus(reply) => {
                let _ = reply.send(self.provider.status());
            }
            ProviderEvent::GetPosition(reply) => {
                let _ = reply.send(self.provider.position());
            }
            ProviderEvent::Shutdown => return false,
        }
        true
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellPositioningData, Coordinates, UniqueCellId};
    use crate::locator::MockTransport;
    use crate::sources::StaticScan;
    use std::time::Duration;

    const FOUND: &str = r#"{"location": {"lat": 48.85, "lng": 2.35}, "accuracy": 1200}"#;

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

    fn daemon_with(
        config: ProviderDaemonConfig,
    ) -> (
        ProviderDaemon<MockTransport>,
        ProviderHandle,
        Arc<MockTransport>,
        Arc<StaticScan>,
    ) {
        let transport = Arc::new(MockTransport::new());
        let scan = Arc::new(StaticScan::with_cells(vec![CellPositioningData::new(
            UniqueCellId::new(208, 1, 100, 5),
            20,
        )]));
        let (daemon, handle) = ProviderDaemon::new(
            config,
            Arc::clone(&scan) as Arc<dyn CellSource>,
            Arc::clone(&scan) as Arc<dyn AccessPointSource>,
            Arc::clone(&transport),
        );
        (daemon, handle, transport, scan)
    }

    fn config() -> ProviderDaemonConfig {
        ProviderDaemonConfig {
            settings: settings(),
            ..Default::default()
        }
    }

    async fn wait_for_position(signals: &mut broadcast::Receiver<ProviderSignal>) -> PositionReport {
        loop {
            if let ProviderSignal::PositionChanged(report) = signals.recv().await.unwrap() {
                return report;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_online_fix_through_daemon() {
        let (daemon, handle, transport, _scan) = daemon_with(config());
        transport.push_json(200, FOUND);
        let mut signals = handle.subscribe();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(daemon.run(shutdown.clone()));

        handle.add_reference(":1.7").unwrap();
        let report = wait_for_position(&mut signals).await;
        assert_eq!(report.latitude, 48.85);
        assert_eq!(report.accuracy.horizontal, 1200.0);

        assert_eq!(handle.get_status().await.unwrap(), Status::Available);
        assert_eq!(handle.get_position().await.unwrap().longitude, 2.35);
        assert!(transport.request_count() >= 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_cache_avoids_lookup() {
        let (mut daemon, handle, transport, _scan) = daemon_with(ProviderDaemonConfig {
            settings: PositioningSettings {
                online_positioning_enabled: false,
                ..settings()
            },
            ..Default::default()
        });
        daemon
            .provider_mut()
            .cache_mut()
            .store(UniqueCellId::new(208, 1, 100, 5), Coordinates::new(45.0, 5.0));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(daemon.run(shutdown.clone()));

        handle.add_reference(":1.8").unwrap();
        assert_eq!(handle.get_status().await.unwrap(), Status::Available);
        assert_eq!(handle.get_position().await.unwrap().latitude, 45.0);
        assert_eq!(transport.request_count(), 0);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_on_idle() {
        let (daemon, handle, _transport, _scan) = daemon_with(ProviderDaemonConfig {
            provider: ProviderConfig {
                exit_on_idle: true,
                ..Default::default()
            },
            ..config()
        });
        let mut signals = handle.subscribe();
        let task = tokio::spawn(daemon.run(CancellationToken::new()));

        handle.add_reference(":1.9").unwrap();
        handle.remove_reference(":1.9").unwrap();

        tokio::time::timeout(Duration::from_secs(120), task)
            .await
            .expect("daemon should exit when idle")
            .unwrap();

        let mut saw_idle = false;
        while let Ok(signal) = signals.try_recv() {
            saw_idle |= signal == ProviderSignal::IdleShutdown;
        }
        assert!(saw_idle);
        assert_eq!(handle.get_status().await, Err(ProviderError::DaemonStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_change_to_fault_reports_error() {
        let (daemon, handle, _transport, _scan) = daemon_with(config());
        let task = tokio::spawn(daemon.run(CancellationToken::new()));

        handle
            .change_config(PositioningSettings {
                cell_positioning_enabled: false,
                api_key: None,
                ..settings()
            })
            .unwrap();
        assert_eq!(handle.get_status().await.unwrap(), Status::Error);

        handle.change_config(settings()).unwrap();
        assert_eq!(handle.get_status().await.unwrap(), Status::Unavailable);

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(handle.add_reference(":1.1").is_err());
    }

    #[tokio::test]
    async fn test_provider_info() {
        let (_daemon, handle, _transport, _scan) = daemon_with(config());
        assert_eq!(handle.get_provider_info().0, "cellfix");
    }
}
