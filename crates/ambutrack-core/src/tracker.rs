// ── Tracker facade ──
//
// Public entry point for live fleet tracking. Wires the transport channel,
// the router task, the bootstrap fetcher, and the fleet store together,
// and exposes connection state, error state, and the loading flag as
// `watch` receivers.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use ambutrack_api::{Connector, FleetClient, InboundEvent, Payload, WsConnector};

use crate::bootstrap::{BootstrapOutcome, Bootstrapper};
use crate::channel::{ChannelParts, ChannelSignal, TransportChannel};
use crate::config::TrackerConfig;
use crate::convert::normalize_value;
use crate::credentials::TokenSource;
use crate::error::CoreError;
use crate::model::VehicleRecord;
use crate::status::{ConnectionState, TrackerStatus};
use crate::store::FleetStore;
use crate::stream::FleetStream;

const SIGNAL_CHANNEL_SIZE: usize = 256;

// ── Tracker ──────────────────────────────────────────────────────

/// Live view of the ambulance fleet.
///
/// Cheaply cloneable via `Arc<TrackerInner>`. Does NOT connect on
/// construction; call [`connect()`](Self::connect). Dropping the last
/// clone closes the socket and cancels every background task.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TrackerConfig,
    store: Arc<FleetStore>,
    status: Arc<TrackerStatus>,
    channel: Arc<TransportChannel>,
    bootstrap: Arc<Bootstrapper>,
    signals_rx: Mutex<Option<mpsc::Receiver<ChannelSignal>>>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
    /// Create a tracker that talks to the real tracking socket.
    pub fn new(config: TrackerConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, CoreError> {
        Self::with_connector(config, tokens, Arc::new(WsConnector))
    }

    /// Create a tracker with a custom socket [`Connector`].
    pub fn with_connector(
        config: TrackerConfig,
        tokens: Arc<dyn TokenSource>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        let client = FleetClient::new(config.api_url.clone(), &config.transport())?;
        let store = Arc::new(FleetStore::new());
        let status = Arc::new(TrackerStatus::new());
        let (signals, signals_rx) = mpsc::channel(SIGNAL_CHANNEL_SIZE);

        let bootstrap = Arc::new(Bootstrapper::new(
            client,
            Arc::clone(&tokens),
            Arc::clone(&store),
            Arc::clone(&status),
        ));
        let channel = TransportChannel::new(ChannelParts {
            socket_url: config.socket_url.clone(),
            reconnect_delay: config.reconnect_delay,
            connector,
            tokens,
            status: Arc::clone(&status),
            signals,
        });

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                store,
                status,
                channel,
                bootstrap,
                signals_rx: Mutex::new(Some(signals_rx)),
                router: Mutex::new(None),
            }),
        })
    }

    /// Access the tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the live channel.
    ///
    /// A no-op while connecting or connected. Failures (no token,
    /// handshake error) are published on [`error()`](Self::error) rather
    /// than returned. When the channel opens, the online fleet is fetched
    /// in the background.
    pub async fn connect(&self) {
        self.start_router();
        self.inner.channel.connect().await;
    }

    /// Close the channel with `1000 "User disconnected"`, cancel any
    /// pending reconnect, and discard bootstrap results still in flight.
    pub fn disconnect(&self) {
        self.inner.bootstrap.invalidate();
        self.inner.channel.disconnect();
    }

    /// Fetch the online fleet now and replace the store with it.
    ///
    /// The error is also published on the error state.
    pub async fn refresh(&self) -> Result<BootstrapOutcome, CoreError> {
        self.inner.bootstrap.refresh().await
    }

    /// Fetch the online fleet without touching the store.
    pub async fn fetch_online(&self) -> Result<Vec<VehicleRecord>, CoreError> {
        self.inner.bootstrap.fetch_online().await
    }

    /// Tear everything down: disconnect, stop background tasks, clear the
    /// store. The tracker cannot reconnect afterwards.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }

    fn start_router(&self) {
        let Some(rx) = self
            .inner
            .signals_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let handle = tokio::spawn(router_task(
            rx,
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.status),
            Arc::clone(&self.inner.bootstrap),
        ));
        *self
            .inner
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.inner.status.connection()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status.subscribe_connection()
    }

    /// The most recent user-facing error, if any.
    pub fn error(&self) -> Option<String> {
        self.inner.status.error()
    }

    /// Subscribe to error state changes.
    pub fn errors(&self) -> watch::Receiver<Option<String>> {
        self.inner.status.subscribe_error()
    }

    /// `true` while the newest bootstrap fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.status.is_loading()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.status.subscribe_loading()
    }

    /// `true` while a delayed reconnect is waiting to fire.
    pub fn reconnect_pending(&self) -> bool {
        self.inner.channel.reconnect_pending()
    }

    // ── Fleet access (delegates to FleetStore) ───────────────────

    pub fn store(&self) -> &Arc<FleetStore> {
        &self.inner.store
    }

    pub fn fleet(&self) -> FleetStream {
        self.inner.store.subscribe()
    }

    /// All tracked vehicles, ordered by id.
    pub fn list(&self) -> Vec<Arc<VehicleRecord>> {
        self.inner.store.list()
    }

    pub fn vehicle(&self, id: &str) -> Option<Arc<VehicleRecord>> {
        self.inner.store.get(id)
    }
}

impl TrackerInner {
    fn teardown(&self) {
        self.channel.shutdown();
        self.bootstrap.invalidate();
        if let Some(router) = self
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            router.abort();
        }
        self.store.clear();
        debug!("tracker torn down");
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ── Router ───────────────────────────────────────────────────────

/// Apply channel signals to the store, strictly in arrival order.
async fn router_task(
    mut rx: mpsc::Receiver<ChannelSignal>,
    store: Arc<FleetStore>,
    status: Arc<TrackerStatus>,
    bootstrap: Arc<Bootstrapper>,
) {
    while let Some(signal) = rx.recv().await {
        match signal {
            ChannelSignal::Opened => bootstrap.spawn(),
            ChannelSignal::Event(event) => route_event(&store, &status, event),
        }
    }
    debug!("router stopped");
}

/// Apply one inbound event.
pub(crate) fn route_event(store: &FleetStore, status: &TrackerStatus, event: InboundEvent) {
    let received_at = Utc::now();
    let normalize_all = |payload: Payload| -> Vec<VehicleRecord> {
        payload
            .into_values()
            .iter()
            .filter_map(|value| normalize_value(value, received_at))
            .collect()
    };

    match event {
        InboundEvent::InitialLocations(payload) => {
            let stored = store.replace_all(normalize_all(payload));
            store.mark_stream_update();
            info!(vehicles = stored, "initial locations received");
        }
        InboundEvent::LocationUpdate(payload) => {
            let mut applied = 0usize;
            for record in normalize_all(payload) {
                store.upsert(record);
                applied += 1;
            }
            if applied > 0 {
                store.mark_stream_update();
            }
            debug!(vehicles = applied, "location update applied");
        }
        InboundEvent::StatusUpdate(Payload::One(value)) => {
            match normalize_value(&value, received_at) {
                Some(record) if !record.id.is_empty() => {
                    debug!(id = %record.id, status = %record.status, "status update applied");
                    store.upsert(record);
                    store.mark_stream_update();
                }
                _ => debug!("status update without an id ignored"),
            }
        }
        InboundEvent::StatusUpdate(_) => debug!("status update without an object payload ignored"),
        InboundEvent::Connected(message) => {
            info!(
                message = message.as_deref().unwrap_or_default(),
                "connected to tracking service"
            );
        }
        InboundEvent::Error(message) => {
            info!(error = %message, "tracking service reported an error");
            status.set_error(message);
        }
        InboundEvent::Unknown(kind) => debug!(kind = %kind, "ignoring unknown tracking event"),
    }
}
