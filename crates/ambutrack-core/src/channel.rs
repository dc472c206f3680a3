// ── Transport channel ──
//
// Owns at most one live tracking socket. Authenticates each attempt with
// the token read at that moment, publishes connection and error state,
// forwards parsed events to the router, and schedules a single delayed
// reconnect after an abnormal close.
//
// Every session carries an epoch. `disconnect()` and `shutdown()` bump it,
// so late events from a superseded session are ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use ambutrack_api::websocket::{NORMAL_CLOSURE, parse_frame, redact_token};
use ambutrack_api::{Connector, InboundEvent, SocketEvent, SocketSession};

use crate::credentials::TokenSource;
use crate::error::{HANDSHAKE_FAILED_MESSAGE, NO_TOKEN_MESSAGE, SOCKET_ERROR_MESSAGE};
use crate::status::{ConnectionState, TrackerStatus};

/// Close reason sent on a caller-initiated disconnect.
pub const USER_DISCONNECT_REASON: &str = "User disconnected";

/// What the channel tells the router, in session order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChannelSignal {
    /// A session just opened.
    Opened,
    /// A parsed inbound event.
    Event(InboundEvent),
}

/// Static wiring for a channel.
pub(crate) struct ChannelParts {
    pub(crate) socket_url: Url,
    pub(crate) reconnect_delay: Duration,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) tokens: Arc<dyn TokenSource>,
    pub(crate) status: Arc<TrackerStatus>,
    pub(crate) signals: mpsc::Sender<ChannelSignal>,
}

struct ActiveSession {
    epoch: u64,
    stop: CancellationToken,
}

pub(crate) struct TransportChannel {
    parts: ChannelParts,
    /// Guards session hand-over and the state writes that go with it.
    session: Mutex<Option<ActiveSession>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
    epoch: AtomicU64,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TransportChannel {
    pub(crate) fn new(parts: ChannelParts) -> Arc<Self> {
        Arc::new(Self {
            parts,
            session: Mutex::new(None),
            reconnect: Mutex::new(None),
            epoch: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    fn status(&self) -> &TrackerStatus {
        &self.parts.status
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch && !self.cancel.is_cancelled()
    }

    // ── Connect ──────────────────────────────────────────────────────

    /// Open the socket unless one is already open or opening.
    ///
    /// Never fails: problems are published as error state.
    pub(crate) async fn connect(self: &Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }
        let observed = self.epoch.load(Ordering::SeqCst);
        if !self.status().try_begin_connect() {
            debug!("connect ignored: channel already connecting or connected");
            return;
        }
        self.cancel_reconnect();

        let Some(token) = self.parts.tokens.bearer() else {
            warn!("no bearer token available, not connecting");
            let _guard = lock(&self.session);
            self.status().set_error(NO_TOKEN_MESSAGE);
            self.status().set_connection(ConnectionState::Disconnected);
            return;
        };

        let Some(epoch) = self.claim_epoch(observed) else {
            debug!("connect superseded by disconnect");
            return;
        };
        let url = authenticated_url(&self.parts.socket_url, &token);
        debug!(epoch, url = %redact_token(&url), "opening tracking channel");

        let result = tokio::select! {
            () = self.cancel.cancelled() => return,
            result = self.parts.connector.connect(url) => result,
        };

        match result {
            Ok(session) => self.install(epoch, session),
            Err(e) => {
                let guard = lock(&self.session);
                if !self.is_current(epoch) {
                    return;
                }
                warn!(error = %e, "tracking handshake failed");
                self.status().set_error(HANDSHAKE_FAILED_MESSAGE);
                self.status().set_connection(ConnectionState::Disconnected);
                drop(guard);
                if e.is_transient() {
                    self.schedule_reconnect(epoch);
                } else if e.is_auth_expired() {
                    warn!(
                        server_message = e.api_message(),
                        "bearer token rejected by the tracking service, not reconnecting"
                    );
                } else {
                    warn!(status = e.status(), "handshake rejected, not reconnecting");
                }
            }
        }
    }

    /// Advance from `observed` to a fresh session epoch, unless a
    /// disconnect moved the epoch first. A superseded attempt leaves the
    /// channel `Disconnected`.
    fn claim_epoch(&self, observed: u64) -> Option<u64> {
        let _guard = lock(&self.session);
        if self
            .epoch
            .compare_exchange(observed, observed + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
            || self.cancel.is_cancelled()
        {
            self.status().set_connection(ConnectionState::Disconnected);
            return None;
        }
        Some(observed + 1)
    }

    /// Adopt a freshly opened session, unless it was superseded mid-handshake.
    fn install(self: &Arc<Self>, epoch: u64, mut session: SocketSession) {
        let mut slot = lock(&self.session);
        if !self.is_current(epoch) {
            debug!(epoch, "discarding session opened after disconnect");
            session.close(NORMAL_CLOSURE, USER_DISCONNECT_REASON);
            return;
        }

        self.status().set_connection(ConnectionState::Connected);
        self.status().clear_error();
        info!("tracking channel connected");

        let stop = self.cancel.child_token();
        tokio::spawn(read_session(Arc::clone(self), session, epoch, stop.clone()));
        *slot = Some(ActiveSession { epoch, stop });
    }

    // ── Disconnect / teardown ────────────────────────────────────────

    /// Close the socket with `1000` and cancel any pending reconnect.
    pub(crate) fn disconnect(&self) {
        let mut slot = lock(&self.session);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_reconnect();

        if let Some(active) = slot.take() {
            active.stop.cancel();
            info!("tracking channel disconnected");
        }
        self.status().set_connection(ConnectionState::Disconnected);
    }

    /// Disconnect for good. No reconnect is ever scheduled afterwards.
    pub(crate) fn shutdown(&self) {
        self.cancel.cancel();
        self.disconnect();
    }

    // ── Session events ───────────────────────────────────────────────

    fn on_closed(self: &Arc<Self>, epoch: u64, code: u16, reason: &str) {
        let mut slot = lock(&self.session);
        if !self.is_current(epoch) {
            return;
        }
        if slot.as_ref().is_some_and(|active| active.epoch == epoch) {
            slot.take();
        }
        self.status().set_connection(ConnectionState::Disconnected);
        drop(slot);

        if code == NORMAL_CLOSURE {
            info!(code, reason, "tracking channel closed");
        } else {
            warn!(code, reason, "tracking channel closed abnormally");
            self.schedule_reconnect(epoch);
        }
    }

    // ── Reconnect ────────────────────────────────────────────────────

    /// Reconnect once after the configured delay. A pending reconnect is
    /// never doubled, and nothing is scheduled once `epoch` is superseded.
    fn schedule_reconnect(self: &Arc<Self>, epoch: u64) {
        let mut slot = lock(&self.reconnect);
        if !self.is_current(epoch) {
            debug!(epoch, "reconnect skipped: session superseded");
            return;
        }
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("reconnect already pending");
            return;
        }

        let delay = self.parts.reconnect_delay;
        info!(delay = ?delay, "reconnecting after delay");
        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            tokio::select! {
                () = this.cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            lock(&this.reconnect).take();
            info!("attempting to reconnect");
            this.connect().await;
        }));
    }

    fn cancel_reconnect(&self) {
        if let Some(handle) = lock(&self.reconnect).take() {
            handle.abort();
        }
    }

    pub(crate) fn reconnect_pending(&self) -> bool {
        lock(&self.reconnect)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// `<socket_url>?token=<token>`, keeping any query the URL already has.
fn authenticated_url(socket_url: &Url, token: &SecretString) -> Url {
    let mut url = socket_url.clone();
    url.query_pairs_mut()
        .append_pair("token", token.expose_secret());
    url
}

/// Drain one session until it closes or the channel stops it.
async fn read_session(
    channel: Arc<TransportChannel>,
    mut session: SocketSession,
    epoch: u64,
    stop: CancellationToken,
) {
    if channel.parts.signals.send(ChannelSignal::Opened).await.is_err() {
        session.close(NORMAL_CLOSURE, USER_DISCONNECT_REASON);
        return;
    }

    loop {
        let event = tokio::select! {
            biased;
            () = stop.cancelled() => {
                session.close(NORMAL_CLOSURE, USER_DISCONNECT_REASON);
                return;
            }
            event = session.next_event() => event,
        };
        let Some(event) = event else { return };

        if !channel.is_current(epoch) {
            session.close(NORMAL_CLOSURE, USER_DISCONNECT_REASON);
            return;
        }

        match event {
            SocketEvent::Frame(text) => match parse_frame(&text) {
                Ok(inbound) => {
                    debug!(kind = inbound.kind(), "tracking event received");
                    if channel
                        .parts
                        .signals
                        .send(ChannelSignal::Event(inbound))
                        .await
                        .is_err()
                    {
                        session.close(NORMAL_CLOSURE, USER_DISCONNECT_REASON);
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "dropping malformed tracking frame"),
            },
            SocketEvent::Error(message) => {
                warn!(error = %message, "tracking socket error");
                channel.status().set_error(SOCKET_ERROR_MESSAGE);
            }
            SocketEvent::Closed { code, reason } => {
                channel.on_closed(epoch, code, &reason);
                return;
            }
        }
    }
}
