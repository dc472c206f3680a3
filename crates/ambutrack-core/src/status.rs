// ── Observable tracker status ──
//
// Connection state, last error, and the loading flag, each published on a
// `watch` channel. Only the transport channel writes the connection state;
// the channel, router, and bootstrap fetcher all write the error.

use tokio::sync::watch;
use tracing::debug;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

pub(crate) struct TrackerStatus {
    connection: watch::Sender<ConnectionState>,
    error: watch::Sender<Option<String>>,
    loading: watch::Sender<bool>,
}

impl TrackerStatus {
    pub(crate) fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (error, _) = watch::channel(None);
        let (loading, _) = watch::channel(false);
        Self {
            connection,
            error,
            loading,
        }
    }

    // ── Connection ───────────────────────────────────────────────────

    pub(crate) fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Move `Disconnected → Connecting` atomically. Returns `false` if a
    /// connection is already being made or is open.
    pub(crate) fn try_begin_connect(&self) -> bool {
        self.connection.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn set_connection(&self, next: ConnectionState) {
        let changed = self.connection.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "connection state changed");
        }
    }

    pub(crate) fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    // ── Error ────────────────────────────────────────────────────────

    pub(crate) fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        self.error.send_replace(Some(message.into()));
    }

    pub(crate) fn clear_error(&self) {
        self.error.send_if_modified(|err| err.take().is_some());
    }

    pub(crate) fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    // ── Loading ──────────────────────────────────────────────────────

    pub(crate) fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.send_if_modified(|current| {
            let changed = *current != loading;
            *current = loading;
            changed
        });
    }

    pub(crate) fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}
