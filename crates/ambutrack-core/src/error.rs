// ── Core error types ──
//
// User-facing errors from ambutrack-core. Consumers never see raw HTTP or
// WebSocket failures; the `From<ambutrack_api::Error>` impl translates them
// into tracking-level variants. Most of these surface as error *state* on
// the `Tracker` rather than as `Err` returns.

use thiserror::Error;

/// Error-state text when no bearer token is available.
pub const NO_TOKEN_MESSAGE: &str = "No authentication token found";
/// Error-state text for a socket error event.
pub const SOCKET_ERROR_MESSAGE: &str = "WebSocket connection error";
/// Error-state text when the handshake fails.
pub const HANDSHAKE_FAILED_MESSAGE: &str = "Failed to establish WebSocket connection";
/// Error-state text for a bootstrap failure without a server message.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch online ambulances";

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("No authentication token found")]
    Unauthenticated,

    // ── Connection ───────────────────────────────────────────────────
    #[error("Connection failed: {reason}")]
    Transport { reason: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Malformed payload: {message}")]
    Decode { message: String },

    /// The bootstrap request failed. `message` is the server's text when
    /// it sent one.
    #[error("Fleet fetch failed: {}", .message.as_deref().unwrap_or(FETCH_FAILED_MESSAGE))]
    Fetch {
        message: Option<String>,
        status: Option<u16>,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The text published on the tracker's error state for this failure.
    pub fn state_message(&self) -> String {
        match self {
            Self::Unauthenticated => NO_TOKEN_MESSAGE.into(),
            Self::Transport { .. } => HANDSHAKE_FAILED_MESSAGE.into(),
            Self::Fetch { message, .. } => message
                .clone()
                .unwrap_or_else(|| FETCH_FAILED_MESSAGE.into()),
            other => other.to_string(),
        }
    }

    /// `true` when the server rejected the credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Fetch { status: Some(401), .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ambutrack_api::Error> for CoreError {
    fn from(err: ambutrack_api::Error) -> Self {
        match err {
            ambutrack_api::Error::Unauthorized { message } => CoreError::Fetch {
                message,
                status: Some(401),
            },
            ambutrack_api::Error::Api { status, message } => CoreError::Fetch {
                message,
                status: Some(status),
            },
            ambutrack_api::Error::Transport(ref e) => CoreError::Transport {
                reason: e.to_string(),
            },
            ambutrack_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ambutrack_api::Error::Tls(msg) => CoreError::Transport {
                reason: format!("TLS error: {msg}"),
            },
            ambutrack_api::Error::WebSocketConnect(reason) => CoreError::Transport {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ambutrack_api::Error::WebSocketClosed { code, reason } => CoreError::Transport {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            ambutrack_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
        }
    }
}
