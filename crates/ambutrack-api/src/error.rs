use thiserror::Error;

/// Top-level error type for the `ambutrack-api` crate.
///
/// Covers every failure mode across both API surfaces: the REST fleet
/// endpoints and the live tracking WebSocket. `ambutrack-core` maps these
/// into observable tracker state.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the bearer token (HTTP 401), on the REST API or
    /// the socket handshake. `message` is the server's text when it sent one.
    #[error("Unauthorized -- {}", .message.as_deref().unwrap_or("bearer token missing, expired, or revoked"))]
    Unauthorized { message: Option<String> },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success response from the REST API.
    ///
    /// `message` is lifted from the `{ status, message }` error body when
    /// the server sends one.
    #[error("API error (HTTP {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        message: Option<String>,
    },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the bearer token was rejected and a fresh login
    /// might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The server-supplied message, if this error carried one.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// HTTP status code, if applicable.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
