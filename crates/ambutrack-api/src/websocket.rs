//! Live tracking WebSocket: connection, session pump, and frame parsing.
//!
//! [`WsConnector`] opens the tracking socket and spawns a pump task that
//! forwards every frame, error, and close through an mpsc channel owned by
//! a [`SocketSession`]. Reconnection policy is NOT handled here: the
//! session ends with exactly one [`SocketEvent::Closed`] and the caller
//! decides what to do next.
//!
//! # Example
//!
//! ```rust,ignore
//! use ambutrack_api::websocket::{Connector, SocketEvent, WsConnector, parse_frame};
//! use url::Url;
//!
//! let url = Url::parse("ws://localhost:8080/api/ambulance/ws/web?token=...")?;
//! let mut session = WsConnector::default().connect(url).await?;
//!
//! while let Some(event) = session.next_event().await {
//!     match event {
//!         SocketEvent::Frame(text) => println!("{:?}", parse_frame(&text)),
//!         SocketEvent::Error(e) => eprintln!("socket error: {e}"),
//!         SocketEvent::Closed { code, .. } => break,
//!     }
//! }
//! ```

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use crate::error::Error;

// ── Close codes ──────────────────────────────────────────────────────

/// Close code for an intentional, caller-initiated shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

const SESSION_CHANNEL_CAPACITY: usize = 256;

// ── Session ──────────────────────────────────────────────────────────

/// Something that happened on an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A UTF-8 text frame.
    Frame(String),
    /// A transport-level error. A `Closed` event follows.
    Error(String),
    /// The connection is gone. Always the last event of a session.
    Closed { code: u16, reason: String },
}

/// A close request sent from the session owner to the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub code: u16,
    pub reason: String,
}

/// One open socket connection, seen from the consumer side.
///
/// Events arrive in wire order. Dropping the session closes the socket.
#[derive(Debug)]
pub struct SocketSession {
    events: mpsc::Receiver<SocketEvent>,
    close_tx: Option<oneshot::Sender<CloseRequest>>,
    finished: bool,
}

/// The producer side of a [`SocketSession`].
///
/// Held by the pump task of a real connection, or by a test driving a
/// fake one.
#[derive(Debug)]
pub struct SessionPeer {
    pub events: mpsc::Sender<SocketEvent>,
    pub close_rx: oneshot::Receiver<CloseRequest>,
}

impl SocketSession {
    /// Create a connected session/peer pair.
    pub fn pair() -> (Self, SessionPeer) {
        let (events_tx, events_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                events: events_rx,
                close_tx: Some(close_tx),
                finished: false,
            },
            SessionPeer {
                events: events_tx,
                close_rx,
            },
        )
    }

    /// Wait for the next event.
    ///
    /// A peer that vanished without sending `Closed` is reported as an
    /// abnormal closure, once; after that this returns `None`.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await.unwrap_or_else(|| SocketEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: "connection dropped".into(),
        });
        if matches!(event, SocketEvent::Closed { .. }) {
            self.finished = true;
        }
        Some(event)
    }

    /// Ask the peer to close the connection with `code` and `reason`.
    ///
    /// Only the first call has any effect.
    pub fn close(&mut self, code: u16, reason: impl Into<String>) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(CloseRequest {
                code,
                reason: reason.into(),
            });
        }
    }
}

// ── Connector ────────────────────────────────────────────────────────

/// Opens socket sessions.
///
/// The production implementation is [`WsConnector`]; tests substitute a
/// fake that hands out [`SocketSession::pair`] halves.
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake. Resolves once the connection is open.
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<SocketSession, Error>>;
}

/// `tokio-tungstenite` backed [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<SocketSession, Error>> {
        Box::pin(connect_and_pump(url))
    }
}

/// Establish a connection and spawn the pump that feeds the session.
async fn connect_and_pump(url: Url) -> Result<SocketSession, Error> {
    tracing::info!(url = %redact_token(&url), "Connecting to tracking WebSocket");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(handshake_error)?;

    tracing::info!("Tracking WebSocket connected");

    let (session, peer) = SocketSession::pair();
    tokio::spawn(pump(ws_stream, peer));
    Ok(session)
}

/// Classify a failed handshake.
///
/// A 401 rejection is an auth failure and any other 4xx is a permanent API
/// error, so neither is retried. Everything else (refused, reset, 5xx) is a
/// transient connect failure.
fn handshake_error(err: tungstenite::Error) -> Error {
    let tungstenite::Error::Http(ref response) = err else {
        return Error::WebSocketConnect(err.to_string());
    };
    let status = response.status().as_u16();
    let message = response
        .body()
        .as_deref()
        .and_then(crate::client::error_message);
    tracing::warn!(status, "tracking handshake rejected");
    match status {
        401 => Error::Unauthorized { message },
        400..=499 => Error::Api { status, message },
        _ => Error::WebSocketConnect(err.to_string()),
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Read frames until the connection ends or the owner asks to close.
async fn pump(ws_stream: WsStream, peer: SessionPeer) {
    let SessionPeer {
        events,
        mut close_rx,
    } = peer;
    let (mut write, mut read) = ws_stream.split();

    let closed = loop {
        tokio::select! {
            biased;
            request = &mut close_rx => {
                // An Err here means the session was dropped: close normally.
                let request = request.unwrap_or(CloseRequest {
                    code: NORMAL_CLOSURE,
                    reason: "session dropped".into(),
                });
                let frame = CloseFrame {
                    code: CloseCode::from(request.code),
                    reason: request.reason.clone().into(),
                };
                if let Err(e) = write.send(tungstenite::Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "failed to send close frame");
                }
                tracing::info!(code = request.code, reason = %request.reason, "WebSocket closed by client");
                break SocketEvent::Closed {
                    code: request.code,
                    reason: request.reason,
                };
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if events.send(SocketEvent::Frame(text.to_string())).await.is_err() {
                            // Session gone; nobody left to report to.
                            return;
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (ABNORMAL_CLOSURE, String::new()),
                            |cf| (u16::from(cf.code), cf.reason.to_string()),
                        );
                        tracing::info!(code, reason = %reason, "WebSocket close frame received");
                        break SocketEvent::Closed { code, reason };
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read error");
                        let _ = events.send(SocketEvent::Error(e.to_string())).await;
                        break SocketEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break SocketEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "stream ended".into(),
                        };
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    };

    let _ = events.send(closed).await;
}

/// Render a URL for logs with the `token` query parameter masked.
pub fn redact_token(url: &Url) -> Url {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return redacted;
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Raw frame envelope the tracking service sends over the WebSocket.
///
/// ```json
/// { "type": "location_update", "payload": {...}, "data": {...}, "target": "web" }
/// ```
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    #[allow(dead_code)]
    target: Option<String>,
}

/// The body of an inbound event, by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Value),
    Many(Vec<Value>),
    Text(String),
    Empty,
}

impl Payload {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Array(items)) => Self::Many(items),
            Some(obj @ Value::Object(_)) => Self::One(obj),
            Some(Value::String(s)) => Self::Text(s),
            _ => Self::Empty,
        }
    }

    /// The object entries of this payload, in order.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(items) => items,
            Self::Text(_) | Self::Empty => Vec::new(),
        }
    }
}

/// A parsed inbound tracking event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Full fleet listing pushed right after the socket opens.
    InitialLocations(Payload),
    /// One or more position reports.
    LocationUpdate(Payload),
    /// A single vehicle changed status.
    StatusUpdate(Payload),
    /// Server greeting.
    Connected(Option<String>),
    /// Server-reported error message.
    Error(String),
    /// A `type` this client does not understand.
    Unknown(String),
}

impl InboundEvent {
    /// The wire `type` string for this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::InitialLocations(_) => "initial_locations",
            Self::LocationUpdate(_) => "location_update",
            Self::StatusUpdate(_) => "status_update",
            Self::Connected(_) => "connected",
            Self::Error(_) => "error",
            Self::Unknown(kind) => kind,
        }
    }

    fn from_raw(raw: RawFrame) -> Self {
        // `payload` is the current field; `data` predates it.
        let body = raw.payload.filter(|v| !v.is_null()).or(raw.data);
        let payload = Payload::from_value(body);

        match raw.kind.as_str() {
            "initial_locations" => Self::InitialLocations(payload),
            "location_update" => Self::LocationUpdate(payload),
            "status_update" => Self::StatusUpdate(payload),
            "connected" => Self::Connected(match payload {
                Payload::Text(text) => Some(text),
                Payload::One(obj) => obj["message"].as_str().map(String::from),
                _ => None,
            }),
            "error" => Self::Error(match payload {
                Payload::Text(text) => text,
                Payload::One(obj) => obj["message"]
                    .as_str()
                    .map_or_else(|| "Tracking service reported an error".into(), String::from),
                _ => "Tracking service reported an error".into(),
            }),
            _ => Self::Unknown(raw.kind),
        }
    }
}

/// Parse a WebSocket text frame into an [`InboundEvent`].
///
/// Fails only when the frame is not JSON or has no string `type`.
pub fn parse_frame(text: &str) -> Result<InboundEvent, Error> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })?;
    Ok(InboundEvent::from_raw(raw))
}

// ── Tests ────────────────────────────────────────────────────────────
