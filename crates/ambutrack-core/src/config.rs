// ── Runtime tracking configuration ──
//
// Describes *where* the tracking service lives and how to talk to it.
// Never touches disk: the CLI builds a `TrackerConfig` (usually through
// ambutrack-config) and hands it in. Credentials are not part of it; the
// bearer token comes from a `TokenSource` read at connect time.

use std::time::Duration;

use ambutrack_api::transport::{TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Path of the web tracking socket, relative to the API host.
pub const SOCKET_PATH: &str = "/api/ambulance/ws/web";

/// Delay before the single reconnect attempt after an abnormal close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (development servers with self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one tracking service.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// REST API root (e.g., `http://localhost:8080`).
    pub api_url: Url,
    /// Tracking socket endpoint, without the token query.
    pub socket_url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Delay before reconnecting after an abnormal close.
    pub reconnect_delay: Duration,
}

impl TrackerConfig {
    /// Build a config for `api_url`, deriving the socket endpoint from it.
    pub fn new(api_url: Url) -> Result<Self, CoreError> {
        let socket_url = derive_socket_url(&api_url)?;
        Ok(Self {
            api_url,
            socket_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }

    /// Override the socket endpoint.
    pub fn with_socket_url(mut self, socket_url: Url) -> Self {
        self.socket_url = socket_url;
        self
    }

    /// Override the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}

/// `http(s)://host[:port]/prefix` → `ws(s)://host[:port]/prefix/api/ambulance/ws/web`.
pub fn derive_socket_url(api_url: &Url) -> Result<Url, CoreError> {
    let scheme = match api_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CoreError::Config {
                message: format!("unsupported API URL scheme: {other}"),
            });
        }
    };

    let base = api_url.as_str().trim_end_matches('/');
    let rest = base.split_once("://").map_or(base, |(_, rest)| rest);
    Url::parse(&format!("{scheme}://{rest}{SOCKET_PATH}")).map_err(|e| CoreError::Config {
        message: format!("invalid socket URL: {e}"),
    })
}
