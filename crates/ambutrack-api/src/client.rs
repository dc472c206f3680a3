// Fleet REST client
//
// Wraps `reqwest::Client` with base-URL joining, bearer authentication, and
// error-body extraction. Endpoint methods live in sibling modules as
// inherent impls so this file stays focused on transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::ApiResponse;
use crate::transport::TransportConfig;

/// Raw HTTP client for the tracking service's REST API.
///
/// The bearer token is passed per request rather than baked into the
/// client: callers read it from durable storage at call time.
pub struct FleetClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FleetClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `http://localhost:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Join an absolute API path (e.g. `/api/ambulance/online`) onto the
    /// base URL, keeping any path prefix the base carries.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and return the decoded JSON body.
    pub(crate) async fn get_json(
        &self,
        url: Url,
        token: Option<&SecretString>,
    ) -> Result<Value, Error> {
        debug!("GET {}", url);

        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        Self::parse_body(resp).await
    }

    /// Decode a response body, turning non-success statuses into
    /// [`Error::Unauthorized`] or [`Error::Api`] with the server's `message`
    /// when it sent one.
    async fn parse_body(resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized {
                message: error_message(body.as_bytes()),
            });
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(body.as_bytes()),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// The non-blank `message` of a `{ status, message }` error body.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiResponse<Value>>(body)
        .ok()
        .and_then(|env| env.message)
        .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> FleetClient {
        FleetClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let c = client("http://localhost:8080/");
        assert_eq!(
            c.api_url("/api/ambulance/online").unwrap().as_str(),
            "http://localhost:8080/api/ambulance/online"
        );
    }

    #[test]
    fn error_message_ignores_blank_and_non_json_bodies() {
        assert_eq!(
            error_message(br#"{"status":401,"message":"Token expired"}"#).as_deref(),
            Some("Token expired")
        );
        assert_eq!(error_message(br#"{"message":"  "}"#), None);
        assert_eq!(error_message(b"<html>502</html>"), None);
    }

    #[test]
    fn api_url_keeps_base_prefix() {
        let c = client("https://dispatch.example.org/tracking");
        assert_eq!(
            c.api_url("/api/ambulance/online").unwrap().as_str(),
            "https://dispatch.example.org/tracking/api/ambulance/online"
        );
    }
}
