// Handshake tests for `WsConnector` against a plain HTTP server that
// refuses the upgrade.
#![allow(clippy::unwrap_used)]

use serde_json::json;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use ambutrack_api::{Connector, Error, WsConnector};

async fn refusing_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "message": "denied" })))
        .mount(&server)
        .await;
    server
}

fn socket_url(server: &MockServer) -> Url {
    let mut url = Url::parse(&server.uri()).unwrap();
    url.set_scheme("ws").unwrap();
    url.set_path("/api/ambulance/ws/web");
    url.set_query(Some("token=tok"));
    url
}

#[tokio::test]
async fn test_handshake_401_is_not_retryable() {
    let server = refusing_server(401).await;

    let result = WsConnector.connect(socket_url(&server)).await;

    match result {
        Err(ref err @ Error::Unauthorized { .. }) => {
            assert!(err.is_auth_expired());
            assert!(!err.is_transient());
        }
        other => panic!("expected Unauthorized, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_403_is_not_retryable() {
    let server = refusing_server(403).await;

    let result = WsConnector.connect(socket_url(&server)).await;

    match result {
        Err(ref err @ Error::Api { status, .. }) => {
            assert_eq!(status, 403);
            assert!(!err.is_transient());
        }
        other => panic!("expected Api 403, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_503_is_retryable() {
    let server = refusing_server(503).await;

    let result = WsConnector.connect(socket_url(&server)).await;

    match result {
        Err(err) => assert!(err.is_transient(), "expected transient, got: {err:?}"),
        Ok(_) => panic!("upgrade unexpectedly accepted"),
    }
}
