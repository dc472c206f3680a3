// Integration tests for `FleetClient` using wiremock.
#![allow(clippy::unwrap_used)]

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ambutrack_api::fleet::ONLINE_FLEET_PATH;
use ambutrack_api::{Error, FleetClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FleetClient) {
    let server = MockServer::start().await;
    let client = FleetClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap());
    (server, client)
}

fn token() -> SecretString {
    SecretString::from("tok-123")
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_online_fleet_envelope_with_bearer() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(ONLINE_FLEET_PATH))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "message": "ok",
            "data": [
                { "id": "A1", "latitude": 1, "longitude": 2 },
                { "ambulance_id": "A2", "lat": 3, "lng": 4 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vehicles = client.list_online_vehicles(Some(&token())).await.unwrap();

    assert_eq!(vehicles.len(), 2);
    assert_eq!(vehicles[0]["id"], "A1");
    assert_eq!(vehicles[1]["ambulance_id"], "A2");
}

#[tokio::test]
async fn test_online_fleet_bare_array_without_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(ONLINE_FLEET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "A1" }])))
        .mount(&server)
        .await;

    let vehicles = client.list_online_vehicles(None).await.unwrap();
    assert_eq!(vehicles, vec![json!({ "id": "A1" })]);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_online_fleet_null_data_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(ONLINE_FLEET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "message": "no vehicles online",
            "data": null
        })))
        .mount(&server)
        .await;

    let vehicles = client.list_online_vehicles(Some(&token())).await.unwrap();
    assert!(vehicles.is_empty());
}

#[tokio::test]
async fn test_online_fleet_empty_body_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(ONLINE_FLEET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(client.list_online_vehicles(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_base_url_prefix_is_kept() {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/tracking/", server.uri())).unwrap();
    let client = FleetClient::with_client(reqwest::Client::new(), base);

    Mock::given(method("GET"))
        .and(path("/tracking/api/ambulance/online"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.list_online_vehicles(None).await.unwrap().is_empty());
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_401_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(&server)
        .await;

    let result = client.list_online_vehicles(Some(&token())).await;

    match result {
        Err(ref err @ Error::Unauthorized { .. }) => {
            assert_eq!(err.api_message(), Some("jwt expired"));
            assert!(err.is_auth_expired());
            assert!(!err.is_transient());
        }
        other => panic!("expected Unauthorized, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_401_without_body_has_no_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_online_vehicles(Some(&token())).await;

    assert!(
        matches!(result, Err(Error::Unauthorized { message: None })),
        "expected Unauthorized without message, got: {result:?}"
    );
}

#[tokio::test]
async fn test_error_message_extracted_from_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(ONLINE_FLEET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "status": 403,
            "message": "Dispatcher role required",
            "validation": null,
            "data": null
        })))
        .mount(&server)
        .await;

    let result = client.list_online_vehicles(Some(&token())).await;

    match result {
        Err(ref err @ Error::Api { status, .. }) => {
            assert_eq!(status, 403);
            assert_eq!(err.api_message(), Some("Dispatcher role required"));
            assert!(!err.is_transient());
        }
        other => panic!("expected Api 403 error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_500_without_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream crashed"))
        .mount(&server)
        .await;

    let result = client.list_online_vehicles(None).await;

    match result {
        Err(ref err @ Error::Api { status, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(err.api_message(), None);
            assert!(err.is_transient());
        }
        other => panic!("expected Api 500 error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_success_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let result = client.list_online_vehicles(None).await;

    match result {
        Err(Error::Deserialization { ref body, .. }) => {
            assert_eq!(body, "<html>gateway</html>");
        }
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
