//! HTTP-level tests against a local mock backend

use rest_client::{RestClient, RestError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, PartialEq)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct VolumeBody<'a> {
    zone_id: &'a str,
    volume: u8,
}

#[test]
fn test_get_json_sends_bearer_token() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/zones/zones/")
        .match_header("authorization", "Bearer access-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": "z1", "name": "Lobby"}]"#)
        .create();

    let client = RestClient::new(server.url());
    client.set_tokens("access-1", None);

    let zones: Vec<Zone> = client.get_json("/zones/zones/").unwrap();
    assert_eq!(
        zones,
        vec![Zone {
            id: "z1".to_string(),
            name: "Lobby".to_string()
        }]
    );
    mock.assert();
}

#[test]
fn test_post_json_empty_body_decodes_as_null() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/playback/control/volume/")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "zone_id": "z1",
            "volume": 40
        })))
        .with_status(200)
        .with_body("")
        .create();

    let client = RestClient::new(server.url());
    let value: serde_json::Value = client
        .post_json(
            "/playback/control/volume/",
            &VolumeBody {
                zone_id: "z1",
                volume: 40,
            },
        )
        .unwrap();

    assert!(value.is_null());
    mock.assert();
}

#[test]
fn test_status_error_carries_body() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/playback/control/next/")
        .with_status(400)
        .with_body(r#"{"detail": "zone_id is required"}"#)
        .create();

    let client = RestClient::new(server.url());
    let result: Result<serde_json::Value, _> =
        client.post_json("/playback/control/next/", &serde_json::json!({}));

    match result {
        Err(RestError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("zone_id is required"));
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[test]
fn test_unauthorized_refreshes_token_and_retries() {
    let mut server = mockito::Server::new();
    let rejected = server
        .mock("GET", "/playback/state/by_zone/")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .create();
    let refresh = server
        .mock("POST", "/auth/refresh/")
        .match_body(mockito::Matcher::Json(serde_json::json!({"refresh": "r-1"})))
        .with_status(200)
        .with_body(r#"{"access": "fresh"}"#)
        .create();
    let accepted = server
        .mock("GET", "/playback/state/by_zone/")
        .match_query(mockito::Matcher::Any)
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(r#"{"is_playing": false}"#)
        .create();

    let client = RestClient::new(server.url());
    client.set_tokens("stale", Some("r-1".to_string()));

    let value: serde_json::Value = client
        .get_json("/playback/state/by_zone/?zone_id=z1")
        .unwrap();

    assert_eq!(value["is_playing"], serde_json::json!(false));
    assert_eq!(client.access_token().as_deref(), Some("fresh"));
    rejected.assert();
    refresh.assert();
    accepted.assert();
}

#[test]
fn test_unauthorized_without_refresh_token_is_status_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/zones/zones/")
        .with_status(401)
        .create();

    let client = RestClient::new(server.url());
    client.set_tokens("stale", None);

    let result: Result<serde_json::Value, _> = client.get_json("/zones/zones/");
    assert!(matches!(result, Err(RestError::Status { status: 401, .. })));
}

#[test]
fn test_unreachable_backend_is_network_error() {
    let client = RestClient::new("http://127.0.0.1:1");
    let result: Result<serde_json::Value, _> = client.get_json("/zones/zones/");

    let error = result.unwrap_err();
    assert!(matches!(error, RestError::Network(_)));
    assert!(error.is_transient());
}
