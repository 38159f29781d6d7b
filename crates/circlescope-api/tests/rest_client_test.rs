#![allow(clippy::unwrap_used)]

// Integration tests for `ApiClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use circlescope_api::models::MeasureStatus;
use circlescope_api::{ApiClient, Error, ErrorKind, ResourceKind};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let origin = Url::parse(&server.uri()).unwrap();
    let client = ApiClient::from_reqwest(origin, reqwest::Client::new());
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_status_snapshot() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "camera_connected": true,
            "is_running": true,
            "current_recipe": "M12-washer",
            "fps": 29.97,
            "web_clients": 2,
            "timestamp": "2026-03-01T08:30:00.123456"
        })))
        .mount(&server)
        .await;

    let status = client.status().await.unwrap();

    assert_eq!(status.camera_connected, Some(true));
    assert_eq!(status.current_recipe.as_deref(), Some("M12-washer"));
    assert_eq!(status.web_clients, Some(2));
}

#[tokio::test]
async fn test_statistics_with_missing_fields() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_inspections": 120,
            "ok_count": 114,
            "last_result": "ng"
        })))
        .mount(&server)
        .await;

    let stats = client.statistics().await.unwrap();

    assert_eq!(stats.total_inspections, Some(120));
    assert_eq!(stats.ok_count, Some(114));
    assert_eq!(stats.ng_count, None);
    assert_eq!(stats.last_result, Some(MeasureStatus::Ng));
}

#[tokio::test]
async fn test_recipe_detail_by_name() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/recipes/M12-washer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "M12-washer",
            "description": "outer ring",
            "detection_config": {"pixel_to_mm": 0.05, "min_circularity": 0.8},
            "tolerance_config": {"enabled": true, "nominal_mm": 12.0, "tolerance_mm": 0.05}
        })))
        .mount(&server)
        .await;

    let recipe = client.recipe("M12-washer").await.unwrap();

    let tolerance = recipe.tolerance_config.unwrap();
    assert_eq!(tolerance.nominal_mm, Some(12.0));
    assert_eq!(tolerance.tolerance_mm, Some(0.05));
    assert_eq!(recipe.detection_config.unwrap().pixel_to_mm, Some(0.05));
}

#[tokio::test]
async fn test_history_query_parameters() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/history"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "timestamp": "2026-03-01T08:30:02",
                    "circles": [{"diameter_mm": 12.01, "status": "OK"}],
                    "overall_status": "OK"
                },
                {
                    "timestamp": "2026-03-01T08:30:01",
                    "circles": [],
                    "overall_status": "NONE"
                }
            ],
            "total": 2,
            "limit": 50,
            "offset": 0
        })))
        .mount(&server)
        .await;

    let page = client.history(50, 0).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].circles[0].diameter_mm, Some(12.01));
    assert_eq!(page.items[1].overall_status, Some(MeasureStatus::None));
    assert_eq!(page.total, Some(2));
}

#[tokio::test]
async fn test_raw_fetch_returns_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/io/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"trigger_state": true, "mode": "sim"})),
        )
        .mount(&server)
        .await;

    let value = client.fetch(&ResourceKind::IoStatus).await.unwrap();

    assert_eq!(value["trigger_state"], true);
    assert_eq!(value["mode"], "sim");
}

#[tokio::test]
async fn test_export_is_not_parsed() {
    let (server, client) = setup().await;
    let csv = "timestamp,diameter_mm,status\n2026-03-01T08:30:02,12.010,OK\n";

    Mock::given(method("GET"))
        .and(path("/api/statistics/export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/csv")
                .set_body_string(csv),
        )
        .mount(&server)
        .await;

    let bytes = client.export_csv().await.unwrap();

    assert_eq!(String::from_utf8(bytes).unwrap(), csv);
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_is_a_resource_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/recipes/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "not found"})))
        .mount(&server)
        .await;

    let err = client.recipe("ghost").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(err.is_not_found());
    match err {
        Error::Status { status, path } => {
            assert_eq!(status, 404);
            assert_eq!(path, "/api/recipes/ghost");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/calibration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.calibration().await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let err = client.statistics().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    match err {
        Error::Decode { body, .. } => assert!(body.contains("proxy error")),
        other => panic!("expected Decode error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Port 9 (discard) on loopback is closed on test machines.
    let origin = Url::parse("http://127.0.0.1:9").unwrap();
    let client = ApiClient::from_reqwest(origin, reqwest::Client::new());

    let err = client.fetch(&ResourceKind::Status).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}
