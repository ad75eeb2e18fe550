//! HTTP boundary tests driven through the router without a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use cloakstream::config::CloakstreamConfig;
use cloakstream::scan::RegexEngine;
use cloakstream::server::{router, AppState};

fn app(uploads_dir: &str) -> axum::Router {
    let config = CloakstreamConfig {
        uploads_dir: uploads_dir.to_string(),
        ..CloakstreamConfig::default()
    };
    router(AppState {
        config: Arc::new(config),
        engine: Arc::new(RegexEngine::new().unwrap()),
    })
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn config_endpoint_recommends_sizing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.csv"), "a,b\n1,2\n3,4\n").unwrap();

    let response = app(dir.path().to_str().unwrap())
        .oneshot(
            Request::get("/api/stream/config/data.csv").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["filename"], "data.csv");
    assert_eq!(json["fileSize"], 12);
    assert!(json["recommendedChunkSize"].as_u64().unwrap() >= 8 * 1024);
    assert!(json["estimatedChunks"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn config_endpoint_missing_file_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path().to_str().unwrap())
        .oneshot(
            Request::get("/api/stream/config/nope.csv").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"]["code"], "FILE_NOT_FOUND");
}

#[tokio::test]
async fn stream_endpoint_missing_file_is_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path().to_str().unwrap())
        .oneshot(Request::post("/api/stream/nope.csv").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["error"]["code"], "FILE_NOT_FOUND");
}

#[tokio::test]
async fn stream_endpoint_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let response = app(dir.path().to_str().unwrap())
        .oneshot(
            Request::post("/api/stream/..%2Fescape.csv").body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_endpoint_emits_ordered_sse_frames() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("people.csv"),
        "name,email\nJohn,john@test.com\nJane,none\n",
    )
    .unwrap();

    let response = app(dir.path().to_str().unwrap())
        .oneshot(Request::post("/api/stream/people.csv").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = body_string(response).await;

    let connected = body.find("event: connected").unwrap();
    let progress = body.find("event: progress").unwrap();
    let chunk = body.find("event: chunk").unwrap();
    let pii = body.find("event: pii-detected").unwrap();
    let complete = body.find("event: complete").unwrap();
    assert!(connected < progress && progress < chunk && chunk < pii && pii < complete);

    // Exactly one terminal frame, and masked data on the wire.
    assert_eq!(body.matches("event: complete").count(), 1);
    assert!(!body.contains("event: error"));
    assert!(body.contains("j***@test.com"));
    assert!(!body.contains("john@test.com"));
}

#[tokio::test]
async fn stream_endpoint_honors_options_body() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("keep.csv"),
        "email\njohn@test.com\n",
    )
    .unwrap();

    let response = app(dir.path().to_str().unwrap())
        .oneshot(
            Request::post("/api/stream/keep.csv")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"preservePII": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.contains("john@test.com"));
    assert!(!body.contains("j***@test.com"));
    assert!(body.contains("event: pii-detected"));
}
