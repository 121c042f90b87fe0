//! /health, /metrics, /usage and /static.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;

use super::common::{
    create_job, expect_error, get, png_page, read_body, read_json, send, send_from,
    send_without_peer, upload_page, TestApp,
};

#[tokio::test]
async fn test_health_reports_registered_components() {
    let app = TestApp::new().await;

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_secs"].as_f64().is_some());
    assert_eq!(body["active_jobs"], 0);

    let names: Vec<&str> = body["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"store"));
    assert!(names.contains(&"storage"));
}

#[tokio::test]
async fn test_unhealthy_component_flips_health_to_503() {
    let app = TestApp::new().await;
    app.health.mark_unhealthy("store", "Connection refused");

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json(response).await;
    assert_eq!(body["status"], "unhealthy");

    // Degraded is still serving traffic.
    app.health.mark_degraded("store", "Slow queries");
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_exposition_counts_requests() {
    let app = TestApp::new().await;
    upload_page(&app).await;

    let response = send(&app, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap(),
        "text/plain; version=0.0.4; charset=utf-8"
    );

    let text = String::from_utf8(read_body(response).await.to_vec()).unwrap();
    assert!(text.contains("webtoon_uploads_total 1"));
}

#[tokio::test]
async fn test_usage_tracks_the_calling_client_only() {
    let app = TestApp::new().await;

    let response = send(&app, get("/usage")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["usedCount"], 0);
    assert_eq!(body["limit"], 50);
    assert!(body["resetsAt"].is_string());

    let upload_id = upload_page(&app).await;
    create_job(&app, &upload_id).await;

    let body = read_json(send(&app, get("/usage")).await).await;
    assert_eq!(body["usedCount"], 1);

    // Another peer sees a fresh counter.
    let other: SocketAddr = "198.51.100.42:52000".parse().unwrap();
    let body = read_json(send_from(&app, other, get("/usage")).await).await;
    assert_eq!(body["usedCount"], 0);

    // Without a peer address there is no counter to report.
    let response = send_without_peer(&app, get("/usage")).await;
    expect_error(response, StatusCode::BAD_REQUEST, "UNKNOWN_CLIENT").await;
}

#[tokio::test]
async fn test_static_serves_stored_blobs() {
    let app = TestApp::new().await;
    let data = Bytes::from(png_page(640, 480));
    app.storage
        .put("original/upload_0ddba11c.png", data.clone())
        .await
        .unwrap();

    let response = send(&app, get("/static/original/upload_0ddba11c.png")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap(),
        "image/png"
    );
    assert_eq!(read_body(response).await, data);
}

#[tokio::test]
async fn test_static_answers_the_same_404_for_missing_and_invalid_keys() {
    let app = TestApp::new().await;

    let response = send(&app, get("/static/result/tr_ffffffff_result.png")).await;
    expect_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    // Traversal-shaped keys do not leak a different error.
    let response = send(&app, get("/static/..%2F..%2Fetc%2Fpasswd")).await;
    expect_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

#[tokio::test]
async fn test_cors_reflects_configured_origins() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap()),
        Some("http://localhost:3000")
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
