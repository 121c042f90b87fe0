//! Common fixtures for driving the router in-process.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

use webtoon_translate_core::api::{router, AppState};
use webtoon_translate_core::config::{DetectionProvider, TranslationProvider};
use webtoon_translate_core::health::HealthCheck;
use webtoon_translate_core::storage::{create_backend, StorageBackend};
use webtoon_translate_core::store::create_store;
use webtoon_translate_core::{
    Config, MetadataStore, ServiceMetrics, StorageConfig, StoreConfig,
};

/// Peer address attached to requests unless a test picks its own.
pub const DEFAULT_PEER: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 77)), 40000);

const BOUNDARY: &str = "ab5a48c0f6a0b1c9";

/// The router plus raw handles for seeding state behind its back.
pub struct TestApp {
    pub config: Config,
    pub store: Arc<dyn MetadataStore>,
    pub storage: Arc<dyn StorageBackend>,
    pub health: Arc<HealthCheck>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = create_store(&config.store).await.unwrap();
        let storage = create_backend(&config.storage).unwrap();
        let metrics = Arc::new(ServiceMetrics::new());
        let health = Arc::new(HealthCheck::new());
        health.register_component("store");
        health.register_component("storage");

        let state = AppState::with_components(
            config.clone(),
            store.clone(),
            storage.clone(),
            health.clone(),
            metrics,
        )
        .unwrap();

        Self {
            config,
            store,
            storage,
            health,
            router: router(state),
        }
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store = StoreConfig::Memory;
    config.storage = StorageConfig::Memory;
    config.detection.provider = DetectionProvider::Disabled;
    config.translation.provider = TranslationProvider::Disabled;
    config.quota.ip_hash_secret = "api-test-secret".to_string();
    config
}

/// Send a request with the default peer address attached, the way the real
/// listener's connect-info service does.
pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    send_from(app, DEFAULT_PEER, request).await
}

pub async fn send_from(
    app: &TestApp,
    peer: SocketAddr,
    mut request: Request<Body>,
) -> Response<Body> {
    request.extensions_mut().insert(ConnectInfo(peer));
    app.router.clone().oneshot(request).await.unwrap()
}

/// Send a request with no peer address at all.
pub async fn send_without_peer(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Multipart POST /upload with a single field.
pub fn multipart_upload(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_body(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = read_body(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert an error envelope and hand the body back for further checks.
pub async fn expect_error(
    response: Response<Body>,
    status: StatusCode,
    code: &str,
) -> Value {
    assert_eq!(response.status(), status);
    let body = read_json(response).await;
    assert_eq!(body["code"].as_str(), Some(code), "body: {}", body);
    assert!(body["message"].is_string());
    body
}

pub fn png_page(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Upload one page through the API and return its id.
pub async fn upload_page(app: &TestApp) -> String {
    let request = multipart_upload("file", "page.png", "image/png", &png_page(640, 480));
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    body["uploadId"].as_str().unwrap().to_string()
}

/// Create a translation job through the API and return its id.
pub async fn create_job(app: &TestApp, upload_id: &str) -> String {
    let response = send(
        app,
        post_json("/translate", &serde_json::json!({ "uploadId": upload_id })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    body["translateId"].as_str().unwrap().to_string()
}
