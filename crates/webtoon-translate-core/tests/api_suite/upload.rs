//! POST /upload and GET /upload/{upload_id}.

use axum::http::StatusCode;

use super::common::{
    expect_error, get, multipart_upload, png_page, read_json, send, TestApp,
};

#[tokio::test]
async fn test_upload_accepts_a_png_page() {
    let app = TestApp::new().await;
    let request = multipart_upload("file", "ep12_page03.png", "image/png", &png_page(640, 480));

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let upload_id = body["uploadId"].as_str().unwrap();
    assert!(upload_id.starts_with("upload_"));
    assert_eq!(body["filename"], "ep12_page03.png");
    assert_eq!(body["contentType"], "image/png");
    assert!(body["size"].as_u64().unwrap() > 0);
    assert!(body["createdAt"].is_string());
    assert_eq!(
        body["imageUrl"].as_str().unwrap(),
        format!(
            "http://localhost:8000/static/original/{}.png",
            upload_id
        )
    );

    // The stored page is immediately readable again.
    let response = send(&app, get(&format!("/upload/{}", upload_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json(response).await;
    assert_eq!(fetched["uploadId"], body["uploadId"]);
    assert_eq!(fetched["imageUrl"], body["imageUrl"]);
}

#[tokio::test]
async fn test_upload_rejects_non_image_bytes() {
    let app = TestApp::new().await;
    let request = multipart_upload("file", "page.png", "image/png", b"definitely not a png");

    let response = send(&app, request).await;
    let body = expect_error(response, StatusCode::BAD_REQUEST, "INVALID_IMAGE").await;
    assert!(body["message"].as_str().unwrap().contains("recognizable"));
}

#[tokio::test]
async fn test_upload_rejects_undersized_page() {
    let app = TestApp::new().await;
    // Narrower than the 600px minimum.
    let request = multipart_upload("file", "thumb.png", "image/png", &png_page(320, 480));

    let response = send(&app, request).await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_IMAGE").await;
}

#[tokio::test]
async fn test_multipart_without_a_file_field() {
    let app = TestApp::new().await;
    let request = multipart_upload("attachment", "page.png", "image/png", &png_page(640, 480));

    let response = send(&app, request).await;
    let body = expect_error(response, StatusCode::BAD_REQUEST, "INVALID_IMAGE").await;
    assert!(body["message"].as_str().unwrap().contains("no file field"));
}

#[tokio::test]
async fn test_get_upload_error_paths() {
    let app = TestApp::new().await;

    let response = send(&app, get("/upload/not-an-id")).await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_UPLOAD_ID").await;

    let response = send(&app, get("/upload/upload_ffffffff")).await;
    expect_error(response, StatusCode::NOT_FOUND, "UPLOAD_NOT_FOUND").await;
}
