//! POST /batch and GET /batch/{batch_id}.

use axum::http::StatusCode;
use serde_json::json;

use webtoon_translate_core::storage::result_key;
use webtoon_translate_core::store::TranslationUpdate;

use super::common::{
    expect_error, get, post_json, read_json, send, test_config, upload_page, TestApp,
};

#[tokio::test]
async fn test_batch_creates_one_job_per_image_in_order() {
    let app = TestApp::new().await;
    let first = upload_page(&app).await;
    let second = upload_page(&app).await;

    let response = send(
        &app,
        post_json("/batch", &json!({ "uploadIds": [first, second] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    let batch_id = body["batchId"].as_str().unwrap();
    assert!(batch_id.starts_with("batch_"));
    assert_eq!(body["status"], "processing");
    assert_eq!(body["sourceLanguage"], "ko");
    assert_eq!(body["targetLanguage"], "en");

    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["orderIndex"], 0);
    assert_eq!(images[0]["uploadId"].as_str(), Some(first.as_str()));
    assert_eq!(images[0]["status"], "pending");
    assert!(images[0]["translateId"].as_str().unwrap().starts_with("tr_"));
    assert_eq!(images[1]["orderIndex"], 1);
    assert_eq!(images[1]["uploadId"].as_str(), Some(second.as_str()));

    // Each child is an ordinary job, fetchable on its own.
    let child = images[1]["translateId"].as_str().unwrap();
    let response = send(&app, get(&format!("/translate/{}", child))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get(&format!("/batch/{}", batch_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_batch_request_validation() {
    let mut config = test_config();
    config.limits.max_batch_size = 2;
    let app = TestApp::with_config(config).await;
    let upload_id = upload_page(&app).await;

    let response = send(&app, post_json("/batch", &json!({ "uploadIds": [] }))).await;
    expect_error(response, StatusCode::BAD_REQUEST, "EMPTY_BATCH").await;

    let response = send(
        &app,
        post_json(
            "/batch",
            &json!({ "uploadIds": [upload_id, upload_id, upload_id] }),
        ),
    )
    .await;
    let body = expect_error(response, StatusCode::BAD_REQUEST, "BATCH_TOO_LARGE").await;
    assert!(body["message"].as_str().unwrap().contains("at most 2"));

    let response = send(
        &app,
        post_json(
            "/batch",
            &json!({ "uploadIds": [upload_id, "upload_ffffffff"] }),
        ),
    )
    .await;
    let body = expect_error(response, StatusCode::BAD_REQUEST, "INVALID_UPLOAD_ID").await;
    assert!(body["message"].as_str().unwrap().contains("index 1"));
}

#[tokio::test]
async fn test_batch_status_follows_its_children() {
    let app = TestApp::new().await;
    let first = upload_page(&app).await;
    let second = upload_page(&app).await;

    let response = send(
        &app,
        post_json("/batch", &json!({ "uploadIds": [first, second] })),
    )
    .await;
    let body = read_json(response).await;
    let batch_id = body["batchId"].as_str().unwrap().to_string();

    // Finish one child, fail the other.
    let done = app
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    let failed = app
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    app.store
        .update_translation(&TranslationUpdate::completed(
            &done.translate_id,
            app.config.static_url(&result_key(&done.translate_id)),
        ))
        .await
        .unwrap();
    app.store
        .update_translation(&TranslationUpdate::failed(
            &failed.translate_id,
            "Gemini request timed out",
        ))
        .await
        .unwrap();

    let response = send(&app, get(&format!("/batch/{}", batch_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "partial_failure");

    let images = body["images"].as_array().unwrap();
    let failed_image = images
        .iter()
        .find(|img| img["translateId"] == failed.translate_id.as_str())
        .unwrap();
    assert_eq!(failed_image["status"], "failed");
    assert_eq!(failed_image["errorMessage"], "Gemini request timed out");
    let done_image = images
        .iter()
        .find(|img| img["translateId"] == done.translate_id.as_str())
        .unwrap();
    assert_eq!(done_image["status"], "completed");
    assert!(done_image["resultUrl"].is_string());
}

#[tokio::test]
async fn test_get_batch_error_paths() {
    let app = TestApp::new().await;

    let response = send(&app, get("/batch/garbage")).await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_BATCH_ID").await;

    let response = send(&app, get("/batch/batch_ffffffff")).await;
    expect_error(response, StatusCode::NOT_FOUND, "BATCH_NOT_FOUND").await;
}
