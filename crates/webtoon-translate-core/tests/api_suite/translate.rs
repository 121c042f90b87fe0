//! POST /translate and GET /translate/{translate_id}.

use std::net::SocketAddr;

use axum::http::StatusCode;
use serde_json::json;

use webtoon_translate_core::storage::result_key;
use webtoon_translate_core::store::TranslationUpdate;

use super::common::{
    create_job, expect_error, get, post_json, read_json, send, send_from, send_without_peer,
    test_config, upload_page, TestApp,
};

#[tokio::test]
async fn test_create_returns_a_pending_job() {
    let app = TestApp::new().await;
    let upload_id = upload_page(&app).await;

    let response = send(
        &app,
        post_json("/translate", &json!({ "uploadId": upload_id })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert!(body["translateId"].as_str().unwrap().starts_with("tr_"));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["uploadId"].as_str(), Some(upload_id.as_str()));
    assert_eq!(body["sourceLanguage"], "ko");
    assert_eq!(body["targetLanguage"], "en");
    assert!(body["originalUrl"]
        .as_str()
        .unwrap()
        .contains("/static/original/"));
    // Pending jobs carry no result fields at all.
    assert!(body.get("resultUrl").is_none());
    assert!(body.get("completedAt").is_none());
    assert!(body.get("errorMessage").is_none());
}

#[tokio::test]
async fn test_requested_languages_are_echoed() {
    let app = TestApp::new().await;
    let upload_id = upload_page(&app).await;

    let response = send(
        &app,
        post_json(
            "/translate",
            &json!({
                "uploadId": upload_id,
                "sourceLanguage": "ja",
                "targetLanguage": "fr",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["sourceLanguage"], "ja");
    assert_eq!(body["targetLanguage"], "fr");
}

#[tokio::test]
async fn test_completed_job_reports_its_result() {
    let app = TestApp::new().await;
    let upload_id = upload_page(&app).await;
    let translate_id = create_job(&app, &upload_id).await;

    // Run the queue by hand: claim, then finish.
    let claimed = app
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.translate_id, translate_id);
    let result_url = app.config.static_url(&result_key(&translate_id));
    app.store
        .update_translation(&TranslationUpdate::completed(&translate_id, result_url))
        .await
        .unwrap();

    let response = send(&app, get(&format!("/translate/{}", translate_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "completed");
    assert!(body["resultUrl"]
        .as_str()
        .unwrap()
        .ends_with(&format!("/static/result/{}_result.png", translate_id)));
    assert!(body["completedAt"].is_string());
    assert!(body.get("errorMessage").is_none());
}

#[tokio::test]
async fn test_create_and_get_error_paths() {
    let app = TestApp::new().await;

    // Well-formed id that names nothing.
    let response = send(
        &app,
        post_json("/translate", &json!({ "uploadId": "upload_ffffffff" })),
    )
    .await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_UPLOAD_ID").await;

    let response = send(&app, get("/translate/garbage")).await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_TRANSLATE_ID").await;

    let response = send(&app, get("/translate/tr_ffffffff")).await;
    expect_error(response, StatusCode::NOT_FOUND, "TRANSLATE_NOT_FOUND").await;
}

#[tokio::test]
async fn test_request_without_a_peer_address_is_rejected() {
    let app = TestApp::new().await;
    let upload_id = upload_page(&app).await;

    let response = send_without_peer(
        &app,
        post_json("/translate", &json!({ "uploadId": upload_id })),
    )
    .await;
    expect_error(response, StatusCode::BAD_REQUEST, "UNKNOWN_CLIENT").await;
}

#[tokio::test]
async fn test_quota_exhaustion_answers_429_with_detail() {
    let mut config = test_config();
    config.limits.weekly_image_quota = 2;
    let app = TestApp::with_config(config).await;
    let upload_id = upload_page(&app).await;

    create_job(&app, &upload_id).await;
    create_job(&app, &upload_id).await;

    let response = send(
        &app,
        post_json("/translate", &json!({ "uploadId": upload_id })),
    )
    .await;
    let body = expect_error(
        response,
        StatusCode::TOO_MANY_REQUESTS,
        "RATE_LIMIT_EXCEEDED",
    )
    .await;
    assert_eq!(body["usedCount"], 2);
    assert_eq!(body["limit"], 2);
    assert!(body["resetsAt"].is_string());

    // A different peer still has a full allowance.
    let other: SocketAddr = "198.51.100.9:51000".parse().unwrap();
    let response = send_from(
        &app,
        other,
        post_json("/translate", &json!({ "uploadId": upload_id })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
