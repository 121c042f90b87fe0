//! POST /erase.

use std::io::Cursor;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde_json::json;

use webtoon_translate_core::storage::result_key;
use webtoon_translate_core::store::TranslationUpdate;

use super::common::{
    create_job, expect_error, post_json, read_json, send, upload_page, TestApp,
};

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn mask_b64(width: u32, height: u32, marked: (u32, u32, u32, u32)) -> String {
    let mut mask = GrayImage::from_pixel(width, height, Luma([0]));
    let (x1, y1, x2, y2) = marked;
    for y in y1..y2 {
        for x in x1..x2 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    let mut out = Vec::new();
    image::DynamicImage::ImageLuma8(mask)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    BASE64_STANDARD.encode(&out)
}

/// Upload, translate and complete a job whose stored result is a white page
/// with one dark block.
async fn completed_job(app: &TestApp) -> String {
    let upload_id = upload_page(app).await;
    let translate_id = create_job(app, &upload_id).await;
    app.store.claim_pending_translation().await.unwrap();

    let mut page = RgbImage::from_pixel(400, 300, Rgb([255, 255, 255]));
    for y in 100..140 {
        for x in 150..250 {
            page.put_pixel(x, y, Rgb([30, 30, 30]));
        }
    }
    let key = result_key(&translate_id);
    app.storage
        .put(&key, Bytes::from(png_bytes(&page)))
        .await
        .unwrap();
    app.store
        .update_translation(&TranslationUpdate::completed(
            &translate_id,
            app.config.static_url(&key),
        ))
        .await
        .unwrap();
    translate_id
}

#[tokio::test]
async fn test_erase_returns_the_retouched_image_inline() {
    let app = TestApp::new().await;
    let translate_id = completed_job(&app).await;

    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({
                "translateId": translate_id,
                "maskImage": mask_b64(400, 300, (150, 100, 250, 140)),
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["translateId"].as_str(), Some(translate_id.as_str()));

    let decoded = BASE64_STANDARD
        .decode(body["resultImage"].as_str().unwrap())
        .unwrap();
    let retouched = image::load_from_memory(&decoded).unwrap().to_rgb8();
    assert_eq!(retouched.dimensions(), (400, 300));
    assert!(
        retouched.get_pixel(200, 120).0[0] > 200,
        "masked block should be filled with the surrounding white"
    );
}

#[tokio::test]
async fn test_erase_requires_a_completed_job() {
    let app = TestApp::new().await;
    let upload_id = upload_page(&app).await;
    let translate_id = create_job(&app, &upload_id).await;

    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({
                "translateId": translate_id,
                "maskImage": mask_b64(10, 10, (0, 0, 5, 5)),
            }),
        ),
    )
    .await;
    let body = expect_error(response, StatusCode::BAD_REQUEST, "TRANSLATE_NOT_COMPLETED").await;
    assert!(body["message"].as_str().unwrap().contains("pending"));
}

#[tokio::test]
async fn test_erase_error_paths() {
    let app = TestApp::new().await;
    let mask = mask_b64(10, 10, (0, 0, 5, 5));

    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({ "translateId": "garbage", "maskImage": mask }),
        ),
    )
    .await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_TRANSLATE_ID").await;

    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({ "translateId": "tr_ffffffff", "maskImage": mask }),
        ),
    )
    .await;
    expect_error(response, StatusCode::NOT_FOUND, "TRANSLATE_NOT_FOUND").await;

    // Completed job whose mask is not even base64.
    let translate_id = completed_job(&app).await;
    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({ "translateId": translate_id, "maskImage": "%%nope%%" }),
        ),
    )
    .await;
    expect_error(response, StatusCode::BAD_REQUEST, "INVALID_MASK").await;
}

#[tokio::test]
async fn test_erase_with_a_missing_result_blob() {
    let app = TestApp::new().await;
    let translate_id = completed_job(&app).await;
    app.storage.delete(&result_key(&translate_id)).await.unwrap();

    let response = send(
        &app,
        post_json(
            "/erase",
            &json!({
                "translateId": translate_id,
                "maskImage": mask_b64(10, 10, (0, 0, 5, 5)),
            }),
        ),
    )
    .await;
    expect_error(response, StatusCode::NOT_FOUND, "RESULT_IMAGE_NOT_FOUND").await;
}
