//! Job lifecycle flows across the service layer.
//!
//! These tests drive real bytes through upload, job creation, the store
//! queue and erase, the same path the HTTP handlers and worker take, but
//! with the worker's pipeline step simulated so no fonts or providers are
//! needed.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use image::{GrayImage, Luma, Rgb, RgbImage};

use webtoon_translate_core::config::StoreConfig;
use webtoon_translate_core::services::ServiceError;
use webtoon_translate_core::storage::result_key;
use webtoon_translate_core::store::{create_store, TranslationStatus, TranslationUpdate};
use webtoon_translate_core::BatchStatus;

use super::helpers::{encode_png, png_page, test_config, TestStack};

const CLIENT: &str = "203.0.113.50";

/// A white page with a dark block, the shape the erase flow cares about.
fn page_with_block() -> RgbImage {
    let mut page = RgbImage::from_pixel(640, 600, Rgb([255, 255, 255]));
    for y in 250..300 {
        for x in 200..320 {
            page.put_pixel(x, y, Rgb([25, 25, 25]));
        }
    }
    page
}

fn mask_over_block() -> String {
    let mut mask = GrayImage::from_pixel(640, 600, Luma([0]));
    for y in 250..300 {
        for x in 200..320 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    let mut out = Vec::new();
    image::DynamicImage::ImageLuma8(mask)
        .write_to(
            &mut std::io::Cursor::new(&mut out),
            image::ImageFormat::Png,
        )
        .unwrap();
    BASE64_STANDARD.encode(&out)
}

#[tokio::test]
async fn test_page_flows_from_upload_to_erased_result() {
    let stack = TestStack::new().await;
    let page = page_with_block();

    // Upload.
    let upload = stack
        .uploads
        .create_upload(Some("page.png"), Some("image/png"), encode_png(&page))
        .await
        .unwrap();
    assert!(stack.storage.exists(&upload.storage_key).await.unwrap());

    // Create the job; it lands on the queue as pending.
    let job = stack
        .translations
        .create(&upload.upload_id, "ko", "en", CLIENT)
        .await
        .unwrap();
    assert_eq!(job.status, TranslationStatus::Pending);

    // The worker's claim flips it to processing.
    let claimed = stack
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.translate_id, job.translate_id);
    assert_eq!(
        stack
            .translations
            .get(&job.translate_id)
            .await
            .unwrap()
            .status,
        TranslationStatus::Processing
    );

    // Simulate the pipeline finishing: result blob plus a completed update.
    let key = result_key(&job.translate_id);
    let result_bytes = encode_png(&page);
    stack.storage.put(&key, result_bytes.clone()).await.unwrap();
    stack
        .store
        .update_translation(&TranslationUpdate::completed(
            &job.translate_id,
            stack.config.static_url(&key),
        ))
        .await
        .unwrap();

    let done = stack.translations.get(&job.translate_id).await.unwrap();
    assert_eq!(done.status, TranslationStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done
        .result_url
        .as_deref()
        .unwrap()
        .ends_with(&format!("/static/result/{}_result.png", job.translate_id)));

    // Erase the dark block; the retouched copy comes back inline.
    let erased_b64 = stack
        .erase
        .erase(&job.translate_id, &mask_over_block())
        .await
        .unwrap();
    let erased = image::load_from_memory(&BASE64_STANDARD.decode(erased_b64).unwrap())
        .unwrap()
        .to_rgb8();
    assert!(
        erased.get_pixel(260, 275).0[0] > 200,
        "masked block should be filled with the surrounding white"
    );

    // The stored result is untouched so the client can iterate on it.
    assert_eq!(stack.storage.get(&key).await.unwrap(), result_bytes);

    // One image, one quota unit.
    assert_eq!(stack.quota.usage(CLIENT).await.unwrap().used, 1);
}

#[tokio::test]
async fn test_failed_job_keeps_its_quota_charge() {
    let stack = TestStack::new().await;
    let upload = stack
        .uploads
        .create_upload(None, Some("image/png"), png_page(640, 480))
        .await
        .unwrap();
    let job = stack
        .translations
        .create(&upload.upload_id, "ko", "en", CLIENT)
        .await
        .unwrap();

    stack.store.claim_pending_translation().await.unwrap();
    stack
        .store
        .update_translation(&TranslationUpdate::failed(
            &job.translate_id,
            "Detection provider unavailable",
        ))
        .await
        .unwrap();

    let failed = stack.translations.get(&job.translate_id).await.unwrap();
    assert_eq!(failed.status, TranslationStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("Detection provider unavailable")
    );
    assert!(failed.result_url.is_none());

    // The attempt was made; the weekly allowance stays spent.
    assert_eq!(stack.quota.usage(CLIENT).await.unwrap().used, 1);
}

#[tokio::test]
async fn test_batch_runs_through_the_same_queue_as_single_jobs() {
    let stack = TestStack::new().await;
    let mut upload_ids = Vec::new();
    for _ in 0..2 {
        let upload = stack
            .uploads
            .create_upload(None, Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
        upload_ids.push(upload.upload_id);
    }

    let batch = stack
        .batches
        .create(&upload_ids, "ko", "en", CLIENT)
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Processing);
    assert_eq!(stack.quota.usage(CLIENT).await.unwrap().used, 2);

    // Both children are claimable; finish one, fail the other.
    let first = stack
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    let second = stack
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .unwrap();
    assert!(stack
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .is_none());

    let key = result_key(&first.translate_id);
    stack.storage.put(&key, png_page(640, 480)).await.unwrap();
    stack
        .store
        .update_translation(&TranslationUpdate::completed(
            &first.translate_id,
            stack.config.static_url(&key),
        ))
        .await
        .unwrap();
    stack
        .store
        .update_translation(&TranslationUpdate::failed(&second.translate_id, "timeout"))
        .await
        .unwrap();

    let fetched = stack.batches.get(&batch.batch_id).await.unwrap();
    assert_eq!(fetched.status, BatchStatus::PartialFailure);
    assert_eq!(fetched.images.len(), 2);
    for (index, image) in fetched.images.iter().enumerate() {
        assert_eq!(image.order_index, index);
        assert_eq!(image.upload_id, upload_ids[index]);
    }
    let completed = fetched
        .images
        .iter()
        .find(|img| img.translate_id == first.translate_id)
        .unwrap();
    assert_eq!(completed.status, TranslationStatus::Completed);
    assert!(completed.result_url.is_some());
}

#[tokio::test]
async fn test_erase_rejects_a_job_still_on_the_queue() {
    let stack = TestStack::new().await;
    let upload = stack
        .uploads
        .create_upload(None, Some("image/png"), png_page(640, 480))
        .await
        .unwrap();
    let job = stack
        .translations
        .create(&upload.upload_id, "ko", "en", CLIENT)
        .await
        .unwrap();

    let mask = mask_over_block();
    let err = stack.erase.erase(&job.translate_id, &mask).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::TranslateNotCompleted(status) if status == "pending"
    ));
}

#[tokio::test]
async fn test_full_lifecycle_survives_a_sqlite_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config();
    config.store = StoreConfig::Sqlite {
        path: dir.path().join("metadata.db"),
    };

    let upload_id;
    let translate_id;
    {
        let stack = TestStack::with_config(config.clone()).await;
        let upload = stack
            .uploads
            .create_upload(Some("page.png"), Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
        let job = stack
            .translations
            .create(&upload.upload_id, "ko", "en", CLIENT)
            .await
            .unwrap();

        let claimed = stack
            .store
            .claim_pending_translation()
            .await
            .unwrap()
            .unwrap();
        stack
            .store
            .update_translation(&TranslationUpdate::completed(
                &claimed.translate_id,
                "http://localhost:8000/static/result/done.png".to_string(),
            ))
            .await
            .unwrap();

        upload_id = upload.upload_id;
        translate_id = job.translate_id;
    }

    // A fresh store over the same file sees the finished state.
    let store = create_store(&config.store).await.unwrap();
    let upload = store.get_upload(&upload_id).await.unwrap().unwrap();
    assert!(upload.expires_at > Utc::now() + Duration::hours(1));

    let job = store.get_translation(&translate_id).await.unwrap().unwrap();
    assert_eq!(job.status, TranslationStatus::Completed);
    assert_eq!(
        job.result_url.as_deref(),
        Some("http://localhost:8000/static/result/done.png")
    );
    assert!(store.claim_pending_translation().await.unwrap().is_none());
}
