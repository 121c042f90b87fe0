//! TTL visibility and purge behavior across the service layer.

use chrono::{Duration, Utc};

use webtoon_translate_core::services::ServiceError;
use webtoon_translate_core::store::{BatchEntry, BatchRecord, TranslationStatus};

use super::helpers::{png_page, TestStack};

const CLIENT: &str = "198.51.100.20";

#[tokio::test]
async fn test_expired_records_read_as_missing_across_services() {
    let stack = TestStack::new().await;

    // Create real records, then rewrite them with expiries in the past.
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
    let batch = stack
        .batches
        .create(&[upload.upload_id.clone()], "ko", "en", CLIENT)
        .await
        .unwrap();

    let past = Utc::now() - Duration::hours(1);
    let mut stale_upload = upload.clone();
    stale_upload.expires_at = past;
    stack.store.put_upload(&stale_upload).await.unwrap();

    let mut stale_job = stack
        .store
        .get_translation(&job.translate_id)
        .await
        .unwrap()
        .unwrap();
    stale_job.expires_at = past;
    stack.store.put_translation(&stale_job).await.unwrap();

    stack
        .store
        .put_batch(&BatchRecord {
            batch_id: batch.batch_id.clone(),
            source_language: batch.source_language.clone(),
            target_language: batch.target_language.clone(),
            entries: vec![BatchEntry {
                order_index: 0,
                upload_id: upload.upload_id.clone(),
                translate_id: job.translate_id.clone(),
            }],
            created_at: batch.created_at,
            expires_at: past,
        })
        .await
        .unwrap();

    assert!(matches!(
        stack.uploads.get_upload(&upload.upload_id).await,
        Err(ServiceError::UploadNotFound(_))
    ));
    assert!(matches!(
        stack.translations.get(&job.translate_id).await,
        Err(ServiceError::TranslateNotFound(_))
    ));
    assert!(matches!(
        stack.batches.get(&batch.batch_id).await,
        Err(ServiceError::BatchNotFound(_))
    ));
}

#[tokio::test]
async fn test_purge_reports_every_table_and_the_blob_keys() {
    let stack = TestStack::new().await;

    let upload = stack
        .uploads
        .create_upload(None, Some("image/png"), png_page(640, 480))
        .await
        .unwrap();
    stack
        .translations
        .create(&upload.upload_id, "ko", "en", CLIENT)
        .await
        .unwrap();
    stack
        .batches
        .create(&[upload.upload_id.clone()], "ko", "en", CLIENT)
        .await
        .unwrap();

    // Everything is live; a sweep finds nothing.
    let summary = stack.store.purge_expired(Utc::now()).await.unwrap();
    assert_eq!(summary.total_records(), 0);
    assert!(summary.storage_keys.is_empty());

    // Sweep as if the TTLs had elapsed. The quota counter expires at the
    // weekly reset, so push past that too.
    let far_future = Utc::now() + Duration::days(30);
    let summary = stack.store.purge_expired(far_future).await.unwrap();
    assert_eq!(summary.uploads, 1);
    // The direct job plus the batch's child job.
    assert_eq!(summary.translations, 2);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.quotas, 1);
    assert!(summary.storage_keys.contains(&upload.storage_key));

    // A second sweep has nothing left to do.
    let summary = stack.store.purge_expired(far_future).await.unwrap();
    assert_eq!(summary.total_records(), 0);
}

#[tokio::test]
async fn test_expired_pending_job_is_never_claimed() {
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

    let mut stale = stack
        .store
        .get_translation(&job.translate_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stale.status, TranslationStatus::Pending);
    stale.expires_at = Utc::now() - Duration::minutes(5);
    stack.store.put_translation(&stale).await.unwrap();

    assert!(stack
        .store
        .claim_pending_translation()
        .await
        .unwrap()
        .is_none());
}
