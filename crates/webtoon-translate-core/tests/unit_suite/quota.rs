//! Quota accounting across single jobs, batches and store restarts.

use webtoon_translate_core::config::StoreConfig;
use webtoon_translate_core::services::ServiceError;

use super::helpers::{png_page, test_config, TestStack};

#[tokio::test]
async fn test_single_jobs_and_batches_draw_from_one_counter() {
    let mut config = test_config();
    config.limits.weekly_image_quota = 3;
    let stack = TestStack::with_config(config).await;

    let mut upload_ids = Vec::new();
    for _ in 0..3 {
        let upload = stack
            .uploads
            .create_upload(None, Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
        upload_ids.push(upload.upload_id);
    }

    // One single job, then a batch of two: exactly the weekly allowance.
    stack
        .translations
        .create(&upload_ids[0], "ko", "en", "203.0.113.80")
        .await
        .unwrap();
    stack
        .batches
        .create(&upload_ids[1..3], "ko", "en", "203.0.113.80")
        .await
        .unwrap();
    assert_eq!(stack.quota.usage("203.0.113.80").await.unwrap().used, 3);

    // Both entry points are now shut for this client.
    assert!(matches!(
        stack
            .translations
            .create(&upload_ids[0], "ko", "en", "203.0.113.80")
            .await,
        Err(ServiceError::QuotaExceeded { used: 3, limit: 3, .. })
    ));
    assert!(matches!(
        stack
            .batches
            .create(&upload_ids[0..1], "ko", "en", "203.0.113.80")
            .await,
        Err(ServiceError::QuotaExceeded { .. })
    ));

    // A different client is unaffected.
    stack
        .translations
        .create(&upload_ids[0], "ko", "en", "203.0.113.81")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_uploads_are_free_until_translated() {
    let stack = TestStack::new().await;
    for _ in 0..4 {
        stack
            .uploads
            .create_upload(None, Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
    }
    assert_eq!(stack.quota.usage("203.0.113.80").await.unwrap().used, 0);
}

#[tokio::test]
async fn test_oversized_batch_charges_nothing() {
    let mut config = test_config();
    config.limits.weekly_image_quota = 10;
    config.limits.max_batch_size = 2;
    let stack = TestStack::with_config(config).await;

    let mut upload_ids = Vec::new();
    for _ in 0..3 {
        let upload = stack
            .uploads
            .create_upload(None, Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
        upload_ids.push(upload.upload_id);
    }

    assert!(matches!(
        stack
            .batches
            .create(&upload_ids, "ko", "en", "203.0.113.80")
            .await,
        Err(ServiceError::BatchTooLarge { max: 2 })
    ));
    assert_eq!(stack.quota.usage("203.0.113.80").await.unwrap().used, 0);
}

#[tokio::test]
async fn test_counter_survives_a_sqlite_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config();
    config.store = StoreConfig::Sqlite {
        path: dir.path().join("metadata.db"),
    };

    {
        let stack = TestStack::with_config(config.clone()).await;
        let upload = stack
            .uploads
            .create_upload(None, Some("image/png"), png_page(640, 480))
            .await
            .unwrap();
        stack
            .translations
            .create(&upload.upload_id, "ko", "en", "203.0.113.90")
            .await
            .unwrap();
        stack
            .translations
            .create(&upload.upload_id, "ko", "en", "203.0.113.90")
            .await
            .unwrap();
    }

    // Same store file, fresh stack: the week's spend is still there.
    let stack = TestStack::with_config(config).await;
    let report = stack.quota.usage("203.0.113.90").await.unwrap();
    assert_eq!(report.used, 2);
    assert_eq!(report.limit, stack.config.limits.weekly_image_quota);
}
