//! Common test fixtures.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::{Rgb, RgbImage};

use webtoon_translate_core::config::{DetectionProvider, TranslationProvider};
use webtoon_translate_core::services::{
    BatchService, EraseService, QuotaService, TranslationService, UploadService,
};
use webtoon_translate_core::storage::{create_backend, StorageBackend};
use webtoon_translate_core::store::create_store;
use webtoon_translate_core::{Config, MetadataStore, ServiceMetrics, StorageConfig, StoreConfig};

/// Configuration with in-memory backends and no remote providers.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store = StoreConfig::Memory;
    config.storage = StorageConfig::Memory;
    config.detection.provider = DetectionProvider::Disabled;
    config.translation.provider = TranslationProvider::Disabled;
    config.quota.ip_hash_secret = "unit-test-secret".to_string();
    config
}

/// A flat PNG page of the given size.
pub fn png_page(width: u32, height: u32) -> Bytes {
    let image = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
    encode_png(&image)
}

pub fn encode_png(image: &RgbImage) -> Bytes {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    Bytes::from(out)
}

/// The full service stack over shared in-memory backends.
pub struct TestStack {
    pub config: Config,
    pub store: Arc<dyn MetadataStore>,
    pub storage: Arc<dyn StorageBackend>,
    pub metrics: Arc<ServiceMetrics>,
    pub uploads: Arc<UploadService>,
    pub quota: Arc<QuotaService>,
    pub translations: Arc<TranslationService>,
    pub batches: Arc<BatchService>,
    pub erase: Arc<EraseService>,
}

impl TestStack {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = create_store(&config.store).await.unwrap();
        let storage = create_backend(&config.storage).unwrap();
        let metrics = Arc::new(ServiceMetrics::new());

        let uploads = Arc::new(UploadService::new(
            store.clone(),
            storage.clone(),
            &config,
            metrics.clone(),
        ));
        let quota = Arc::new(QuotaService::new(store.clone(), &config, metrics.clone()));
        let translations = Arc::new(TranslationService::new(
            store.clone(),
            quota.clone(),
            config.clone(),
        ));
        let batches = Arc::new(BatchService::new(
            store.clone(),
            translations.clone(),
            quota.clone(),
            &config,
        ));
        let erase = Arc::new(
            EraseService::new(
                store.clone(),
                storage.clone(),
                &config.inpainting,
                metrics.clone(),
            )
            .unwrap(),
        );

        Self {
            config,
            store,
            storage,
            metrics,
            uploads,
            quota,
            translations,
            batches,
            erase,
        }
    }
}
