//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::config::Config;
use crate::health::HealthCheck;
use crate::metrics::ServiceMetrics;
use crate::services::{
    BatchService, EraseService, QuotaService, TranslationService, UploadService,
};
use crate::storage::{create_backend, StorageBackend};
use crate::store::{create_store, MetadataStore};
use crate::Result;

/// Everything the HTTP handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    pub uploads: Arc<UploadService>,
    pub translations: Arc<TranslationService>,
    pub batches: Arc<BatchService>,
    pub erase: Arc<EraseService>,
    pub quota: Arc<QuotaService>,
    pub health: Arc<HealthCheck>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Build the full state from configuration, creating fresh store and
    /// storage connections.
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let store = create_store(&config.store).await?;
        let storage = create_backend(&config.storage)?;
        let metrics = Arc::new(ServiceMetrics::new());

        let health = Arc::new(HealthCheck::new());
        health.register_component("store");
        health.register_component("storage");

        Self::with_components(config, store, storage, health, metrics)
    }

    /// Build the state around existing components. The combined
    /// server+worker mode uses this so both halves share one store, one
    /// storage backend, one health registry and one metrics registry.
    pub fn with_components(
        config: Config,
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageBackend>,
        health: Arc<HealthCheck>,
        metrics: Arc<ServiceMetrics>,
    ) -> Result<Self> {
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
        let erase = Arc::new(EraseService::new(
            store,
            storage.clone(),
            &config.inpainting,
            metrics.clone(),
        )?);

        Ok(Self {
            config,
            storage,
            uploads,
            translations,
            batches,
            erase,
            quota,
            health,
            metrics,
        })
    }
}
