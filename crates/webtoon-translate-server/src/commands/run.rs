//! Combined server and worker in one process.
//!
//! Both halves share the store, the storage backend, the health registry and
//! the metrics registry, so `/health` and `/metrics` cover job processing
//! too. One shutdown broadcast stops both.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use webtoon_translate_core::api::{self, AppState};
use webtoon_translate_core::storage::create_backend;
use webtoon_translate_core::store::create_store;
use webtoon_translate_core::{ServiceMetrics, WorkerEngine};

pub async fn run(config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    let config = super::load_config(config_path).await?;
    config.validate()?;

    let store = create_store(&config.store).await?;
    let storage = create_backend(&config.storage)?;
    let metrics = Arc::new(ServiceMetrics::new());

    let engine = Arc::new(WorkerEngine::with_components(
        config.clone(),
        store.clone(),
        storage.clone(),
        metrics.clone(),
    )?);
    let state = AppState::with_components(config, store, storage, engine.health(), metrics)?;

    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
            engine.shutdown();
        });
    }

    let api = api::serve(state, engine.shutdown_receiver());
    let worker = {
        let engine = engine.clone();
        async move { engine.run().await }
    };

    tokio::try_join!(api, worker)?;

    info!("Server and worker stopped");
    Ok(())
}
