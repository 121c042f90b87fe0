use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use webtoon_translate_core::WorkerEngine;

pub async fn run(config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    let config = super::load_config(config_path).await?;

    let engine = Arc::new(WorkerEngine::new(config).await?);

    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            engine.shutdown();
        });
    }

    engine.run().await?;
    Ok(())
}
