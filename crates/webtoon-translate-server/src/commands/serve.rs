use anyhow::Result;
use tokio::sync::broadcast;
use tracing::info;
use webtoon_translate_core::api::{self, AppState};

pub async fn run(config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    let config = super::load_config(config_path).await?;

    let state = AppState::from_config(config).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    super::shutdown_on_ctrl_c(shutdown_tx);

    api::serve(state, shutdown_rx).await?;

    info!("Server stopped");
    Ok(())
}
