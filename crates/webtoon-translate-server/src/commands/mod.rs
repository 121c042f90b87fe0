pub mod check_config;
pub mod run;
pub mod serve;
pub mod worker;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::error;
use webtoon_translate_core::Config;

/// Read and parse a YAML configuration file, applying env overrides.
pub(crate) async fn load_config(path: &str) -> Result<Config> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path))?;
    Config::from_yaml(&contents).with_context(|| format!("Failed to parse config file: {}", path))
}

/// Broadcast a shutdown signal when ctrl-c arrives.
pub(crate) fn shutdown_on_ctrl_c(tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        let _ = tx.send(());
    });
}
