use anyhow::Result;
use webtoon_translate_core::config::{
    DetectionProvider, InpaintingRestorer, TranslationProvider,
};
use webtoon_translate_core::{StorageConfig, StoreConfig};

pub async fn run(config_path: &str) -> Result<()> {
    let config = super::load_config(config_path).await?;
    config.validate()?;

    println!("Configuration OK: {}", config_path);
    println!("  bind address:    {}", config.server.bind_address);
    println!("  base URL:        {}", config.server.base_url);
    println!(
        "  CORS origins:    {}",
        if config.server.cors_origins.is_empty() {
            "(none)".to_string()
        } else {
            config.server.cors_origins.join(", ")
        }
    );

    match &config.storage {
        StorageConfig::Filesystem { root } => {
            println!("  storage:         filesystem ({})", root.display())
        }
        StorageConfig::Memory => println!("  storage:         memory"),
    }
    match &config.store {
        StoreConfig::Sqlite { path } => println!("  store:           sqlite ({})", path.display()),
        StoreConfig::Memory => println!("  store:           memory"),
    }

    println!(
        "  detection:       {}",
        match config.detection.provider {
            DetectionProvider::Remote => config
                .detection
                .endpoint
                .as_deref()
                .unwrap_or("remote (no endpoint)"),
            DetectionProvider::Disabled => "disabled",
        }
    );
    println!(
        "  inpainting:      {}",
        match config.inpainting.restorer {
            InpaintingRestorer::Remote => config
                .inpainting
                .endpoint
                .as_deref()
                .unwrap_or("remote (no endpoint)"),
            InpaintingRestorer::SolidFill => "solid fill",
        }
    );
    println!(
        "  translation:     {}",
        match config.translation.provider {
            TranslationProvider::Gemini => {
                if config.translation.api_key.is_some() {
                    "gemini (api key set)"
                } else {
                    "gemini (no api key)"
                }
            }
            TranslationProvider::Disabled => "disabled",
        }
    );

    println!(
        "  weekly quota:    {} images",
        config.limits.weekly_image_quota
    );
    println!("  max batch size:  {}", config.limits.max_batch_size);
    println!(
        "  upload limit:    {} bytes",
        config.limits.upload.max_bytes
    );
    println!(
        "  TTL:             uploads {}s, translations {}s",
        config.ttl.upload_secs, config.ttl.translation_secs
    );
    println!(
        "  worker:          {} slot(s), {}ms poll, {}s job timeout",
        config.worker.concurrency, config.worker.poll_interval_ms, config.worker.job_timeout_secs
    );

    Ok(())
}
