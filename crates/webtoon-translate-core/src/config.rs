//! Configuration structures for the webtoon translation service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Blob storage backend (original and result images)
    pub storage: StorageConfig,

    /// Metadata store backend (uploads, jobs, batches, quota)
    pub store: StoreConfig,

    /// Upload and quota limits
    pub limits: LimitsConfig,

    /// Metadata and blob lifetimes
    pub ttl: TtlConfig,

    /// Text detection provider
    pub detection: DetectionConfig,

    /// Inpainting provider
    pub inpainting: InpaintingConfig,

    /// Translation provider
    pub translation: TranslationConfig,

    /// Background worker settings
    pub worker: WorkerConfig,

    /// Quota hashing settings
    pub quota: QuotaConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,

    /// Public base URL used when building image URLs
    pub base_url: String,

    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            base_url: default_base_url(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Blob storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Store blobs under a local directory
    Filesystem {
        #[serde(default = "default_storage_root")]
        root: PathBuf,
    },
    /// Keep blobs in memory (tests and dev only)
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Filesystem {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

/// Metadata store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// SQLite database file
    Sqlite {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
    /// In-memory store (tests and dev only)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("webtoon-translate.db")
}

/// Upload and quota limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Images a single client may translate per ISO week
    pub weekly_image_quota: u64,

    /// Maximum images per batch request
    pub max_batch_size: usize,

    /// Upload validation limits
    pub upload: UploadLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            weekly_image_quota: default_weekly_image_quota(),
            max_batch_size: default_max_batch_size(),
            upload: UploadLimits::default(),
        }
    }
}

fn default_weekly_image_quota() -> u64 {
    50
}

fn default_max_batch_size() -> usize {
    10
}

/// Upload validation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    /// Maximum upload size in bytes (default: 5MB)
    pub max_bytes: u64,

    /// Minimum image width in pixels
    pub min_width: u32,

    /// Maximum total pixel count
    pub max_pixels: u64,

    /// Maximum height/width ratio
    pub max_aspect_ratio: f32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: default_upload_max_bytes(),
            min_width: default_min_width(),
            max_pixels: default_max_pixels(),
            max_aspect_ratio: default_max_aspect_ratio(),
        }
    }
}

fn default_upload_max_bytes() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_min_width() -> u32 {
    600
}

fn default_max_pixels() -> u64 {
    3_000_000
}

fn default_max_aspect_ratio() -> f32 {
    8.0
}

/// Metadata and blob lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Seconds an upload (record and blob) stays available
    pub upload_secs: u64,

    /// Seconds a translation job (record and result blob) stays available
    pub translation_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            upload_secs: default_data_ttl_secs(),
            translation_secs: default_data_ttl_secs(),
        }
    }
}

fn default_data_ttl_secs() -> u64 {
    86_400 // 24 hours
}

/// Text detection provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Provider kind
    pub provider: DetectionProvider,

    /// Base URL of the remote detection service
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry attempts for failed detection requests
    pub max_retries: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            provider: DetectionProvider::default(),
            endpoint: None,
            timeout_secs: default_provider_timeout_secs(),
            max_retries: default_detection_retries(),
        }
    }
}

fn default_detection_retries() -> u32 {
    3
}

/// Text detection provider kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionProvider {
    /// Remote HTTP detection service
    #[default]
    Remote,
    /// No detection; pages pass through untouched
    Disabled,
}

/// Inpainting provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaintingConfig {
    /// Background restorer kind
    pub restorer: InpaintingRestorer,

    /// Base URL of the remote inpainting service
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for InpaintingConfig {
    fn default() -> Self {
        Self {
            restorer: InpaintingRestorer::default(),
            endpoint: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Background restorer kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InpaintingRestorer {
    /// Remote model-based restoration service
    Remote,
    /// Local solid-color fill (no remote calls)
    #[default]
    SolidFill,
}

/// Translation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Provider kind
    pub provider: TranslationProvider,

    /// API key for the translation provider (env: GEMINI_API_KEY)
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            api_key: None,
            model: default_translation_model(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_translation_model() -> String {
    "gemini-2.5-flash".to_string()
}

/// Translation provider kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationProvider {
    /// Google Gemini multimodal API
    #[default]
    Gemini,
    /// No translation; regions keep their source text erased only
    Disabled,
}

fn default_provider_timeout_secs() -> u64 {
    120
}

/// Background worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs processed concurrently
    pub concurrency: usize,

    /// Milliseconds between polls for pending jobs
    pub poll_interval_ms: u64,

    /// Seconds a single job may run before it is failed
    pub job_timeout_secs: u64,

    /// Seconds between expired-record purge sweeps
    pub purge_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_worker_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            job_timeout_secs: default_job_timeout_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_purge_interval_secs() -> u64 {
    60
}

/// Quota hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Secret mixed into client IP hashes (env: IP_HASH_SECRET)
    pub ip_hash_secret: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            ip_hash_secret: default_ip_hash_secret(),
        }
    }
}

fn default_ip_hash_secret() -> String {
    "insecure-dev-secret".to_string()
}

impl Config {
    /// Parse a configuration from YAML and apply environment overrides.
    pub fn from_yaml(contents: &str) -> crate::Result<Self> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Fill secrets from the environment so they stay out of config files.
    ///
    /// `GEMINI_API_KEY` and `IP_HASH_SECRET` take precedence over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.translation.api_key = Some(key);
            }
        }
        if let Ok(secret) = std::env::var("IP_HASH_SECRET") {
            if !secret.is_empty() {
                self.quota.ip_hash_secret = secret;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config(
                "server.bind_address must not be empty".to_string(),
            ));
        }

        if self.server.base_url.is_empty() {
            return Err(crate::Error::Config(
                "server.base_url must not be empty".to_string(),
            ));
        }

        if self.limits.weekly_image_quota == 0 {
            return Err(crate::Error::Config(
                "limits.weekly_image_quota must be > 0".to_string(),
            ));
        }

        if self.limits.max_batch_size == 0 {
            return Err(crate::Error::Config(
                "limits.max_batch_size must be > 0".to_string(),
            ));
        }

        if self.limits.upload.max_bytes == 0 {
            return Err(crate::Error::Config(
                "limits.upload.max_bytes must be > 0".to_string(),
            ));
        }

        if self.limits.upload.max_aspect_ratio <= 0.0 {
            return Err(crate::Error::Config(
                "limits.upload.max_aspect_ratio must be > 0".to_string(),
            ));
        }

        if self.worker.concurrency == 0 {
            return Err(crate::Error::Config(
                "worker.concurrency must be > 0".to_string(),
            ));
        }

        if self.detection.provider == DetectionProvider::Remote && self.detection.endpoint.is_none()
        {
            return Err(crate::Error::Config(
                "detection.endpoint is required when detection.provider is remote".to_string(),
            ));
        }

        if self.inpainting.restorer == InpaintingRestorer::Remote
            && self.inpainting.endpoint.is_none()
        {
            return Err(crate::Error::Config(
                "inpainting.endpoint is required when inpainting.restorer is remote".to_string(),
            ));
        }

        if self.translation.provider == TranslationProvider::Gemini
            && self.translation.api_key.as_deref().unwrap_or("").is_empty()
        {
            return Err(crate::Error::Config(
                "translation.api_key is required when translation.provider is gemini".to_string(),
            ));
        }

        Ok(())
    }

    /// Public URL for a stored blob key.
    pub fn static_url(&self, key: &str) -> String {
        format!("{}/static/{}", self.server.base_url.trim_end_matches('/'), key)
    }
}
