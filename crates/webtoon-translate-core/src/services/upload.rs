//! Upload intake and validation.
//!
//! Every byte a client sends passes this gauntlet before anything touches
//! storage: size cap, declared content type, magic bytes, a real decode and
//! the dimension rules. The declared type must match what the bytes say it
//! is; the stored extension comes from the detected type, never from the
//! client's filename.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::{Config, UploadLimits};
use crate::ident::{is_valid_upload_id, new_upload_id};
use crate::metrics::ServiceMetrics;
use crate::storage::{original_key, StorageBackend};
use crate::store::{MetadataStore, UploadRecord};

use super::{ServiceError, ServiceResult};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];

/// Validates and stores uploaded pages.
pub struct UploadService {
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageBackend>,
    limits: UploadLimits,
    ttl: Duration,
    metrics: Arc<ServiceMetrics>,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageBackend>,
        config: &Config,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            store,
            storage,
            limits: config.limits.upload.clone(),
            ttl: Duration::seconds(config.ttl.upload_secs as i64),
            metrics,
        }
    }

    /// Validate and persist an upload. On success the blob sits at
    /// `original/{upload_id}{ext}` and a metadata record with the upload TTL
    /// exists in the store.
    pub async fn create_upload(
        &self,
        filename: Option<&str>,
        declared_type: Option<&str>,
        data: Bytes,
    ) -> ServiceResult<UploadRecord> {
        let image = validate_upload(&self.limits, declared_type, &data)?;

        let upload_id = new_upload_id();
        let storage_key = original_key(&upload_id, image.extension);
        let created_at = Utc::now();

        self.storage
            .put(&storage_key, data.clone())
            .await
            .map_err(ServiceError::Internal)?;

        let record = UploadRecord {
            upload_id: upload_id.clone(),
            filename: filename.unwrap_or("unknown").to_string(),
            content_type: image.content_type.to_string(),
            size_bytes: data.len() as u64,
            storage_key: storage_key.clone(),
            created_at,
            expires_at: created_at + self.ttl,
        };

        if let Err(err) = self.store.put_upload(&record).await {
            // The blob is already written; take it back out so nothing
            // orphaned survives the failure.
            if let Err(cleanup_err) = self.storage.delete(&storage_key).await {
                warn!(
                    "Failed to clean up blob {} after store error: {}",
                    storage_key, cleanup_err
                );
            }
            return Err(ServiceError::Internal(err));
        }

        self.metrics.record_upload();
        info!(
            "Stored upload {} ({}x{}, {} bytes)",
            upload_id,
            image.width,
            image.height,
            data.len()
        );
        Ok(record)
    }

    /// Fetch a live upload record.
    pub async fn get_upload(&self, upload_id: &str) -> ServiceResult<UploadRecord> {
        if !is_valid_upload_id(upload_id) {
            return Err(ServiceError::InvalidUploadId(upload_id.to_string()));
        }
        self.store
            .get_upload(upload_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::UploadNotFound(upload_id.to_string()))
    }
}

struct ValidatedImage {
    content_type: &'static str,
    extension: &'static str,
    width: u32,
    height: u32,
}

fn detect_image_type(data: &[u8]) -> Option<(&'static str, &'static str)> {
    if data.starts_with(JPEG_MAGIC) {
        Some(("image/jpeg", ".jpg"))
    } else if data.starts_with(PNG_MAGIC) {
        Some(("image/png", ".png"))
    } else {
        None
    }
}

fn validate_upload(
    limits: &UploadLimits,
    declared_type: Option<&str>,
    data: &[u8],
) -> ServiceResult<ValidatedImage> {
    if data.is_empty() {
        return Err(ServiceError::InvalidImage("Empty upload".to_string()));
    }
    if data.len() as u64 > limits.max_bytes {
        return Err(ServiceError::InvalidImage(format!(
            "File too large: {} bytes (max {} bytes)",
            data.len(),
            limits.max_bytes
        )));
    }

    match declared_type {
        Some("image/jpeg") | Some("image/png") => {}
        other => {
            return Err(ServiceError::InvalidImage(format!(
                "Unsupported content type: {}",
                other.unwrap_or("unknown")
            )));
        }
    }

    let Some((content_type, extension)) = detect_image_type(data) else {
        return Err(ServiceError::InvalidImage(
            "Not a recognizable image file".to_string(),
        ));
    };
    if let Some(declared) = declared_type {
        if declared != content_type {
            return Err(ServiceError::InvalidImage(format!(
                "Content type mismatch: declared {}, detected {}",
                declared, content_type
            )));
        }
    }

    let (width, height) = image::load_from_memory(data)
        .map_err(|_| ServiceError::InvalidImage("Image decoding failed".to_string()))
        .map(|img| (img.width(), img.height()))?;

    if width < limits.min_width {
        return Err(ServiceError::InvalidImage(format!(
            "Image width too small: {}px (min {}px)",
            width, limits.min_width
        )));
    }
    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        return Err(ServiceError::InvalidImage(format!(
            "Too many pixels: {}x{} = {} (max {})",
            width, height, pixels, limits.max_pixels
        )));
    }
    let aspect = height as f32 / width as f32;
    if aspect > limits.max_aspect_ratio {
        return Err(ServiceError::InvalidImage(format!(
            "Aspect ratio too tall: {:.2} (max {:.1})",
            aspect, limits.max_aspect_ratio
        )));
    }

    Ok(ValidatedImage {
        content_type,
        extension,
        width,
        height,
    })
}
