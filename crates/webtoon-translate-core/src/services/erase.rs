//! Manual retouch of a finished translation.
//!
//! The client paints over leftover artifacts in the browser and sends the
//! brush strokes as a base64 PNG mask. Marked areas of the stored result
//! are re-restored through the inpainting router and the retouched image
//! goes straight back in the response; the stored result is left alone so
//! the client can preview and iterate.

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::GrayImage;
use tracing::{error, info};

use crate::config::InpaintingConfig;
use crate::ident::is_valid_translate_id;
use crate::inpaint::{create_inpainter, RoutedInpainter};
use crate::metrics::ServiceMetrics;
use crate::storage::{result_key, StorageBackend};
use crate::store::{MetadataStore, TranslationStatus};

use super::{ServiceError, ServiceResult};

/// Applies brush-mask restoration to completed translation results.
pub struct EraseService {
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageBackend>,
    inpainter: RoutedInpainter,
    metrics: Arc<ServiceMetrics>,
}

impl EraseService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageBackend>,
        inpainting: &InpaintingConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> crate::Result<Self> {
        Ok(Self {
            store,
            storage,
            inpainter: create_inpainter(inpainting)?,
            metrics,
        })
    }

    /// Erase the masked areas of a completed translation's result image.
    /// Returns the retouched image as base64 PNG.
    pub async fn erase(&self, translate_id: &str, mask_base64: &str) -> ServiceResult<String> {
        if !is_valid_translate_id(translate_id) {
            return Err(ServiceError::InvalidTranslateId(translate_id.to_string()));
        }

        let job = self
            .store
            .get_translation(translate_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::TranslateNotFound(translate_id.to_string()))?;
        if job.status != TranslationStatus::Completed {
            return Err(ServiceError::TranslateNotCompleted(
                job.status.as_str().to_string(),
            ));
        }

        let key = result_key(translate_id);
        if !self
            .storage
            .exists(&key)
            .await
            .map_err(ServiceError::Internal)?
        {
            return Err(ServiceError::ResultImageNotFound);
        }
        let result_bytes = self
            .storage
            .get(&key)
            .await
            .map_err(ServiceError::Internal)?;
        let page = image::load_from_memory(&result_bytes)
            .map_err(|_| {
                ServiceError::InpaintingFailed("Result image failed to decode".to_string())
            })?
            .to_rgb8();

        let mask = decode_mask(mask_base64, page.width(), page.height())?;

        let restored = match self.inpainter.mask_restore(&page, &mask).await {
            Ok(restored) => restored,
            Err(err) => {
                error!("[{}] Mask restore failed: {}", translate_id, err);
                return Err(ServiceError::InpaintingFailed(err.to_string()));
            }
        };

        let mut out = Vec::new();
        restored
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| ServiceError::InpaintingFailed(e.to_string()))?;

        self.metrics.record_erase();
        info!("[{}] Erase complete", translate_id);
        Ok(BASE64_STANDARD.encode(&out))
    }
}

/// Decode a base64 PNG brush mask into a binary grayscale mask matching the
/// target dimensions. Any non-zero pixel counts as marked; size mismatches
/// get a nearest-neighbor resize so brush edges stay hard.
fn decode_mask(mask_base64: &str, width: u32, height: u32) -> ServiceResult<GrayImage> {
    let bytes = BASE64_STANDARD
        .decode(mask_base64)
        .map_err(|_| ServiceError::InvalidMask("Mask is not valid base64".to_string()))?;
    let mut mask = image::load_from_memory(&bytes)
        .map_err(|_| ServiceError::InvalidMask("Mask is not a decodable image".to_string()))?
        .to_luma8();

    for px in mask.pixels_mut() {
        px.0[0] = if px.0[0] > 1 { 255 } else { 0 };
    }
    if mask.dimensions() != (width, height) {
        mask = image::imageops::resize(&mask, width, height, FilterType::Nearest);
    }
    Ok(mask)
}
