//! Text and speech-bubble detection.
//!
//! Detection runs against a remote model service; the provider answers with
//! raw `[x1, y1, x2, y2]` boxes which are validated into [`BBox`]es here.
//! Boxes the model mangles are dropped with a warning rather than failing
//! the whole page.

pub mod remote;

pub use remote::RemoteDetector;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::config::{DetectionConfig, DetectionProvider};
use crate::error::ProviderError;
use crate::geometry::BBox;
use crate::Result;

/// Regions detected on a single page segment.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Speech bubble outlines.
    pub bubbles: Vec<BBox>,
    /// Text regions (inside or outside bubbles).
    pub texts: Vec<BBox>,
}

impl Detection {
    /// Build a detection from raw provider boxes, dropping invalid ones.
    pub fn from_raw(bubbles: &[Vec<f32>], texts: &[Vec<f32>]) -> Self {
        Self {
            bubbles: collect_boxes(bubbles, "bubble"),
            texts: collect_boxes(texts, "text"),
        }
    }

    /// True when there is no text to translate on this segment.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

fn collect_boxes(raw: &[Vec<f32>], kind: &str) -> Vec<BBox> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, coords)| match BBox::from_raw(coords) {
            Some(bbox) if bbox.is_valid() => Some(bbox),
            _ => {
                warn!("Dropping invalid {} box #{}: {:?}", kind, i, coords);
                None
            }
        })
        .collect()
}

/// Text/bubble detector for page segments.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Detect text and bubble regions on a PNG-encoded page segment.
    async fn detect(&self, image_png: &[u8]) -> std::result::Result<Detection, ProviderError>;
}

/// Detector that never finds anything; pages pass through untranslated.
/// Useful for development without a detection service.
pub struct DisabledDetector;

#[async_trait]
impl TextDetector for DisabledDetector {
    async fn detect(&self, _image_png: &[u8]) -> std::result::Result<Detection, ProviderError> {
        Ok(Detection::default())
    }
}

/// Build the configured detector.
pub fn create_detector(config: &DetectionConfig) -> Result<Arc<dyn TextDetector>> {
    match config.provider {
        DetectionProvider::Remote => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                crate::Error::Config("detection.endpoint is required".to_string())
            })?;
            Ok(Arc::new(RemoteDetector::new(
                endpoint,
                std::time::Duration::from_secs(config.timeout_secs),
                config.max_retries,
            )?))
        }
        DetectionProvider::Disabled => Ok(Arc::new(DisabledDetector)),
    }
}
