//! The page translation pipeline.
//!
//! A page runs through five stages: segmentation, detection, inpainting,
//! translation and rendering. Detection and translation go out to remote
//! providers; everything else is local image work. Segments are processed
//! in order and merged back into one page at the end.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::detection::{create_detector, TextDetector};
use crate::error::ProviderError;
use crate::geometry::BBox;
use crate::inpaint::{create_inpainter, RoutedInpainter};
use crate::metrics::{ProviderOutcome, ServiceMetrics};
use crate::render::TextRenderer;
use crate::segment::{merge_pages, split_page};
use crate::translate::{create_translator, Translator};
use crate::{Error, Result};

/// Runs whole pages through detection, inpainting, translation and
/// rendering.
pub struct TranslatePipeline {
    detector: Arc<dyn TextDetector>,
    inpainter: RoutedInpainter,
    translator: Arc<dyn Translator>,
    renderer: TextRenderer,
    metrics: Arc<ServiceMetrics>,
}

impl TranslatePipeline {
    pub fn new(
        detector: Arc<dyn TextDetector>,
        inpainter: RoutedInpainter,
        translator: Arc<dyn Translator>,
        renderer: TextRenderer,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            detector,
            inpainter,
            translator,
            renderer,
            metrics,
        }
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &Config, metrics: Arc<ServiceMetrics>) -> Result<Self> {
        Ok(Self {
            detector: create_detector(&config.detection)?,
            inpainter: create_inpainter(&config.inpainting)?,
            translator: create_translator(&config.translation)?,
            renderer: TextRenderer::new()?,
            metrics,
        })
    }

    /// Translate one page image. Accepts any decodable input and always
    /// produces PNG bytes.
    pub async fn translate_page(
        &self,
        image_bytes: &[u8],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<u8>> {
        let page = image::load_from_memory(image_bytes)?.to_rgb8();
        let segments = split_page(&page);
        info!(
            "Translating {}x{} page in {} segment(s), {} -> {}",
            page.width(),
            page.height(),
            segments.len(),
            source_lang,
            target_lang
        );

        let mut finished: Vec<RgbImage> = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            match self
                .translate_segment(&segment.image, source_lang, target_lang)
                .await
            {
                Ok(done) => finished.push(done),
                Err(err) => {
                    error!("Segment {} of {} failed: {}", i + 1, segments.len(), err);
                    return Err(err);
                }
            }
        }

        let merged = merge_pages(&finished)?;
        let mut out = Vec::new();
        merged.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
        Ok(out)
    }

    async fn translate_segment(
        &self,
        segment: &RgbImage,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<RgbImage> {
        let mut png = Vec::new();
        segment.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        let started = Instant::now();
        let detection = match self.detector.detect(&png).await {
            Ok(detection) => {
                self.metrics
                    .record_provider_request("detection", ProviderOutcome::Ok);
                detection
            }
            Err(err) => {
                self.metrics
                    .record_provider_request("detection", provider_outcome(&err));
                return Err(err.into());
            }
        };
        self.metrics.record_stage("detection", started.elapsed());

        if detection.is_empty() {
            debug!("No text on segment, passing through");
            return Ok(segment.clone());
        }
        debug!(
            "Detected {} text region(s), {} bubble(s)",
            detection.texts.len(),
            detection.bubbles.len()
        );

        let started = Instant::now();
        let (cleaned, regions) = self
            .inpainter
            .inpaint(segment.clone(), &detection.texts, &detection.bubbles)
            .await?;
        self.metrics.record_stage("inpainting", started.elapsed());

        // Translation crops come from the untouched segment, not the
        // cleaned one.
        let text_boxes: Vec<BBox> = regions.iter().map(|r| r.text_bbox).collect();
        let started = Instant::now();
        let translations = match self
            .translator
            .translate(segment, &text_boxes, source_lang, target_lang)
            .await
        {
            Ok(translations) => {
                self.metrics
                    .record_provider_request("translation", ProviderOutcome::Ok);
                translations
            }
            Err(err) => {
                if let Error::Provider(provider_err) = &err {
                    self.metrics
                        .record_provider_request("translation", provider_outcome(provider_err));
                }
                return Err(err);
            }
        };
        self.metrics.record_stage("translation", started.elapsed());
        debug!(
            "Received {} translation(s) for {} region(s)",
            translations.len(),
            regions.len()
        );

        let mut rendered = cleaned;
        let started = Instant::now();
        self.renderer
            .render_translations(&mut rendered, &regions, &translations);
        self.metrics.record_stage("rendering", started.elapsed());

        Ok(rendered)
    }
}

fn provider_outcome(err: &ProviderError) -> ProviderOutcome {
    match err {
        ProviderError::Timeout { .. } => ProviderOutcome::Timeout,
        ProviderError::CircuitOpen { .. } => ProviderOutcome::CircuitOpen,
        _ => ProviderOutcome::Error,
    }
}
