//! Source-text removal.
//!
//! Detected regions are classified and routed: bubble text gets a local
//! solid-color fill (bubble interiors are flat), free text standing on
//! artwork goes to the configured background restorer. The router also
//! exposes direct mask-driven restoration for the erase endpoint.

mod classify;
mod remote;
mod solid_fill;

pub use classify::{classify_regions, find_bubble, inscribed_rect, INSCRIBED_RATIO,
    OVERLAP_THRESHOLD};
pub use remote::RemoteRestorer;
pub use solid_fill::SolidFill;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::config::{InpaintingConfig, InpaintingRestorer};
use crate::geometry::{BBox, RegionKind};
use crate::Result;

/// A text region after background cleanup, ready for translation and
/// rendering. Order follows detector order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRegion {
    /// Tight box around the source text.
    pub text_bbox: BBox,
    /// Area the replacement text may occupy.
    pub render_bbox: BBox,
}

/// Removes free-standing text from artwork backgrounds.
#[async_trait]
pub trait BackgroundRestorer: Send + Sync {
    /// Strip the given text areas from the page. `texts` are tight text
    /// boxes already clipped to the image. Returns the cleaned page and one
    /// render area per input box.
    async fn restore(&self, image: RgbImage, texts: &[BBox]) -> Result<(RgbImage, Vec<BBox>)>;

    /// Repaint the white areas of `mask` with plausible background.
    async fn restore_mask(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage>;
}

/// Classifies text regions and delegates each to the matching backend.
pub struct RoutedInpainter {
    cleaner: SolidFill,
    restorer: Arc<dyn BackgroundRestorer>,
}

impl RoutedInpainter {
    pub fn new(restorer: Arc<dyn BackgroundRestorer>) -> Self {
        Self {
            cleaner: SolidFill::new(),
            restorer,
        }
    }

    /// Remove all detected text from the page.
    ///
    /// Returns the cleaned page and the surviving regions with their render
    /// areas. Free-text boxes that clip to nothing are dropped; bubble
    /// regions always survive (rendering skips degenerate areas later).
    pub async fn inpaint(
        &self,
        image: RgbImage,
        texts: &[BBox],
        bubbles: &[BBox],
    ) -> Result<(RgbImage, Vec<CleanedRegion>)> {
        let (width, height) = image.dimensions();
        let regions = classify_regions(texts, bubbles);

        let source = image.clone();
        let mut page = image;
        let mut cleaned: Vec<CleanedRegion> = Vec::with_capacity(regions.len());
        let mut free_slots: Vec<usize> = Vec::new();
        let mut free_boxes: Vec<BBox> = Vec::new();

        for region in &regions {
            match &region.kind {
                RegionKind::BubbleText { bubble } => {
                    if let Some(fill) =
                        self.cleaner.bubble_fill_bbox(&region.bbox, bubble, width, height)
                    {
                        self.cleaner.fill(&source, &mut page, &fill);
                    }
                    let render_bbox =
                        inscribed_rect(bubble, INSCRIBED_RATIO).clipped_to(width, height);
                    cleaned.push(CleanedRegion {
                        text_bbox: region.bbox,
                        render_bbox,
                    });
                }
                RegionKind::FreeText => {
                    let clipped = region.bbox.clipped_to(width, height);
                    if !clipped.is_valid() {
                        debug!("Dropping free-text region clipped to nothing: {:?}", region.bbox);
                        continue;
                    }
                    free_slots.push(cleaned.len());
                    free_boxes.push(clipped);
                    cleaned.push(CleanedRegion {
                        text_bbox: clipped,
                        render_bbox: clipped,
                    });
                }
            }
        }

        if !free_boxes.is_empty() {
            let (restored, render_areas) = self.restorer.restore(page, &free_boxes).await?;
            page = restored;
            for (slot, render_bbox) in free_slots.iter().zip(render_areas) {
                cleaned[*slot].render_bbox = render_bbox;
            }
        }

        Ok((page, cleaned))
    }

    /// Mask-driven restoration for the erase endpoint. White mask pixels
    /// mark the areas to repaint.
    pub async fn mask_restore(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        self.restorer.restore_mask(image, mask).await
    }
}

/// Binary mask with the given boxes painted white on black.
pub fn build_text_mask(width: u32, height: u32, boxes: &[BBox]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for bbox in boxes {
        if let Some(rect) = bbox.to_pixel_rect(width, height) {
            draw_filled_rect_mut(
                &mut mask,
                Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
                Luma([255u8]),
            );
        }
    }
    mask
}

/// Build the configured inpainter.
pub fn create_inpainter(config: &InpaintingConfig) -> Result<RoutedInpainter> {
    let restorer: Arc<dyn BackgroundRestorer> = match config.restorer {
        InpaintingRestorer::Remote => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                crate::Error::Config("inpainting.endpoint is required".to_string())
            })?;
            Arc::new(RemoteRestorer::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
            )?)
        }
        InpaintingRestorer::SolidFill => Arc::new(SolidFill::new()),
    };
    Ok(RoutedInpainter::new(restorer))
}
