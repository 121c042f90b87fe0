//! Solid-color text removal.
//!
//! Samples the border ring of the area being cleaned and paints the whole
//! area with the per-channel median of the bright border pixels. Works well
//! for bubbles and flat backgrounds; detailed artwork goes through the
//! remote restorer instead.

use std::collections::HashMap;

use async_trait::async_trait;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use imageproc::region_labelling::{connected_components, Connectivity};

use super::classify::{inscribed_rect, INSCRIBED_RATIO};
use super::BackgroundRestorer;
use crate::geometry::{BBox, PixelRect};
use crate::Result;

/// Padding around bubble text before filling, as a fraction of the text box
/// dimensions per side.
pub const PADDING_RATIO: f32 = 0.2;

// Free text gets wide horizontal padding so halos and outline strokes around
// the lettering are covered too.
const FREE_PAD_X_RATIO: f32 = 1.0;
const FREE_PAD_Y_RATIO: f32 = 0.3;

/// Border pixels brighter than this count as background candidates.
const BRIGHT_FLOOR: f32 = 180.0;

/// Widest border ring sampled for color estimation.
const BORDER_MAX: u32 = 5;

/// Local text remover: fills text areas with a sampled background color.
///
/// Doubles as the fallback [`BackgroundRestorer`] when no remote inpainting
/// service is configured.
pub struct SolidFill {
    padding_ratio: f32,
}

impl SolidFill {
    pub fn new() -> Self {
        Self {
            padding_ratio: PADDING_RATIO,
        }
    }

    /// Fill rect for bubble text: the padded text box clamped to the
    /// rectangle inscribed in the bubble.
    ///
    /// Returns `None` when the padded text box does not reach into the
    /// inscribed rectangle at all; nothing safe to fill in that case.
    pub(super) fn bubble_fill_bbox(
        &self,
        text: &BBox,
        bubble: &BBox,
        width: u32,
        height: u32,
    ) -> Option<BBox> {
        let inscribed = inscribed_rect(bubble, INSCRIBED_RATIO);
        let padded = text.expanded(
            text.width() * self.padding_ratio,
            text.height() * self.padding_ratio,
        );
        padded
            .intersection(&inscribed)
            .map(|fill| fill.clipped_to(width, height))
    }

    /// Fill rect for free text standing on the artwork.
    fn free_fill_bbox(&self, text: &BBox, width: u32, height: u32) -> BBox {
        text.expanded(
            text.width() * FREE_PAD_X_RATIO,
            text.height() * FREE_PAD_Y_RATIO,
        )
        .clipped_to(width, height)
    }

    /// Paint `bbox` in `page` with the background color sampled from the
    /// same area of `source`. `source` stays untouched so overlapping fills
    /// never sample their own output.
    pub(super) fn fill(&self, source: &RgbImage, page: &mut RgbImage, bbox: &BBox) {
        let Some(rect) = bbox.to_pixel_rect(page.width(), page.height()) else {
            return;
        };
        let color = extract_bg_color(source, &rect);
        draw_filled_rect_mut(
            page,
            Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height),
            color,
        );
    }
}

impl Default for SolidFill {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundRestorer for SolidFill {
    async fn restore(&self, image: RgbImage, texts: &[BBox]) -> Result<(RgbImage, Vec<BBox>)> {
        let (width, height) = image.dimensions();
        let source = image.clone();
        let mut page = image;
        let mut render_areas = Vec::with_capacity(texts.len());

        for text in texts {
            let fill = self.free_fill_bbox(text, width, height);
            self.fill(&source, &mut page, &fill);
            render_areas.push(fill);
        }

        Ok((page, render_areas))
    }

    async fn restore_mask(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let mut page = image.clone();

        for rect in mask_component_bounds(mask) {
            let bbox = BBox {
                x1: rect.x as f32,
                y1: rect.y as f32,
                x2: rect.right() as f32,
                y2: rect.bottom() as f32,
            };
            // The mask covers the content being removed, so its own border
            // is useless for color estimation; sample a ring just outside.
            let margin = BORDER_MAX as f32;
            let color = bbox
                .expanded(margin, margin)
                .to_pixel_rect(width, height)
                .map(|ring| extract_bg_color(image, &ring))
                .unwrap_or(Rgb([255, 255, 255]));
            if let Some(fill) = bbox.to_pixel_rect(width, height) {
                draw_filled_rect_mut(
                    &mut page,
                    Rect::at(fill.x as i32, fill.y as i32).of_size(fill.width, fill.height),
                    color,
                );
            }
        }

        Ok(page)
    }
}

/// Background color for a fill area: the per-channel median of its border
/// ring, restricted to bright pixels when enough exist so dark lettering
/// reaching the border does not skew the estimate.
pub(super) fn extract_bg_color(image: &RgbImage, rect: &PixelRect) -> Rgb<u8> {
    let border = BORDER_MAX.min(rect.height / 4).min(rect.width / 4);
    if border < 1 {
        return Rgb([255, 255, 255]);
    }

    let mut edges: Vec<[u8; 3]> = Vec::new();
    for y in rect.y..rect.y + border {
        for x in rect.x..rect.right() {
            edges.push(image.get_pixel(x, y).0);
        }
    }
    for y in rect.bottom() - border..rect.bottom() {
        for x in rect.x..rect.right() {
            edges.push(image.get_pixel(x, y).0);
        }
    }
    for x in rect.x..rect.x + border {
        for y in rect.y..rect.bottom() {
            edges.push(image.get_pixel(x, y).0);
        }
    }
    for x in rect.right() - border..rect.right() {
        for y in rect.y..rect.bottom() {
            edges.push(image.get_pixel(x, y).0);
        }
    }

    let bright: Vec<[u8; 3]> = edges
        .iter()
        .copied()
        .filter(|[r, g, b]| (*r as f32 + *g as f32 + *b as f32) / 3.0 > BRIGHT_FLOOR)
        .collect();

    let sample = if bright.len() > 10 { &bright } else { &edges };
    Rgb([
        channel_median(sample, 0),
        channel_median(sample, 1),
        channel_median(sample, 2),
    ])
}

fn channel_median(pixels: &[[u8; 3]], channel: usize) -> u8 {
    let mut values: Vec<u8> = pixels.iter().map(|px| px[channel]).collect();
    values.sort_unstable();
    let n = values.len();
    if n % 2 == 0 {
        ((values[n / 2 - 1] as u16 + values[n / 2] as u16) / 2) as u8
    } else {
        values[n / 2]
    }
}

/// Bounding rectangles of the white connected components of `mask`, in
/// top-to-bottom order.
fn mask_component_bounds(mask: &GrayImage) -> Vec<PixelRect> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut bounds: HashMap<u32, (u32, u32, u32, u32)> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let entry = bounds.entry(label).or_insert((x, y, x, y));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
    }

    let mut rects: Vec<PixelRect> = bounds
        .into_values()
        .map(|(x1, y1, x2, y2)| PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1 + 1,
            height: y2 - y1 + 1,
        })
        .collect();
    rects.sort_unstable_by_key(|r| (r.y, r.x));
    rects
}
