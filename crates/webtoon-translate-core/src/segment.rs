//! Vertical segmentation of long webtoon pages.
//!
//! Full episodes are routinely 20k+ pixels tall, far beyond what detection
//! and translation providers accept in one shot. Pages taller than
//! [`MAX_SEGMENT_HEIGHT`] are cut at the brightest horizontal band in each
//! search window so cuts land in gutters between panels, and the translated
//! segments are stacked back together afterwards.

use image::{GrayImage, RgbImage};
use tracing::debug;

use crate::{Error, Result};

/// Tallest segment a provider round-trip can handle.
pub const MAX_SEGMENT_HEIGHT: u32 = 2688;

/// Shortest segment worth cutting; keeps the cut search inside
/// `[MIN_SEGMENT_HEIGHT, MAX_SEGMENT_HEIGHT]` below the segment start.
pub const MIN_SEGMENT_HEIGHT: u32 = 1612;

/// Mean row brightness at or above this counts as gutter whitespace.
pub const WHITESPACE_THRESHOLD: f32 = 240.0;

/// A horizontal slice of the original page.
#[derive(Debug, Clone)]
pub struct PageSegment {
    /// Pixel data of the slice.
    pub image: RgbImage,
    /// Y offset of the slice's top row in the original page.
    pub offset_y: u32,
}

/// Mean brightness of the 5-row strip centered on `y`, clamped to the image.
fn strip_brightness(gray: &GrayImage, y: u32) -> f32 {
    let top = y.saturating_sub(2);
    let bottom = (y + 3).min(gray.height());
    if top >= bottom {
        return 0.0;
    }

    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for row in top..bottom {
        for x in 0..gray.width() {
            sum += gray.get_pixel(x, row).0[0] as u64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32
    }
}

/// Find the cut row inside `(start_y, end_y]`, scanning bottom-up.
///
/// The first row whose strip brightness reaches [`WHITESPACE_THRESHOLD`]
/// wins; otherwise the brightest row seen is returned, so a page with no
/// clean gutter still gets cut at the least-bad spot.
fn find_split_point(gray: &GrayImage, start_y: u32, end_y: u32) -> u32 {
    let mut best_y = end_y;
    let mut best_brightness = 0.0f32;

    for y in (start_y + 1..=end_y).rev() {
        let brightness = strip_brightness(gray, y);
        if brightness >= WHITESPACE_THRESHOLD {
            return y;
        }
        if brightness > best_brightness {
            best_brightness = brightness;
            best_y = y;
        }
    }

    best_y
}

/// Split a page into provider-sized segments.
///
/// Pages at most [`MAX_SEGMENT_HEIGHT`] tall come back as a single segment.
pub fn split_page(image: &RgbImage) -> Vec<PageSegment> {
    let height = image.height();

    if height <= MAX_SEGMENT_HEIGHT {
        return vec![PageSegment {
            image: image.clone(),
            offset_y: 0,
        }];
    }

    let gray = image::imageops::grayscale(image);
    let mut segments = Vec::new();
    let mut current_y = 0u32;

    while current_y < height {
        let remaining = height - current_y;

        if remaining <= MAX_SEGMENT_HEIGHT {
            segments.push(slice_rows(image, current_y, height));
            break;
        }

        let search_start = current_y + MIN_SEGMENT_HEIGHT;
        let search_end = (current_y + MAX_SEGMENT_HEIGHT).min(height);
        let split_y = find_split_point(&gray, search_start, search_end);

        segments.push(slice_rows(image, current_y, split_y));
        current_y = split_y;
    }

    debug!(
        height,
        segments = segments.len(),
        "Split page into segments"
    );
    segments
}

fn slice_rows(image: &RgbImage, top: u32, bottom: u32) -> PageSegment {
    let slice = image::imageops::crop_imm(image, 0, top, image.width(), bottom - top).to_image();
    PageSegment {
        image: slice,
        offset_y: top,
    }
}

/// Stack translated segments back into a full page, top to bottom.
pub fn merge_pages(segments: &[RgbImage]) -> Result<RgbImage> {
    let first = segments
        .first()
        .ok_or_else(|| Error::Image("no segments to merge".to_string()))?;
    if segments.len() == 1 {
        return Ok(first.clone());
    }

    let width = first.width();
    let total_height: u32 = segments.iter().map(|s| s.height()).sum();
    let mut merged = RgbImage::new(width, total_height);

    let mut y: i64 = 0;
    for segment in segments {
        image::imageops::replace(&mut merged, segment, 0, y);
        y += segment.height() as i64;
    }

    Ok(merged)
}
