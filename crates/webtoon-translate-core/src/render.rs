//! Drawing translated text into cleaned regions.
//!
//! The renderer searches for the largest font size whose wrapped text block
//! fits the render area, then draws the block centered in black. Sizing
//! works on character-count estimates first and verifies with real glyph
//! measurements, so the search stays cheap.

use std::collections::HashMap;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, info};

use crate::inpaint::CleanedRegion;
use crate::translate::RegionTranslation;
use crate::Result;

const MAX_FONT_SIZE: u32 = 40;
const MIN_FONT_SIZE: u32 = 8;

/// Vertical advance between lines, as a multiple of the font size. Also
/// used when measuring whether a block fits.
const LINE_HEIGHT_RATIO: f32 = 1.3;

/// Sample used to estimate the average glyph width at a candidate size.
const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Fonts probed in order; the service only needs one of them.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Draws translations into render areas.
pub struct TextRenderer {
    font: FontVec,
}

impl TextRenderer {
    /// Load the first available system font. No font on the host is a
    /// deployment problem and surfaces as a configuration error.
    pub fn new() -> Result<Self> {
        for path in FONT_CANDIDATES {
            if let Ok(bytes) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(bytes) {
                    debug!("Loaded render font from {}", path);
                    return Ok(Self { font });
                }
            }
        }
        Err(crate::Error::Config(
            "no usable render font found; install DejaVu, Liberation or Noto Sans".to_string(),
        ))
    }

    /// Draw every translated region into `page`. Regions without a
    /// translation, with empty text or with degenerate render areas stay
    /// untouched.
    pub fn render_translations(
        &self,
        page: &mut RgbImage,
        regions: &[CleanedRegion],
        translations: &[RegionTranslation],
    ) {
        let mut texts: HashMap<usize, &str> = HashMap::new();
        for translation in translations {
            texts.insert(translation.index, translation.text.as_str());
        }

        let mut drawn = 0usize;
        for (index, region) in regions.iter().enumerate() {
            let Some(text) = texts.get(&index).copied().filter(|t| !t.is_empty()) else {
                continue;
            };
            if self.render_region(page, region, text) {
                drawn += 1;
            }
        }
        info!("Rendered {} of {} regions", drawn, regions.len());
    }

    fn render_region(&self, page: &mut RgbImage, region: &CleanedRegion, text: &str) -> bool {
        let Some(rect) = region
            .render_bbox
            .to_pixel_rect(page.width(), page.height())
        else {
            return false;
        };
        if rect.width < 10 || rect.height < 10 {
            return false;
        }

        let box_width = rect.width as f32;
        let box_height = rect.height as f32;
        let (size, lines) = self.fit_text(text, box_width, box_height);
        let scale = PxScale::from(size);

        let line_height = size * LINE_HEIGHT_RATIO;
        let total_height = lines.len() as f32 * line_height;
        let start_y = rect.y as f32 + (box_height - total_height) / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let (line_width, _) = text_size(scale, &self.font, line);
            let x = rect.x as f32 + (box_width - line_width as f32) / 2.0;
            let y = start_y + i as f32 * line_height;
            draw_text_mut(
                page,
                Rgb([0u8, 0u8, 0u8]),
                x.round() as i32,
                y.round() as i32,
                scale,
                &self.font,
                line,
            );
        }
        true
    }

    /// Largest size in `[MIN_FONT_SIZE, min(box_height/2, MAX_FONT_SIZE)]`
    /// whose wrapped block fits the box, with its wrapping. Falls back to
    /// the minimum size with hard character wrapping.
    fn fit_text(&self, text: &str, box_width: f32, box_height: f32) -> (f32, Vec<String>) {
        let max_size = ((box_height / 2.0) as u32).min(MAX_FONT_SIZE);

        for size in (MIN_FONT_SIZE..=max_size).rev() {
            let size = size as f32;
            let scale = PxScale::from(size);
            let (alphabet_width, _) = text_size(scale, &self.font, ALPHABET);
            let avg_char_width = alphabet_width as f32 / ALPHABET.chars().count() as f32;

            let lines = wrap_text(text, chars_per_line(box_width, avg_char_width));
            let widest = lines
                .iter()
                .map(|line| text_size(scale, &self.font, line).0)
                .max()
                .unwrap_or(0) as f32;

            if block_fits(lines.len(), widest, size, box_width, box_height) {
                return (size, lines);
            }
        }

        let size = MIN_FONT_SIZE as f32;
        let scale = PxScale::from(size);
        let lines = force_wrap(text, box_width * 0.9, |s| {
            text_size(scale, &self.font, s).0 as f32
        });
        (size, lines)
    }
}

/// Characters per line a box fits at the given average glyph width, with 20%
/// slack for proportional fonts. Never below one.
fn chars_per_line(box_width: f32, avg_char_width: f32) -> usize {
    (((box_width * 0.8) / avg_char_width) as usize).max(1)
}

/// Greedy word wrap at `max_chars` per line. Words longer than a line are
/// broken mid-word.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut push_word = |word: &str,
                         lines: &mut Vec<String>,
                         current: &mut String,
                         current_len: &mut usize| {
        let word_len = word.chars().count();
        if *current_len > 0 && *current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            *current_len += 1 + word_len;
            return;
        }
        if *current_len > 0 {
            lines.push(std::mem::take(current));
            *current_len = 0;
        }
        if word_len <= max_chars {
            current.push_str(word);
            *current_len = word_len;
            return;
        }
        // Break an overlong word into full lines, keeping the tail open.
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(max_chars) {
            if *current_len > 0 {
                lines.push(std::mem::take(current));
            }
            *current = chunk.iter().collect();
            *current_len = chunk.len();
        }
    };

    for word in text.split_whitespace() {
        push_word(word, &mut lines, &mut current, &mut current_len);
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Whether a wrapped block fits a box with 5% margin in both dimensions.
fn block_fits(
    line_count: usize,
    max_line_width: f32,
    size: f32,
    box_width: f32,
    box_height: f32,
) -> bool {
    let text_height = line_count as f32 * size * LINE_HEIGHT_RATIO;
    text_height <= box_height * 0.95 && max_line_width <= box_width * 0.95
}

/// Last-resort wrapping: break after any character that would cross
/// `max_width` according to `measure`.
fn force_wrap(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if measure(&candidate) > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
