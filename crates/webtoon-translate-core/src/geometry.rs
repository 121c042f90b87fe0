//! Bounding boxes and text regions flowing through the pipeline.
//!
//! Detector output arrives as raw float quadruples and is not trusted:
//! construction rejects non-finite values, swaps inverted corners and clamps
//! negative coordinates to zero, so every `BBox` held by later stages is
//! already normalized.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in image coordinates.
///
/// Invariants (enforced at construction): all coordinates finite and
/// non-negative, `x1 <= x2`, `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Build a normalized box from corner coordinates.
    ///
    /// Returns `None` when any coordinate is NaN or infinite. Swapped
    /// corners are reordered and negative coordinates clamped to zero.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (x1, x2) = if x1 > x2 { (x2, x1) } else { (x1, x2) };
        let (y1, y2) = if y1 > y2 { (y2, y1) } else { (y1, y2) };
        Some(Self {
            x1: x1.max(0.0),
            y1: y1.max(0.0),
            x2: x2.max(0.0),
            y2: y2.max(0.0),
        })
    }

    /// Build from a raw wire quadruple `[x1, y1, x2, y2]`.
    pub fn from_raw(raw: &[f32]) -> Option<Self> {
        match raw {
            [x1, y1, x2, y2] => Self::from_corners(*x1, *y1, *x2, *y2),
            _ => None,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// A box is usable when it spans at least one point in both dimensions.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Expand by `pad_x`/`pad_y` on each side, clamped at the origin.
    pub fn expanded(&self, pad_x: f32, pad_y: f32) -> Self {
        Self {
            x1: (self.x1 - pad_x).max(0.0),
            y1: (self.y1 - pad_y).max(0.0),
            x2: self.x2 + pad_x,
            y2: self.y2 + pad_y,
        }
    }

    /// Clip to image bounds.
    pub fn clipped_to(&self, width: u32, height: u32) -> Self {
        Self {
            x1: self.x1.min(width as f32),
            y1: self.y1.min(height as f32),
            x2: self.x2.min(width as f32),
            y2: self.y2.min(height as f32),
        }
    }

    /// Area of the intersection with another box.
    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Intersection with another box, `None` when the boxes do not overlap
    /// with positive area.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(BBox { x1, y1, x2, y2 })
    }

    /// Intersection over the smaller of the two areas.
    pub fn overlap_ratio(&self, other: &BBox) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / smaller
    }

    /// Fraction of this box's area lying inside `outer`.
    pub fn inscribed_fraction(&self, outer: &BBox) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        self.intersection_area(outer) / area
    }

    /// Integer pixel rectangle, rounded and clipped to image bounds.
    ///
    /// Returns `None` when nothing remains after clipping.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<PixelRect> {
        let clipped = self.clipped_to(width, height);
        let x = clipped.x1.round() as u32;
        let y = clipped.y1.round() as u32;
        let right = (clipped.x2.round() as u32).min(width);
        let bottom = (clipped.y2.round() as u32).min(height);
        if right <= x || bottom <= y {
            return None;
        }
        Some(PixelRect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        })
    }
}

/// Integer pixel rectangle, always inside the image it was clipped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// One past the rightmost column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One past the bottom row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Classification of a detected text region.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionKind {
    /// Text inside a speech bubble; carries the bubble's box.
    BubbleText { bubble: BBox },
    /// Text drawn directly on the artwork.
    FreeText,
}

/// A detected text region moving through the pipeline stages.
#[derive(Debug, Clone)]
pub struct TextRegion {
    /// Tight box around the text.
    pub bbox: BBox,

    /// Bubble or free text.
    pub kind: RegionKind,
}

impl TextRegion {
    pub fn new(bbox: BBox, kind: RegionKind) -> Self {
        Self { bbox, kind }
    }

    pub fn is_bubble_text(&self) -> bool {
        matches!(self.kind, RegionKind::BubbleText { .. })
    }
}
