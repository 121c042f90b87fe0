//! Pairing detected text boxes with the speech bubbles that contain them.

use crate::geometry::{BBox, RegionKind, TextRegion};

/// Fraction of a bubble's half-extents spanned by the rectangle taken as
/// inscribed in its ellipse. The mathematical maximum is 1/sqrt(2) ~ 0.707;
/// 0.65 leaves a margin for hand-drawn outlines.
pub const INSCRIBED_RATIO: f32 = 0.65;

/// Minimum fraction of a text box that must lie inside a bubble for the two
/// to be paired.
pub const OVERLAP_THRESHOLD: f32 = 0.5;

/// The bubble covering the largest fraction of `text`, if any clears
/// [`OVERLAP_THRESHOLD`].
pub fn find_bubble(text: &BBox, bubbles: &[BBox]) -> Option<BBox> {
    let mut best = None;
    let mut best_overlap = 0.0f32;

    for bubble in bubbles {
        let overlap = text.inscribed_fraction(bubble);
        if overlap > best_overlap {
            best = Some(*bubble);
            best_overlap = overlap;
        }
    }

    if best_overlap > OVERLAP_THRESHOLD {
        best
    } else {
        None
    }
}

/// Largest rectangle treated as inscribed in the ellipse spanning `bubble`.
///
/// Replacement text stays inside this rectangle so it cannot touch the
/// bubble's outline.
pub fn inscribed_rect(bubble: &BBox, ratio: f32) -> BBox {
    let (cx, cy) = bubble.center();
    let hw = bubble.width() / 2.0;
    let hh = bubble.height() / 2.0;
    BBox {
        x1: cx - hw * ratio,
        y1: cy - hh * ratio,
        x2: cx + hw * ratio,
        y2: cy + hh * ratio,
    }
}

/// Classify each detected text box as bubble text or free text, preserving
/// detector order.
pub fn classify_regions(texts: &[BBox], bubbles: &[BBox]) -> Vec<TextRegion> {
    texts
        .iter()
        .map(|text| {
            let kind = match find_bubble(text, bubbles) {
                Some(bubble) => RegionKind::BubbleText { bubble },
                None => RegionKind::FreeText,
            };
            TextRegion::new(*text, kind)
        })
        .collect()
}
