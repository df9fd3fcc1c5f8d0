//! # Measurement
//!
//! Layout code never asks "what kind of widget is this?". It asks a
//! [`Measurable`] for up to three answers and takes the first one available:
//!
//! 1. the *display* size (what the widget renders at, after scaling),
//! 2. the *intrinsic* size (its unscaled width/height),
//! 3. a bounding box query (containers: the union of their children),
//!
//! falling back to zero. [`resolve_size`] implements that order.
//!
//! Text has no shaping engine behind it, so [`estimate_text_width`] uses an
//! average-advance heuristic that is good enough for sizing debug panels.

use unicode_segmentation::UnicodeSegmentation;

use crate::{Rect, Size};

/// Average glyph advance as a fraction of the font size.
pub const AVG_ADVANCE: f32 = 0.6;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.25;

pub trait Measurable {
    fn display_size(&self) -> Option<Size> {
        None
    }
    fn intrinsic_size(&self) -> Option<Size> {
        None
    }
    fn bounds(&self) -> Option<Rect> {
        None
    }
}

/// Resolves a size via display size → intrinsic size → bounds → zero.
pub fn resolve_size(m: &dyn Measurable) -> Size {
    if let Some(s) = m.display_size() {
        return s;
    }
    if let Some(s) = m.intrinsic_size() {
        return s;
    }
    if let Some(r) = m.bounds() {
        return r.size();
    }
    Size::ZERO
}

/// Heuristic single-line width: graphemes × font size × average advance.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    let longest = text
        .lines()
        .map(|l| l.graphemes(true).count())
        .max()
        .unwrap_or(0);
    longest as f32 * font_size * AVG_ADVANCE
}

/// Estimated box for `text`, one line per `\n`.
pub fn estimate_text_size(text: &str, font_size: f32) -> Size {
    let lines = text.lines().count().max(1);
    Size::new(
        estimate_text_width(text, font_size),
        lines as f32 * font_size * LINE_HEIGHT,
    )
}

impl Measurable for Size {
    fn intrinsic_size(&self) -> Option<Size> {
        Some(*self)
    }
}
