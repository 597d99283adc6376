//! Physical page geometry derived from measured content height.
//!
//! Width is always US Letter. Height grows with the content so the whole
//! document lands on one continuous page, but never drops below Letter.

/// CSS reference pixel density.
pub const CSS_PX_PER_INCH: f64 = 96.0;
pub const LETTER_WIDTH_IN: f64 = 8.5;
pub const LETTER_HEIGHT_IN: f64 = 11.0;

/// Letter at 96 DPI: 816 × 1056 px.
pub const LETTER_WIDTH_PX: u32 = 816;
pub const LETTER_HEIGHT_PX: u32 = 1056;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_inches: f64,
    pub height_inches: f64,
}

impl PageGeometry {
    pub fn letter() -> Self {
        Self {
            width_inches: LETTER_WIDTH_IN,
            height_inches: LETTER_HEIGHT_IN,
        }
    }

    /// Sizes the page to `content_height_px` plus a per-template trailing buffer.
    ///
    /// Non-finite or negative inputs count as zero, so a broken measurement
    /// degrades to a plain Letter page instead of an invalid paper size.
    pub fn from_content_height(content_height_px: f64, trailing_buffer_in: f64) -> Self {
        let content_in = px_to_inches(content_height_px);
        let buffer_in = non_negative(trailing_buffer_in);
        let letter = Self::letter();
        Self {
            height_inches: (content_in + buffer_in).max(letter.height_inches),
            ..letter
        }
    }

    pub fn is_extended(&self) -> bool {
        self.height_inches > LETTER_HEIGHT_IN
    }
}

pub fn px_to_inches(px: f64) -> f64 {
    non_negative(px) / CSS_PX_PER_INCH
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
