use serde::{Deserialize, Serialize};

/// On-screen size of the page as the viewer rendered it, plus its zoom factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportDimensions {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl ViewportDimensions {
    pub fn new(width: f32, height: f32, scale: f32) -> Self {
        Self { width, height, scale }
    }

    pub fn is_valid(&self) -> bool {
        is_positive(self.width) && is_positive(self.height) && is_positive(self.scale)
    }
}

/// Native page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfDimensions {
    pub width: f32,
    pub height: f32,
}

impl PdfDimensions {
    pub const LETTER: PdfDimensions = PdfDimensions { width: 612.0, height: 792.0 };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        is_positive(self.width) && is_positive(self.height)
    }
}

impl Default for PdfDimensions {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Axis-aligned box; `x`/`y` is the top-left corner in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

pub(crate) fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rejects_non_positive_values() {
        assert!(ViewportDimensions::new(816.0, 1056.0, 1.0).is_valid());
        assert!(!ViewportDimensions::new(0.0, 1056.0, 1.0).is_valid());
        assert!(!ViewportDimensions::new(816.0, -1.0, 1.0).is_valid());
        assert!(!ViewportDimensions::new(816.0, 1056.0, 0.0).is_valid());
        assert!(!ViewportDimensions::new(f32::NAN, 1056.0, 1.0).is_valid());
    }

    #[test]
    fn pdf_dimensions_default_to_letter() {
        let dims = PdfDimensions::default();
        assert_eq!((dims.width, dims.height), (612.0, 792.0));
        assert!(dims.is_valid());
        assert!(!PdfDimensions::new(612.0, 0.0).is_valid());
    }
}
