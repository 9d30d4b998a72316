//! Coordinate mapping, freehand stroke rendering and SVG generation for ink
//! annotations.
//!
//! Canvas coordinates are in device pixels of the zoomed on-screen page. PDF
//! coordinates are in points with the origin at the top-left of the page, the
//! same orientation as the canvas; the flip into PDF user space happens when
//! the raster overlay is drawn onto the page.

pub mod mapper;
pub mod renderer;
pub mod surface;
pub mod svg;

pub use mapper::{device_pixel_ratio_from_env, CoordinateMapper, DEVICE_PIXEL_RATIO_ENV};
pub use renderer::{pressure_width, BaseRenderer, RenderOptions, StrokeRenderer};
pub use surface::{Composite, PixmapSurface, SavedState, Scale, Surface};
pub use svg::{SvgElement, SvgGenerator};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unable to allocate a {width}x{height} raster surface")]
    SurfaceAllocation { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("invalid page geometry: {0}")]
    InvalidGeometry(String),
    #[error("SVG serialization failed: {0}")]
    Serialize(String),
}

/// Formats a coordinate with at most three decimals and no trailing zeros.
pub(crate) fn fmt_num(value: f32) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_owned(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::fmt_num;

    #[test]
    fn fmt_num_trims_trailing_zeros() {
        assert_eq!(fmt_num(612.0), "612");
        assert_eq!(fmt_num(0.75), "0.75");
        assert_eq!(fmt_num(1.0 / 3.0), "0.333");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(-2.5), "-2.5");
    }
}
