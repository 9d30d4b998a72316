//! Canvas-pixel to PDF-point coordinate mapping for a single page.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use stroke_model::{MappedPoint, PdfDimensions, Point, StrokeSizeMapping, ViewportDimensions};

use crate::surface::Scale;
use crate::svg::SvgElement;
use crate::fmt_num;

/// Environment variable consulted for the display's device pixel ratio.
pub const DEVICE_PIXEL_RATIO_ENV: &str = "INKPAPER_DEVICE_PIXEL_RATIO";

const SVG_NS: &str = "http://www.w3.org/2000/svg";

static COORDINATE_PAIR: Lazy<Regex> = Lazy::new(|| {
    let number = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";
    Regex::new(&format!(r"({number})(\s*,\s*)({number})")).expect("coordinate pattern is valid")
});

/// Reads the device pixel ratio from the environment, falling back to 1.
pub fn device_pixel_ratio_from_env() -> f32 {
    std::env::var(DEVICE_PIXEL_RATIO_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<f32>().ok())
        .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
        .unwrap_or(1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    viewport: ViewportDimensions,
    pdf: PdfDimensions,
    device_pixel_ratio: f32,
    scale_factor_x: f32,
    scale_factor_y: f32,
    size_mapping: StrokeSizeMapping,
}

impl CoordinateMapper {
    pub fn new(viewport: ViewportDimensions, pdf: PdfDimensions) -> Self {
        Self::with_device_pixel_ratio(viewport, pdf, device_pixel_ratio_from_env())
    }

    /// Construction never fails; call [`validate`](Self::validate) before
    /// trusting the output.
    pub fn with_device_pixel_ratio(
        viewport: ViewportDimensions,
        pdf: PdfDimensions,
        device_pixel_ratio: f32,
    ) -> Self {
        let scale_factor_x = pdf.width / (viewport.width / viewport.scale);
        let scale_factor_y = pdf.height / (viewport.height / viewport.scale);

        Self {
            viewport,
            pdf,
            device_pixel_ratio,
            scale_factor_x,
            scale_factor_y,
            size_mapping: StrokeSizeMapping::default(),
        }
    }

    pub fn with_stroke_size_mapping(mut self, mapping: StrokeSizeMapping) -> Self {
        self.size_mapping = mapping;
        self
    }

    pub fn map_point(&self, point: Point) -> MappedPoint {
        let (pdf_x, pdf_y) = self.map_xy(point.x, point.y);
        MappedPoint { point, pdf_x, pdf_y }
    }

    /// Inverse of [`map_point`](Self::map_point): PDF points back to canvas pixels.
    pub fn unmap_point(&self, pdf_x: f32, pdf_y: f32) -> (f32, f32) {
        let divisor = self.device_pixel_ratio * self.viewport.scale;
        (pdf_x / self.scale_factor_x * divisor, pdf_y / self.scale_factor_y * divisor)
    }

    pub fn map_stroke_size(&self, size: f32) -> f32 {
        let factor = match self.size_mapping {
            StrokeSizeMapping::XAxis => self.scale_factor_x,
            StrokeSizeMapping::GeometricMean => (self.scale_factor_x * self.scale_factor_y).sqrt(),
        };
        size / self.device_pixel_ratio / self.viewport.scale * factor
    }

    /// Rewrites every `x,y` pair in an SVG path string; commands and
    /// separators are left as they were.
    pub fn map_path(&self, path: &str) -> String {
        COORDINATE_PAIR
            .replace_all(path, |caps: &Captures<'_>| {
                let (Ok(x), Ok(y)) = (caps[1].parse::<f32>(), caps[3].parse::<f32>()) else {
                    return caps[0].to_owned();
                };
                let (pdf_x, pdf_y) = self.map_xy(x, y);
                format!("{}{}{}", fmt_num(pdf_x), &caps[2], fmt_num(pdf_y))
            })
            .into_owned()
    }

    /// Canvas-to-PDF scale used when rasterizing strokes at one pixel per point.
    pub fn raster_transform(&self) -> Scale {
        let divisor = self.device_pixel_ratio * self.viewport.scale;
        Scale::new(self.scale_factor_x / divisor, self.scale_factor_y / divisor)
    }

    pub fn svg_view_box(&self) -> String {
        format!("0 0 {} {}", fmt_num(self.pdf.width), fmt_num(self.pdf.height))
    }

    pub fn pdf_dimensions(&self) -> PdfDimensions {
        self.pdf
    }

    pub fn viewport_dimensions(&self) -> ViewportDimensions {
        self.viewport
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn scale_factors(&self) -> (f32, f32) {
        (self.scale_factor_x, self.scale_factor_y)
    }

    /// Empty `<svg>` root in PDF units, tagged with the capture viewport.
    pub fn create_svg_container(&self) -> SvgElement {
        SvgElement::new("svg")
            .attr("xmlns", SVG_NS)
            .attr("version", "1.1")
            .attr("width", fmt_num(self.pdf.width))
            .attr("height", fmt_num(self.pdf.height))
            .attr("viewBox", self.svg_view_box())
            .attr("data-viewport-width", fmt_num(self.viewport.width))
            .attr("data-viewport-height", fmt_num(self.viewport.height))
            .attr("data-viewport-scale", fmt_num(self.viewport.scale))
            .attr("data-device-pixel-ratio", fmt_num(self.device_pixel_ratio))
    }

    pub fn validate(&self) -> bool {
        let positive = |value: f32| value.is_finite() && value > 0.0;

        if !self.viewport.is_valid() || !self.pdf.is_valid() {
            return false;
        }

        if !positive(self.device_pixel_ratio)
            || !positive(self.scale_factor_x)
            || !positive(self.scale_factor_y)
        {
            return false;
        }

        let probe = self.map_point(Point::new(1.0, 1.0, 0.5));
        probe.pdf_x.is_finite() && probe.pdf_y.is_finite()
    }

    fn map_xy(&self, x: f32, y: f32) -> (f32, f32) {
        let divisor = self.device_pixel_ratio * self.viewport.scale;
        (x / divisor * self.scale_factor_x, y / divisor * self.scale_factor_y)
    }
}
