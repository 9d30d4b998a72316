use serde::{Deserialize, Serialize};

/// How a linear stroke width is carried from canvas pixels into PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeSizeMapping {
    /// Horizontal scale factor only. Skews widths when the viewport and the
    /// page have different aspect ratios.
    #[default]
    XAxis,
    /// Geometric mean of the horizontal and vertical scale factors.
    GeometricMean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// `None` reads the ratio from the environment.
    pub device_pixel_ratio: Option<f32>,
    pub smoothing: bool,
    pub pressure_sensitivity: bool,
    /// Raster pixels per PDF point for the embedded overlay.
    pub raster_scale: f32,
    pub max_raster_pixels: u64,
    pub stroke_size_mapping: StrokeSizeMapping,
    pub output_suffix: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            device_pixel_ratio: None,
            smoothing: true,
            pressure_sensitivity: true,
            raster_scale: 1.0,
            max_raster_pixels: 64_000_000,
            stroke_size_mapping: StrokeSizeMapping::XAxis,
            output_suffix: "_annotated".to_owned(),
        }
    }
}
