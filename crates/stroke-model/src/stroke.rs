use serde::{Deserialize, Serialize};

use crate::geometry::is_positive;
use crate::{Color, ModelError};

const DEFAULT_PRESSURE: f32 = 0.5;

/// One sampled pointer position in canvas-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_pressure")]
    pub pressure: f32,
}

impl Point {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            pressure: (self.pressure + other.pressure) / 2.0,
        }
    }
}

fn default_pressure() -> f32 {
    DEFAULT_PRESSURE
}

/// A canvas point together with its position in PDF point space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedPoint {
    pub point: Point,
    pub pdf_x: f32,
    pub pdf_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Highlighter,
    Eraser,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pen => "pen",
            Self::Highlighter => "highlighter",
            Self::Eraser => "eraser",
        }
    }
}

/// One continuous freehand gesture. Point order is the drawing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(default)]
    pub tool: Tool,
    #[serde(default)]
    pub color: Color,
    pub size: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub points: Vec<Point>,
}

fn default_opacity() -> f32 {
    1.0
}

impl Stroke {
    pub fn new(tool: Tool, color: Color, size: f32, opacity: f32, points: Vec<Point>) -> Self {
        Self { tool, color, size, opacity, points }
    }

    pub fn pen(color: Color, size: f32, points: Vec<Point>) -> Self {
        Self::new(Tool::Pen, color, size, 1.0, points)
    }

    pub fn is_eraser(&self) -> bool {
        self.tool == Tool::Eraser
    }

    /// Fewer than two points cannot form a visible path.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !is_positive(self.size) {
            return Err(ModelError::InvalidStroke(format!("size must be positive, got {}", self.size)));
        }

        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(ModelError::InvalidStroke(format!(
                "opacity must be within 0..=1, got {}",
                self.opacity
            )));
        }

        for (index, point) in self.points.iter().enumerate() {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(ModelError::InvalidStroke(format!(
                    "point {index} has non-finite coordinates"
                )));
            }
            if !point.pressure.is_finite() || !(0.0..=1.0).contains(&point.pressure) {
                return Err(ModelError::InvalidStroke(format!(
                    "point {index} pressure must be within 0..=1, got {}",
                    point.pressure
                )));
            }
        }

        Ok(())
    }
}
