//! Drawing targets for stroke rendering.

use std::ops::{Deref, DerefMut};

use stroke_model::{Color, Tool};
use tiny_skia::{BlendMode, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Transform};

use crate::RenderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub const IDENTITY: Scale = Scale { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn uniform(factor: f32) -> Self {
        Self { x: factor, y: factor }
    }

    pub fn then(self, other: Scale) -> Scale {
        Scale { x: self.x * other.x, y: self.y * other.y }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// How new ink combines with what is already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    Multiply,
    /// Clears existing pixels wherever the new shape has alpha.
    DestinationOut,
}

impl Composite {
    pub fn for_tool(tool: Tool) -> Self {
        match tool {
            Tool::Pen => Self::SourceOver,
            Tool::Highlighter => Self::Multiply,
            Tool::Eraser => Self::DestinationOut,
        }
    }

    fn blend_mode(self) -> BlendMode {
        match self {
            Self::SourceOver => BlendMode::SourceOver,
            Self::Multiply => BlendMode::Multiply,
            Self::DestinationOut => BlendMode::DestinationOut,
        }
    }
}

/// Canvas-style immediate drawing target. Coordinates are in canvas pixels
/// and pass through the current transform.
pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    fn set_transform(&mut self, scale: Scale);
    fn set_stroke_color(&mut self, color: Color);
    fn set_global_alpha(&mut self, alpha: f32);
    fn set_composite(&mut self, composite: Composite);
    fn set_line_width(&mut self, width: f32);
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32));
    fn stroke_quad(&mut self, from: (f32, f32), control: (f32, f32), to: (f32, f32));
}

/// Saves the surface state on creation and restores it on drop, so every
/// exit path of a render leaves the surface as it found it.
pub struct SavedState<'a, S: Surface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: Surface + ?Sized> SavedState<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        surface.save();
        Self { surface }
    }
}

impl<S: Surface + ?Sized> Deref for SavedState<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: Surface + ?Sized> DerefMut for SavedState<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: Surface + ?Sized> Drop for SavedState<'_, S> {
    fn drop(&mut self) {
        self.surface.restore();
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawState {
    scale: Scale,
    color: Color,
    alpha: f32,
    composite: Composite,
    line_width: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            scale: Scale::IDENTITY,
            color: Color::BLACK,
            alpha: 1.0,
            composite: Composite::SourceOver,
            line_width: 1.0,
        }
    }
}

/// Transparent raster surface backed by a tiny-skia pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(RenderError::SurfaceAllocation { width, height })?;

        Ok(Self { pixmap, state: DrawState::default(), stack: Vec::new() })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Alpha of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixmap.pixel(x, y).map(|pixel| pixel.alpha())
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|pixel| pixel.alpha() == 0)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        self.pixmap.encode_png().map_err(|err| RenderError::Encode(err.to_string()))
    }

    fn stroke_path(&mut self, builder: PathBuilder) {
        let Some(path) = builder.finish() else {
            return;
        };

        let state = self.state;
        let alpha = (state.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;

        let mut paint = Paint::default();
        paint.set_color_rgba8(state.color.r, state.color.g, state.color.b, alpha);
        paint.anti_alias = true;
        paint.blend_mode = state.composite.blend_mode();

        let stroke = tiny_skia::Stroke {
            width: state.line_width.max(0.0),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..tiny_skia::Stroke::default()
        };

        let transform = Transform::from_scale(state.scale.x, state.scale.y);
        self.pixmap.stroke_path(&path, &paint, &stroke, transform, None);
    }
}

impl Surface for PixmapSurface {
    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn set_transform(&mut self, scale: Scale) {
        self.state.scale = scale;
    }

    fn set_stroke_color(&mut self, color: Color) {
        self.state.color = color;
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha;
    }

    fn set_composite(&mut self, composite: Composite) {
        self.state.composite = composite;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state.line_width = width;
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32)) {
        let mut builder = PathBuilder::new();
        builder.move_to(from.0, from.1);
        builder.line_to(to.0, to.1);
        self.stroke_path(builder);
    }

    fn stroke_quad(&mut self, from: (f32, f32), control: (f32, f32), to: (f32, f32)) {
        let mut builder = PathBuilder::new();
        builder.move_to(from.0, from.1);
        builder.quad_to(control.0, control.1, to.0, to.1);
        self.stroke_path(builder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_surface_fails_allocation() {
        assert!(matches!(
            PixmapSurface::new(0, 10),
            Err(RenderError::SurfaceAllocation { width: 0, height: 10 })
        ));
    }

    #[test]
    fn saved_state_restores_on_drop() {
        let mut surface = PixmapSurface::new(4, 4).unwrap();
        surface.set_line_width(3.0);
        {
            let mut saved = SavedState::new(&mut surface);
            saved.set_line_width(9.0);
            saved.set_composite(Composite::Multiply);
        }

        assert_eq!(surface.state.line_width, 3.0);
        assert_eq!(surface.state.composite, Composite::SourceOver);
        assert!(surface.stack.is_empty());
    }

    #[test]
    fn destination_out_erases_ink() {
        let mut surface = PixmapSurface::new(20, 20).unwrap();
        surface.set_line_width(6.0);
        surface.stroke_line((0.0, 10.0), (20.0, 10.0));
        assert!(surface.alpha_at(10, 10).unwrap() > 0);

        surface.set_composite(Composite::DestinationOut);
        surface.stroke_line((10.0, 0.0), (10.0, 20.0));
        assert_eq!(surface.alpha_at(10, 10), Some(0));
        assert!(surface.alpha_at(2, 10).unwrap() > 0);
    }

    #[test]
    fn transform_scales_geometry() {
        let mut surface = PixmapSurface::new(40, 40).unwrap();
        surface.set_transform(Scale::uniform(2.0));
        surface.set_line_width(2.0);
        surface.stroke_line((5.0, 15.0), (15.0, 15.0));

        assert!(surface.alpha_at(20, 30).unwrap() > 0);
        assert_eq!(surface.alpha_at(20, 15), Some(0));
    }

    #[test]
    fn png_encoding_produces_signature() {
        let surface = PixmapSurface::new(8, 8).unwrap();
        let png = surface.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(surface.is_blank());
    }
}
