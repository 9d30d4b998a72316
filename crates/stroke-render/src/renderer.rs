//! Freehand stroke rendering to raster surfaces and SVG path data.

use std::fmt::Write as _;

use stroke_model::{Bounds, Point, Stroke};

use crate::surface::{Composite, SavedState, Scale, Surface};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub scale: Scale,
    pub smoothing: bool,
    /// Export always takes the smoothed path; the polyline is a preview fallback.
    pub for_export: bool,
    pub pressure_sensitivity: bool,
    /// Uniform width factor for surfaces whose `scale` is not uniform. When
    /// set, points are mapped by `scale` before drawing and the surface keeps
    /// an identity transform, so widths are not stretched per axis.
    pub line_width_scale: Option<f32>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: Scale::IDENTITY,
            smoothing: true,
            for_export: false,
            pressure_sensitivity: true,
            line_width_scale: None,
        }
    }
}

impl RenderOptions {
    pub fn for_export(scale: Scale) -> Self {
        Self { scale, for_export: true, ..Self::default() }
    }

    fn smoothed(&self) -> bool {
        self.smoothing || self.for_export
    }

    /// Surface transform plus the mapping applied to points and widths before
    /// they reach the surface.
    fn projection(&self) -> (Scale, Projection) {
        match self.line_width_scale {
            Some(width) => (Scale::IDENTITY, Projection { points: self.scale, width }),
            None => (self.scale, Projection { points: Scale::IDENTITY, width: 1.0 }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Projection {
    points: Scale,
    width: f32,
}

impl Projection {
    fn xy(&self, point: &Point) -> (f32, f32) {
        (point.x * self.points.x, point.y * self.points.y)
    }
}

/// Width multiplier for a pressure sample: `[0, 1]` maps to `[0.5, 1.5]`.
pub fn pressure_width(base_width: f32, pressure: f32, sensitive: bool) -> f32 {
    if !sensitive {
        return base_width;
    }
    base_width * (0.5 + pressure.clamp(0.0, 1.0))
}

pub trait BaseRenderer {
    /// Area the rendered ink can touch, in canvas pixels.
    fn bounds(&self) -> Bounds;

    fn render(&self, surface: &mut dyn Surface, options: &RenderOptions);
}

#[derive(Debug, Clone, Copy)]
pub struct StrokeRenderer<'a> {
    stroke: &'a Stroke,
}

impl<'a> StrokeRenderer<'a> {
    pub fn new(stroke: &'a Stroke) -> Self {
        Self { stroke }
    }

    pub fn stroke(&self) -> &'a Stroke {
        self.stroke
    }

    /// SVG path data in canvas pixels, traced with the same midpoint
    /// quadratic technique as [`BaseRenderer::render`].
    pub fn to_vector_path(&self) -> String {
        let points = &self.stroke.points;
        let mut path = String::new();

        let [first, .., last] = points.as_slice() else {
            return path;
        };

        let _ = write!(path, "M {},{}", first.x, first.y);
        for (control, end) in smoothed_segments(points) {
            let _ = write!(path, " Q {},{} {},{}", control.x, control.y, end.x, end.y);
        }
        let _ = write!(path, " L {},{}", last.x, last.y);

        path
    }

    fn draw_smoothed(&self, surface: &mut dyn Surface, options: &RenderOptions, projection: Projection) {
        let points = &self.stroke.points;
        let mut current = points[0];

        for (control, end) in smoothed_segments(points) {
            surface.set_line_width(self.width_at(&control, options, projection));
            surface.stroke_quad(projection.xy(&current), projection.xy(&control), projection.xy(&end));
            current = end;
        }

        let last = points[points.len() - 1];
        surface.set_line_width(self.width_at(&last, options, projection));
        surface.stroke_line(projection.xy(&current), projection.xy(&last));
    }

    fn draw_polyline(&self, surface: &mut dyn Surface, options: &RenderOptions, projection: Projection) {
        for pair in self.stroke.points.windows(2) {
            surface.set_line_width(self.width_at(&pair[1], options, projection));
            surface.stroke_line(projection.xy(&pair[0]), projection.xy(&pair[1]));
        }
    }

    fn width_at(&self, point: &Point, options: &RenderOptions, projection: Projection) -> f32 {
        pressure_width(self.stroke.size, point.pressure, options.pressure_sensitivity) * projection.width
    }
}

impl BaseRenderer for StrokeRenderer<'_> {
    fn bounds(&self) -> Bounds {
        let points = &self.stroke.points;
        let Some(first) = points.first() else {
            return Bounds::default();
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &points[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        let pad = self.stroke.size / 2.0;
        Bounds::new(min_x - pad, min_y - pad, max_x - min_x + 2.0 * pad, max_y - min_y + 2.0 * pad)
    }

    fn render(&self, surface: &mut dyn Surface, options: &RenderOptions) {
        if self.stroke.is_degenerate() {
            return;
        }

        let (transform, projection) = options.projection();
        let mut surface = SavedState::new(surface);
        surface.set_transform(transform);
        surface.set_stroke_color(self.stroke.color);
        surface.set_global_alpha(self.stroke.opacity);
        surface.set_composite(Composite::for_tool(self.stroke.tool));

        if options.smoothed() {
            self.draw_smoothed(&mut *surface, options, projection);
        } else {
            self.draw_polyline(&mut *surface, options, projection);
        }
    }
}

/// `(control, end)` pairs: each interior point is a control point and each
/// curve ends halfway to the next sample. The tail from the last midpoint to
/// the final point is left to the caller.
fn smoothed_segments(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let after_first = points.get(1..).unwrap_or_default();
    after_first.windows(2).map(|pair| (pair[0], pair[0].midpoint(&pair[1])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixmapSurface;
    use stroke_model::{Color, Tool};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Save,
        Restore,
        Transform(Scale),
        Color(Color),
        Alpha(f32),
        Composite(Composite),
        LineWidth(f32),
        Line((f32, f32), (f32, f32)),
        Quad((f32, f32), (f32, f32), (f32, f32)),
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<Call>,
    }

    impl Surface for RecordingSurface {
        fn save(&mut self) {
            self.calls.push(Call::Save);
        }
        fn restore(&mut self) {
            self.calls.push(Call::Restore);
        }
        fn set_transform(&mut self, scale: Scale) {
            self.calls.push(Call::Transform(scale));
        }
        fn set_stroke_color(&mut self, color: Color) {
            self.calls.push(Call::Color(color));
        }
        fn set_global_alpha(&mut self, alpha: f32) {
            self.calls.push(Call::Alpha(alpha));
        }
        fn set_composite(&mut self, composite: Composite) {
            self.calls.push(Call::Composite(composite));
        }
        fn set_line_width(&mut self, width: f32) {
            self.calls.push(Call::LineWidth(width));
        }
        fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32)) {
            self.calls.push(Call::Line(from, to));
        }
        fn stroke_quad(&mut self, from: (f32, f32), control: (f32, f32), to: (f32, f32)) {
            self.calls.push(Call::Quad(from, control, to));
        }
    }

    fn stroke(tool: Tool, points: &[(f32, f32, f32)]) -> Stroke {
        Stroke::new(
            tool,
            Color::RED,
            4.0,
            0.8,
            points.iter().map(|(x, y, p)| Point::new(*x, *y, *p)).collect(),
        )
    }

    #[test]
    fn degenerate_strokes_draw_nothing() {
        for points in [&[][..], &[(5.0, 5.0, 0.5)][..]] {
            let stroke = stroke(Tool::Pen, points);
            let renderer = StrokeRenderer::new(&stroke);
            let mut surface = RecordingSurface::default();

            renderer.render(&mut surface, &RenderOptions::default());

            assert!(surface.calls.is_empty());
            assert_eq!(renderer.to_vector_path(), "");
        }
    }

    #[test]
    fn bounds_are_padded_by_half_the_size() {
        let stroke = stroke(Tool::Pen, &[(10.0, 20.0, 0.5), (50.0, 5.0, 0.5), (30.0, 40.0, 0.5)]);
        let bounds = StrokeRenderer::new(&stroke).bounds();

        assert_eq!(bounds, Bounds::new(8.0, 3.0, 44.0, 39.0));
    }

    #[test]
    fn empty_stroke_bounds_are_zero_at_origin() {
        let stroke = stroke(Tool::Pen, &[]);
        assert_eq!(StrokeRenderer::new(&stroke).bounds(), Bounds::default());
    }

    #[test]
    fn pressure_width_stays_within_half_and_one_and_a_half() {
        for step in 0..=20 {
            let pressure = step as f32 / 20.0;
            let width = pressure_width(8.0, pressure, true);
            assert!((4.0..=12.0).contains(&width), "pressure {pressure} gave {width}");
            assert_eq!(pressure_width(8.0, pressure, false), 8.0);
        }
        assert_eq!(pressure_width(8.0, 0.0, true), 4.0);
        assert_eq!(pressure_width(8.0, 1.0, true), 12.0);
    }

    #[test]
    fn two_point_path_is_a_line() {
        let stroke = stroke(Tool::Pen, &[(0.0, 0.0, 0.5), (10.0, 5.5, 0.5)]);
        assert_eq!(StrokeRenderer::new(&stroke).to_vector_path(), "M 0,0 L 10,5.5");
    }

    #[test]
    fn vector_path_uses_midpoint_quadratics() {
        let stroke = stroke(
            Tool::Pen,
            &[(0.0, 0.0, 0.5), (10.0, 0.0, 0.5), (10.0, 10.0, 0.5), (20.0, 10.0, 0.5)],
        );

        assert_eq!(
            StrokeRenderer::new(&stroke).to_vector_path(),
            "M 0,0 Q 10,0 10,5 Q 10,10 15,10 L 20,10"
        );
    }

    #[test]
    fn smoothed_render_matches_vector_path() {
        let stroke = stroke(Tool::Pen, &[(0.0, 0.0, 0.0), (10.0, 0.0, 1.0), (10.0, 10.0, 0.5)]);
        let mut surface = RecordingSurface::default();

        StrokeRenderer::new(&stroke).render(&mut surface, &RenderOptions::default());

        assert_eq!(
            surface.calls,
            vec![
                Call::Save,
                Call::Transform(Scale::IDENTITY),
                Call::Color(Color::RED),
                Call::Alpha(0.8),
                Call::Composite(Composite::SourceOver),
                Call::LineWidth(6.0),
                Call::Quad((0.0, 0.0), (10.0, 0.0), (10.0, 5.0)),
                Call::LineWidth(4.0),
                Call::Line((10.0, 5.0), (10.0, 10.0)),
                Call::Restore,
            ]
        );
    }

    #[test]
    fn polyline_fallback_when_smoothing_disabled() {
        let stroke = stroke(Tool::Pen, &[(0.0, 0.0, 0.5), (10.0, 0.0, 0.5), (10.0, 10.0, 0.5)]);
        let mut surface = RecordingSurface::default();
        let options = RenderOptions { smoothing: false, ..RenderOptions::default() };

        StrokeRenderer::new(&stroke).render(&mut surface, &options);

        let lines: Vec<_> =
            surface.calls.iter().filter(|call| matches!(call, Call::Line(..))).collect();
        assert_eq!(lines.len(), 2);
        assert!(!surface.calls.iter().any(|call| matches!(call, Call::Quad(..))));
    }

    #[test]
    fn export_ignores_disabled_smoothing() {
        let stroke = stroke(Tool::Pen, &[(0.0, 0.0, 0.5), (10.0, 0.0, 0.5), (10.0, 10.0, 0.5)]);
        let mut surface = RecordingSurface::default();
        let options = RenderOptions { smoothing: false, ..RenderOptions::for_export(Scale::IDENTITY) };

        StrokeRenderer::new(&stroke).render(&mut surface, &options);

        assert!(surface.calls.iter().any(|call| matches!(call, Call::Quad(..))));
    }

    #[test]
    fn uniform_width_scale_maps_points_instead_of_the_surface() {
        let stroke = stroke(Tool::Pen, &[(0.0, 0.0, 0.5), (10.0, 10.0, 0.5)]);
        let mut surface = RecordingSurface::default();
        let options = RenderOptions {
            line_width_scale: Some(2.0),
            ..RenderOptions::for_export(Scale::new(0.5, 1.0))
        };

        StrokeRenderer::new(&stroke).render(&mut surface, &options);

        assert_eq!(surface.calls[1], Call::Transform(Scale::IDENTITY));
        assert!(surface.calls.contains(&Call::LineWidth(8.0)));
        assert!(surface.calls.contains(&Call::Line((0.0, 0.0), (5.0, 10.0))));
    }

    #[test]
    fn composite_follows_tool() {
        for (tool, composite) in [
            (Tool::Pen, Composite::SourceOver),
            (Tool::Highlighter, Composite::Multiply),
            (Tool::Eraser, Composite::DestinationOut),
        ] {
            let stroke = stroke(tool, &[(0.0, 0.0, 0.5), (10.0, 0.0, 0.5)]);
            let mut surface = RecordingSurface::default();
            StrokeRenderer::new(&stroke).render(&mut surface, &RenderOptions::default());

            assert!(surface.calls.contains(&Call::Composite(composite)));
            assert_eq!(surface.calls.last(), Some(&Call::Restore));
        }
    }

    #[test]
    fn renders_ink_onto_pixmap() {
        let stroke = stroke(Tool::Pen, &[(2.0, 10.0, 1.0), (10.0, 10.0, 1.0), (18.0, 10.0, 1.0)]);
        let mut surface = PixmapSurface::new(20, 20).unwrap();

        StrokeRenderer::new(&stroke).render(&mut surface, &RenderOptions::default());

        assert!(surface.alpha_at(10, 10).unwrap() > 0);
        assert_eq!(surface.alpha_at(10, 1), Some(0));
    }
}
