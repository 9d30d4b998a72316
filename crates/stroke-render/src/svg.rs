//! Page-sized SVG documents assembled from ink strokes.

use std::io;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use stroke_model::{PdfDimensions, Stroke, Tool, ViewportDimensions};

use crate::mapper::CoordinateMapper;
use crate::renderer::StrokeRenderer;
use crate::{fmt_num, SvgError};

/// Minimal SVG element tree: a name, ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<SvgElement>,
}

impl SvgElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: Vec::new(), children: Vec::new() }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[SvgElement] {
        &self.children
    }

    pub fn push(&mut self, child: SvgElement) {
        self.children.push(child);
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Writes the element and its subtree; childless elements are self-closing.
    pub fn write_to<W: io::Write>(&self, writer: &mut Writer<W>) -> quick_xml::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }

    pub fn to_markup(&self) -> Result<String, SvgError> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer).map_err(serialize_error)?;
        into_string(writer)
    }
}

fn serialize_error(err: quick_xml::Error) -> SvgError {
    SvgError::Serialize(err.to_string())
}

fn write_document<W: io::Write>(writer: &mut Writer<W>, root: &SvgElement) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    root.write_to(writer)
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, SvgError> {
    String::from_utf8(writer.into_inner()).map_err(|err| SvgError::Serialize(err.to_string()))
}

/// Builds one SVG document per page, in PDF point units.
#[derive(Debug, Clone)]
pub struct SvgGenerator {
    mapper: CoordinateMapper,
    root: SvgElement,
}

impl SvgGenerator {
    pub fn new(width: f32, height: f32, viewport: ViewportDimensions) -> Self {
        Self::with_mapper(CoordinateMapper::new(viewport, PdfDimensions::new(width, height)))
    }

    pub fn with_mapper(mapper: CoordinateMapper) -> Self {
        let mut root = mapper.create_svg_container();
        root.push(SvgElement::new("defs"));
        Self { mapper, root }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Root element as left by the last [`generate_svg`](Self::generate_svg).
    pub fn root(&self) -> &SvgElement {
        &self.root
    }

    /// Serializes every non-eraser stroke as a mapped `<path>`. Highlighters
    /// are emitted first so pen ink sits on top of them. Each call starts from
    /// an empty document.
    pub fn generate_svg(&mut self, strokes: &[Stroke]) -> Result<String, SvgError> {
        self.ensure_valid()?;

        let pdf = self.mapper.pdf_dimensions();
        self.root.clear_children();
        self.root.push(SvgElement::new("defs"));
        self.root.push(
            SvgElement::new("rect")
                .attr("x", "0")
                .attr("y", "0")
                .attr("width", fmt_num(pdf.width))
                .attr("height", fmt_num(pdf.height))
                .attr("fill", "transparent"),
        );

        let mut ordered: Vec<&Stroke> = strokes.iter().filter(|stroke| !stroke.is_eraser()).collect();
        ordered.sort_by_key(|stroke| stroke.tool != Tool::Highlighter);

        let mut emitted = 0usize;
        for stroke in ordered {
            if let Some(path) = self.stroke_path(stroke) {
                self.root.push(path);
                emitted += 1;
            }
        }

        log::debug!(
            "generated svg with {emitted} paths from {} strokes ({}x{} pt)",
            strokes.len(),
            pdf.width,
            pdf.height
        );

        let mut writer = Writer::new(Vec::new());
        write_document(&mut writer, &self.root).map_err(serialize_error)?;
        into_string(writer)
    }

    /// Mapped paths for eraser strokes only, drawn black for use inside a
    /// `<mask>`. The raster export erases with destination-out instead.
    pub fn generate_eraser_masks(&self, strokes: &[Stroke]) -> Result<Vec<SvgElement>, SvgError> {
        self.ensure_valid()?;

        Ok(strokes
            .iter()
            .filter(|stroke| stroke.is_eraser())
            .filter_map(|stroke| {
                let path = self.mapped_path_data(stroke)?;
                Some(
                    SvgElement::new("path")
                        .attr("d", path)
                        .attr("stroke", "black")
                        .attr("stroke-width", fmt_num(self.mapper.map_stroke_size(stroke.size)))
                        .attr("stroke-linecap", "round")
                        .attr("stroke-linejoin", "round")
                        .attr("fill", "none"),
                )
            })
            .collect())
    }

    fn stroke_path(&self, stroke: &Stroke) -> Option<SvgElement> {
        let Some(path) = self.mapped_path_data(stroke) else {
            log::debug!("skipping {} stroke with {} points", stroke.tool.as_str(), stroke.points.len());
            return None;
        };

        let mut element = SvgElement::new("path")
            .attr("d", path)
            .attr("stroke", stroke.color.to_hex())
            .attr("stroke-width", fmt_num(self.mapper.map_stroke_size(stroke.size)))
            .attr("stroke-opacity", fmt_num(stroke.opacity))
            .attr("stroke-linecap", "round")
            .attr("stroke-linejoin", "round")
            .attr("fill", "none")
            .attr("data-tool", stroke.tool.as_str());

        if stroke.tool == Tool::Highlighter {
            element.set_attr("style", "mix-blend-mode: multiply");
        }

        Some(element)
    }

    fn mapped_path_data(&self, stroke: &Stroke) -> Option<String> {
        let path = StrokeRenderer::new(stroke).to_vector_path();
        if path.is_empty() {
            return None;
        }
        Some(self.mapper.map_path(&path))
    }

    fn ensure_valid(&self) -> Result<(), SvgError> {
        if self.mapper.validate() {
            return Ok(());
        }

        let pdf = self.mapper.pdf_dimensions();
        let viewport = self.mapper.viewport_dimensions();
        Err(SvgError::InvalidGeometry(format!(
            "page {}x{} pt, viewport {}x{} px at scale {}, device pixel ratio {}",
            pdf.width,
            pdf.height,
            viewport.width,
            viewport.height,
            viewport.scale,
            self.mapper.device_pixel_ratio()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stroke_model::{Color, Point};

    fn generator() -> SvgGenerator {
        SvgGenerator::with_mapper(CoordinateMapper::with_device_pixel_ratio(
            ViewportDimensions::new(816.0, 1056.0, 1.0),
            PdfDimensions::LETTER,
            1.0,
        ))
    }

    fn stroke(tool: Tool, color: Color, offset: f32) -> Stroke {
        Stroke::new(
            tool,
            color,
            8.0,
            if tool == Tool::Highlighter { 0.4 } else { 1.0 },
            vec![
                Point::new(offset, offset, 0.5),
                Point::new(offset + 40.0, offset, 0.5),
                Point::new(offset + 40.0, offset + 40.0, 0.5),
            ],
        )
    }

    fn paths(generator: &SvgGenerator) -> Vec<&SvgElement> {
        generator.root().children().iter().filter(|child| child.name() == "path").collect()
    }

    #[test]
    fn eraser_strokes_never_become_paths() {
        let mixes = [
            vec![stroke(Tool::Eraser, Color::BLACK, 0.0)],
            vec![stroke(Tool::Pen, Color::RED, 0.0), stroke(Tool::Eraser, Color::BLACK, 4.0)],
            vec![
                stroke(Tool::Eraser, Color::BLACK, 0.0),
                stroke(Tool::Highlighter, Color::YELLOW, 10.0),
                stroke(Tool::Eraser, Color::BLACK, 20.0),
                stroke(Tool::Pen, Color::RED, 30.0),
            ],
        ];

        for strokes in mixes {
            let mut generator = generator();
            let svg = generator.generate_svg(&strokes).unwrap();
            let expected = strokes.iter().filter(|s| !s.is_eraser()).count();

            assert_eq!(paths(&generator).len(), expected);
            assert!(!svg.contains(r#"data-tool="eraser""#));
        }
    }

    #[test]
    fn highlighters_are_emitted_before_pen_ink() {
        let mut generator = generator();
        let strokes = vec![
            stroke(Tool::Pen, Color::RED, 0.0),
            stroke(Tool::Highlighter, Color::YELLOW, 10.0),
            stroke(Tool::Pen, Color::BLACK, 20.0),
        ];

        generator.generate_svg(&strokes).unwrap();
        let tools: Vec<_> = paths(&generator).iter().filter_map(|p| p.get_attr("data-tool")).collect();
        let colors: Vec<_> = paths(&generator).iter().filter_map(|p| p.get_attr("stroke")).collect();

        assert_eq!(tools, vec!["highlighter", "pen", "pen"]);
        assert_eq!(colors, vec!["#ffff00", "#ff0000", "#000000"]);
        assert_eq!(paths(&generator)[0].get_attr("style"), Some("mix-blend-mode: multiply"));
    }

    #[test]
    fn generation_is_idempotent() {
        let mut generator = generator();
        generator.generate_svg(&vec![stroke(Tool::Pen, Color::RED, 0.0); 3]).unwrap();
        let second = generator.generate_svg(&[stroke(Tool::Pen, Color::BLACK, 0.0)]).unwrap();

        assert_eq!(paths(&generator).len(), 1);
        assert!(!second.contains("#ff0000"));
    }

    #[test]
    fn empty_input_still_has_background_and_bounds() {
        let mut generator = generator();
        let svg = generator.generate_svg(&[]).unwrap();

        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"<rect x="0" y="0" width="612" height="792" fill="transparent"/>"#));
        assert!(svg.contains("<defs/>"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn paths_are_in_pdf_units() {
        let mut generator = generator();
        let pen = Stroke::pen(
            Color::BLACK,
            4.0,
            vec![Point::new(0.0, 0.0, 0.5), Point::new(816.0, 1056.0, 0.5)],
        );

        generator.generate_svg(&[pen]).unwrap();
        let path = paths(&generator)[0];

        assert_eq!(path.get_attr("d"), Some("M 0,0 L 612,792"));
        assert_eq!(path.get_attr("stroke-width"), Some("3"));
    }

    #[test]
    fn degenerate_strokes_are_skipped() {
        let mut generator = generator();
        let dot = Stroke::pen(Color::BLACK, 4.0, vec![Point::new(1.0, 1.0, 0.5)]);

        generator.generate_svg(&[dot]).unwrap();
        assert!(paths(&generator).is_empty());
    }

    #[test]
    fn eraser_masks_only_cover_erasers() {
        let generator = generator();
        let strokes = vec![
            stroke(Tool::Pen, Color::RED, 0.0),
            stroke(Tool::Eraser, Color::BLACK, 10.0),
            stroke(Tool::Highlighter, Color::YELLOW, 20.0),
        ];

        let masks = generator.generate_eraser_masks(&strokes).unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].get_attr("stroke"), Some("black"));
        assert_eq!(masks[0].get_attr("stroke-width"), Some("6"));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut generator = SvgGenerator::with_mapper(CoordinateMapper::with_device_pixel_ratio(
            ViewportDimensions::new(816.0, 1056.0, 0.0),
            PdfDimensions::LETTER,
            1.0,
        ));

        assert!(matches!(generator.generate_svg(&[]), Err(SvgError::InvalidGeometry(_))));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let element = SvgElement::new("g").attr("data-note", r#"a<b & "c" > 'd'"#);
        assert_eq!(
            element.to_markup().unwrap(),
            r#"<g data-note="a&lt;b &amp; &quot;c&quot; &gt; &apos;d&apos;"/>"#
        );
    }

    #[test]
    fn nested_elements_close_in_order() {
        let mut group = SvgElement::new("g").attr("id", "ink");
        group.push(SvgElement::new("path").attr("d", "M 0,0 L 1,1"));
        let mut root = SvgElement::new("svg");
        root.push(group);

        assert_eq!(root.to_markup().unwrap(), r#"<svg><g id="ink"><path d="M 0,0 L 1,1"/></g></svg>"#);
    }
}
