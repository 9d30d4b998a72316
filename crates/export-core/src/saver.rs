use pdf_engine::{PdfModifier, PdfPage};
use serde::Serialize;
use std::path::Path;
use stroke_model::{AnnotationSet, ExportSettings, PdfDimensions, Stroke, ViewportDimensions};
use stroke_render::{
    device_pixel_ratio_from_env, BaseRenderer, CoordinateMapper, PixmapSurface, RenderOptions, Scale,
    StrokeRenderer, SvgGenerator,
};

use crate::error::{ExportError, ExportErrorCode};
use crate::progress::ExportProgress;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// The finished document, ready to be written or offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPdf {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// One page rendered through the vector path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSvg {
    pub page: u32,
    pub width: f32,
    pub height: f32,
    pub svg: String,
}

/// `report.pdf` becomes `report<suffix>.pdf`.
pub fn annotated_file_name(file_name: &str, suffix: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document");
    format!("{stem}{suffix}.pdf")
}

/// Drives a whole export. Builds a fresh [`PdfModifier`] per call, so one
/// saver can be reused across documents.
#[derive(Debug, Clone, Default)]
pub struct PdfSaver {
    settings: ExportSettings,
}

impl PdfSaver {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Rasterizes every annotated page into a transparent overlay and draws
    /// it over that page. Nothing is returned unless every page succeeds.
    pub fn save(
        &self,
        source: &[u8],
        annotations: &AnnotationSet,
        viewport: Option<ViewportDimensions>,
        file_name: &str,
        mut progress: Option<&mut dyn FnMut(ExportProgress)>,
    ) -> Result<SavedPdf, ExportError> {
        let viewport = self.prepare(annotations, viewport)?;

        let pages: Vec<(u32, &[Stroke])> = annotations.non_empty_pages().collect();
        let total = pages.len();
        let mut report = |current: usize, status: String| {
            if let Some(callback) = progress.as_mut() {
                callback(ExportProgress::new(current, total, status));
            }
        };

        log::info!(
            "exporting {} strokes on {total} pages of {file_name}",
            annotations.stroke_count()
        );

        report(0, "Loading PDF...".to_owned());
        let mut modifier = PdfModifier::new();
        modifier.load_pdf(source)?;

        for (done, (number, strokes)) in pages.into_iter().enumerate() {
            let page = modifier.get_page(number)?;
            let png = self.rasterize_page(&page, strokes, viewport)?;

            let image = modifier
                .embed_png(&png)
                .map_err(|err| ExportError::pdf_stage(ExportErrorCode::PdfModificationFailed, err))?;
            modifier
                .draw_image(&page, &image, page.full_page(), 1.0)
                .map_err(|err| ExportError::pdf_stage(ExportErrorCode::PdfModificationFailed, err))?;

            log::debug!("page {number}: {} strokes, {}x{} overlay", strokes.len(), image.width, image.height);
            report(done + 1, format!("Processed page {number}"));
        }

        report(total, "Finalizing PDF...".to_owned());
        let bytes = modifier
            .save()
            .map_err(|err| ExportError::pdf_stage(ExportErrorCode::PdfModificationFailed, err))?;

        let file_name = annotated_file_name(file_name, &self.settings.output_suffix);
        log::info!("export finished: {file_name} ({} bytes)", bytes.len());

        Ok(SavedPdf { bytes, file_name, mime_type: PDF_MIME_TYPE })
    }

    /// Vector alternative to [`save`](Self::save): one SVG document per
    /// annotated page, sized to that page in PDF points.
    pub fn export_svg_pages(
        &self,
        source: &[u8],
        annotations: &AnnotationSet,
        viewport: Option<ViewportDimensions>,
    ) -> Result<Vec<PageSvg>, ExportError> {
        let viewport = self.prepare(annotations, viewport)?;

        let mut modifier = PdfModifier::new();
        modifier.load_pdf(source)?;

        annotations
            .non_empty_pages()
            .map(|(number, strokes)| -> Result<PageSvg, ExportError> {
                let page = modifier.get_page(number)?;
                let mut generator = SvgGenerator::with_mapper(self.mapper(viewport, page.dimensions));
                let svg = generator.generate_svg(strokes)?;

                Ok(PageSvg {
                    page: number,
                    width: page.dimensions.width,
                    height: page.dimensions.height,
                    svg,
                })
            })
            .collect()
    }

    fn prepare(
        &self,
        annotations: &AnnotationSet,
        viewport: Option<ViewportDimensions>,
    ) -> Result<ViewportDimensions, ExportError> {
        let viewport = viewport.ok_or_else(|| {
            ExportError::new(
                ExportErrorCode::InitializationFailed,
                "viewport dimensions are required to map annotations",
            )
        })?;

        let raster_scale = self.settings.raster_scale;
        if !(raster_scale.is_finite() && raster_scale > 0.0) {
            return Err(ExportError::new(
                ExportErrorCode::InitializationFailed,
                format!("raster scale must be positive, got {raster_scale}"),
            ));
        }

        annotations.validate()?;
        Ok(viewport)
    }

    fn mapper(&self, viewport: ViewportDimensions, pdf: PdfDimensions) -> CoordinateMapper {
        let ratio = self.settings.device_pixel_ratio.unwrap_or_else(device_pixel_ratio_from_env);
        CoordinateMapper::with_device_pixel_ratio(viewport, pdf, ratio)
            .with_stroke_size_mapping(self.settings.stroke_size_mapping)
    }

    fn rasterize_page(
        &self,
        page: &PdfPage,
        strokes: &[Stroke],
        viewport: ViewportDimensions,
    ) -> Result<Vec<u8>, ExportError> {
        let mapper = self.mapper(viewport, page.dimensions);
        if !mapper.validate() {
            return Err(ExportError::new(
                ExportErrorCode::RenderingError,
                format!("cannot map annotations onto page {}", page.number),
            )
            .with_details(serde_json::json!({
                "page": page.number,
                "viewport": [viewport.width, viewport.height, viewport.scale],
                "pdf": [page.dimensions.width, page.dimensions.height],
                "device_pixel_ratio": mapper.device_pixel_ratio(),
            })));
        }

        let (width, height) = self.raster_size(page)?;
        let mut surface = PixmapSurface::new(width, height)?;

        // Pixel rounding means the achieved density can differ slightly per axis.
        let density = Scale::new(
            width as f32 / page.dimensions.width,
            height as f32 / page.dimensions.height,
        );
        // Widths follow the configured stroke size mapping, not the per-axis stretch.
        let line_width_scale = mapper.map_stroke_size(1.0) * (density.x * density.y).sqrt();
        let options = RenderOptions {
            smoothing: self.settings.smoothing,
            pressure_sensitivity: self.settings.pressure_sensitivity,
            line_width_scale: Some(line_width_scale),
            ..RenderOptions::for_export(mapper.raster_transform().then(density))
        };

        for stroke in strokes {
            StrokeRenderer::new(stroke).render(&mut surface, &options);
        }

        Ok(surface.encode_png()?)
    }

    fn raster_size(&self, page: &PdfPage) -> Result<(u32, u32), ExportError> {
        let scale = self.settings.raster_scale;
        let width = (page.dimensions.width * scale).ceil().max(1.0) as u64;
        let height = (page.dimensions.height * scale).ceil().max(1.0) as u64;
        let pixels = width.saturating_mul(height);

        if pixels > self.settings.max_raster_pixels || width > u32::MAX as u64 || height > u32::MAX as u64 {
            return Err(ExportError::new(
                ExportErrorCode::MemoryError,
                format!("page {} overlay of {width}x{height} pixels exceeds the raster budget", page.number),
            )
            .with_details(serde_json::json!({
                "page": page.number,
                "pixels": pixels,
                "max_raster_pixels": self.settings.max_raster_pixels,
            })));
        }

        Ok((width as u32, height as u32))
    }
}
