use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use export_core::{ExportProgress, PdfSaver};
use pdf_engine::{OpenSource, PdfModifier};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;
use stroke_model::{AnnotationSet, ExportSettings, ViewportDimensions};

#[derive(Debug, Parser)]
#[command(name = "inkpaper")]
#[command(about = "Export freehand ink annotations into PDF files")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Draw annotations onto the PDF and write the annotated copy.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        capture: CaptureArgs,
        /// Raster pixels per PDF point for the overlay.
        #[arg(long)]
        raster_scale: Option<f32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write one page's annotations as an SVG document in PDF units.
    Svg {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        capture: CaptureArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Inspect persisted export settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    /// Print the effective settings as JSON.
    Show,
    /// Print the settings file location.
    Path,
}

/// How the strokes were captured on screen.
#[derive(Debug, Args)]
struct CaptureArgs {
    /// JSON object mapping page numbers to stroke lists.
    #[arg(long, value_name = "JSON")]
    annotations: PathBuf,
    #[arg(long)]
    viewport_width: f32,
    #[arg(long)]
    viewport_height: f32,
    /// Zoom factor the page was displayed at.
    #[arg(long, default_value_t = 1.0)]
    scale: f32,
    #[arg(long)]
    device_pixel_ratio: Option<f32>,
}

impl CaptureArgs {
    fn viewport(&self) -> ViewportDimensions {
        ViewportDimensions::new(self.viewport_width, self.viewport_height, self.scale)
    }

    fn load_annotations(&self) -> Result<AnnotationSet> {
        let bytes = fs::read(&self.annotations).with_context(|| {
            format!("failed to read annotations from {}", self.annotations.display())
        })?;
        serde_json::from_slice(&bytes).with_context(|| {
            format!("failed to parse annotations in {}", self.annotations.display())
        })
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    number: u32,
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Export { file, capture, raster_scale, output } => {
            run_export(&file, &capture, raster_scale, output.as_deref())
        }
        Commands::Svg { file, capture, page, output } => {
            run_svg(&file, &capture, page, output.as_deref())
        }
        Commands::Settings { action } => run_settings(action),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut modifier = PdfModifier::new();
    modifier.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = modifier.page_count()?;
    let pages = (1..=page_count)
        .map(|number| -> Result<PageOutput> {
            let page = modifier.get_page(number)?;
            Ok(PageOutput { number, width: page.dimensions.width, height: page.dimensions.height })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_export(
    file: &Path,
    capture: &CaptureArgs,
    raster_scale: Option<f32>,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut settings = stored_settings()?;
    if let Some(ratio) = capture.device_pixel_ratio {
        settings.device_pixel_ratio = Some(ratio);
    }
    if let Some(scale) = raster_scale {
        settings.raster_scale = scale;
    }

    let annotations = capture.load_annotations()?;
    let source = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file.file_name().and_then(|name| name.to_str()).unwrap_or("document.pdf");

    let mut report = |progress: ExportProgress| {
        log::info!("[{}/{}] {}", progress.current_page, progress.total_pages, progress.status);
    };

    let saved = PdfSaver::new(settings)
        .save(&source, &annotations, Some(capture.viewport()), file_name, Some(&mut report))
        .context("export failed")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| file.with_file_name(&saved.file_name));
    write_output(&output, &saved.bytes)?;
    println!("{}", output.display());

    Ok(())
}

fn run_svg(file: &Path, capture: &CaptureArgs, page: u32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut settings = stored_settings()?;
    if let Some(ratio) = capture.device_pixel_ratio {
        settings.device_pixel_ratio = Some(ratio);
    }

    let strokes = capture.load_annotations()?.strokes(page).to_vec();
    if strokes.is_empty() {
        anyhow::bail!("page {page} has no annotations");
    }
    let annotations: AnnotationSet = [(page, strokes)].into_iter().collect();

    let source = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let pages = PdfSaver::new(settings)
        .export_svg_pages(&source, &annotations, Some(capture.viewport()))
        .context("SVG export failed")?;
    let svg = pages.into_iter().next().context("no SVG was produced")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_svg_output(file, page));
    write_output(&output, svg.svg.as_bytes())?;
    println!("{}", output.display());

    Ok(())
}

fn run_settings(action: SettingsAction) -> Result<()> {
    let storage = Storage::from_env_or_default()?;

    match action {
        SettingsAction::Show => {
            let settings = storage.load_settings().context("failed to load settings")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Path => println!("{}", storage.settings_path().display()),
    }

    Ok(())
}

fn stored_settings() -> Result<ExportSettings> {
    let storage = Storage::from_env_or_default()?;
    storage.load_settings().context("failed to load settings")
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_svg_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("annotations");

    file.with_file_name(format!("{stem}-page-{page}.svg"))
}
