//! Export pipeline: rasterize each annotated page, embed the overlay into the
//! source PDF and hand back the serialized document.

mod error;
mod progress;
mod saver;

pub use error::{ExportError, ExportErrorCode};
pub use progress::ExportProgress;
pub use saver::{annotated_file_name, PageSvg, PdfSaver, SavedPdf, PDF_MIME_TYPE};
