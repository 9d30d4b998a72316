use pdf_engine::PdfEngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use stroke_model::ModelError;
use stroke_render::{RenderError, SvgError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportErrorCode {
    InitializationFailed,
    InvalidAnnotations,
    SvgGenerationFailed,
    PdfModificationFailed,
    MemoryError,
    InvalidPdf,
    RenderingError,
    UnknownError,
}

impl ExportErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitializationFailed => "INITIALIZATION_FAILED",
            Self::InvalidAnnotations => "INVALID_ANNOTATIONS",
            Self::SvgGenerationFailed => "SVG_GENERATION_FAILED",
            Self::PdfModificationFailed => "PDF_MODIFICATION_FAILED",
            Self::MemoryError => "MEMORY_ERROR",
            Self::InvalidPdf => "INVALID_PDF",
            Self::RenderingError => "RENDERING_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Message suitable for showing to the person who asked for the export.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InitializationFailed => "The export could not be started. Reload the document and try again.",
            Self::InvalidAnnotations => "Some annotations are damaged and could not be exported.",
            Self::SvgGenerationFailed => "The annotations could not be converted for export.",
            Self::PdfModificationFailed => "The annotations could not be added to the PDF.",
            Self::MemoryError => "The document is too large to export with the current settings.",
            Self::InvalidPdf => "The PDF file could not be read.",
            Self::RenderingError => "The annotations could not be drawn.",
            Self::UnknownError => "An unexpected error occurred during export.",
        }
    }
}

impl fmt::Display for ExportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by every export entry point. Carries a stable code for
/// callers, a technical message and optional structured context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ExportError {
    pub code: ExportErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ExportError {
    pub fn new(code: ExportErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }

    /// Wraps a PDF engine failure raised while `code`'s stage was running. An
    /// engine that was never loaded keeps reporting an initialization failure.
    pub(crate) fn pdf_stage(code: ExportErrorCode, err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::NotInitialized => err.into(),
            other => Self::new(code, other.to_string()),
        }
    }
}

impl From<PdfEngineError> for ExportError {
    fn from(err: PdfEngineError) -> Self {
        let code = match &err {
            PdfEngineError::NotInitialized
            | PdfEngineError::LoadFailed(_)
            | PdfEngineError::EncryptedUnsupported => ExportErrorCode::InitializationFailed,
            PdfEngineError::PageNotFound { .. } | PdfEngineError::MalformedPage { .. } => {
                ExportErrorCode::InvalidPdf
            }
            PdfEngineError::AlreadyLoaded | PdfEngineError::Io(_) => ExportErrorCode::UnknownError,
            PdfEngineError::Pdf(_) | PdfEngineError::Image(_) => ExportErrorCode::PdfModificationFailed,
        };

        let details = match &err {
            PdfEngineError::PageNotFound { page, page_count } => {
                Some(serde_json::json!({ "page": page, "page_count": page_count }))
            }
            _ => None,
        };

        Self { code, message: err.to_string(), details }
    }
}

impl From<ModelError> for ExportError {
    fn from(err: ModelError) -> Self {
        let details = match &err {
            ModelError::InvalidAnnotation { page, index, .. } => {
                Some(serde_json::json!({ "page": page, "stroke": index }))
            }
            _ => None,
        };

        Self { code: ExportErrorCode::InvalidAnnotations, message: err.to_string(), details }
    }
}

impl From<RenderError> for ExportError {
    fn from(err: RenderError) -> Self {
        let code = match err {
            RenderError::SurfaceAllocation { .. } => ExportErrorCode::MemoryError,
            RenderError::Encode(_) => ExportErrorCode::RenderingError,
        };
        Self::new(code, err.to_string())
    }
}

impl From<SvgError> for ExportError {
    fn from(err: SvgError) -> Self {
        Self::new(ExportErrorCode::SvgGenerationFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_snake_case() {
        let json = serde_json::to_string(&ExportErrorCode::PdfModificationFailed).unwrap();
        assert_eq!(json, "\"PDF_MODIFICATION_FAILED\"");
        assert_eq!(ExportErrorCode::MemoryError.to_string(), "MEMORY_ERROR");
    }

    #[test]
    fn page_lookup_failures_are_invalid_pdf_with_details() {
        let err = ExportError::from(PdfEngineError::PageNotFound { page: 4, page_count: 2 });

        assert_eq!(err.code, ExportErrorCode::InvalidPdf);
        assert_eq!(err.details, Some(serde_json::json!({ "page": 4, "page_count": 2 })));
    }

    #[test]
    fn load_failures_are_initialization_failures() {
        let unreadable = ExportError::from(PdfEngineError::LoadFailed("no trailer".to_owned()));
        let encrypted = ExportError::from(PdfEngineError::EncryptedUnsupported);
        let malformed =
            ExportError::from(PdfEngineError::MalformedPage { page: 2, reason: "no MediaBox".to_owned() });

        assert_eq!(unreadable.code, ExportErrorCode::InitializationFailed);
        assert_eq!(encrypted.code, ExportErrorCode::InitializationFailed);
        assert_eq!(malformed.code, ExportErrorCode::InvalidPdf);
    }

    #[test]
    fn stage_wrapping_keeps_initialization_failures() {
        let wrapped =
            ExportError::pdf_stage(ExportErrorCode::PdfModificationFailed, PdfEngineError::NotInitialized);
        assert_eq!(wrapped.code, ExportErrorCode::InitializationFailed);

        let wrapped = ExportError::pdf_stage(
            ExportErrorCode::PdfModificationFailed,
            PdfEngineError::MalformedPage { page: 1, reason: "bad".to_owned() },
        );
        assert_eq!(wrapped.code, ExportErrorCode::PdfModificationFailed);
    }

    #[test]
    fn surface_allocation_is_a_memory_error() {
        let err = ExportError::from(RenderError::SurfaceAllocation { width: 0, height: 10 });
        assert_eq!(err.code, ExportErrorCode::MemoryError);
        assert!(!err.user_message().is_empty());
    }

    #[test]
    fn details_are_omitted_when_absent() {
        let err = ExportError::new(ExportErrorCode::UnknownError, "boom");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json, serde_json::json!({ "code": "UNKNOWN_ERROR", "message": "boom" }));
    }
}
