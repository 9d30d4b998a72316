//! Ink annotation data model shared by the renderer, the PDF engine and the
//! export pipeline.

mod color;
mod geometry;
mod settings;
mod stroke;

pub use color::Color;
pub use geometry::{Bounds, PdfDimensions, ViewportDimensions};
pub use settings::{ExportSettings, StrokeSizeMapping};
pub use stroke::{MappedPoint, Point, Stroke, Tool};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid color {0:?}, expected #rrggbb or #rgb")]
    InvalidColor(String),
    #[error("invalid stroke: {0}")]
    InvalidStroke(String),
    #[error("page numbers are 1-based, got page 0")]
    InvalidPageNumber,
    #[error("page {page}, stroke {index}: {source}")]
    InvalidAnnotation {
        page: u32,
        index: usize,
        #[source]
        source: Box<ModelError>,
    },
}

/// Strokes keyed by 1-based page number. Iteration is ascending by page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet {
    pages: BTreeMap<u32, Vec<Stroke>>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: u32, strokes: Vec<Stroke>) {
        self.pages.insert(page, strokes);
    }

    pub fn push(&mut self, page: u32, stroke: Stroke) {
        self.pages.entry(page).or_default().push(stroke);
    }

    pub fn strokes(&self, page: u32) -> &[Stroke] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Stroke])> {
        self.pages.iter().map(|(page, strokes)| (*page, strokes.as_slice()))
    }

    /// Pages carrying at least one stroke, ascending.
    pub fn non_empty_pages(&self) -> impl Iterator<Item = (u32, &[Stroke])> {
        self.iter().filter(|(_, strokes)| !strokes.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.pages.values().all(Vec::is_empty)
    }

    pub fn stroke_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (page, strokes) in self.iter() {
            if page == 0 {
                return Err(ModelError::InvalidPageNumber);
            }

            for (index, stroke) in strokes.iter().enumerate() {
                stroke.validate().map_err(|source| ModelError::InvalidAnnotation {
                    page,
                    index,
                    source: Box::new(source),
                })?;
            }
        }

        Ok(())
    }
}

impl FromIterator<(u32, Vec<Stroke>)> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = (u32, Vec<Stroke>)>>(iter: T) -> Self {
        Self { pages: iter.into_iter().collect() }
    }
}
