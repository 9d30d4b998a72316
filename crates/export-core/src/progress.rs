use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportProgress {
    pub current_page: usize,
    pub total_pages: usize,
    pub status: String,
}

impl ExportProgress {
    pub fn new(current_page: usize, total_pages: usize, status: impl Into<String>) -> Self {
        Self { current_page, total_pages, status: status.into() }
    }

    /// Completed fraction in `[0, 1]`. An export with nothing to do is complete.
    pub fn fraction(&self) -> f32 {
        if self.total_pages == 0 {
            return 1.0;
        }
        (self.current_page as f32 / self.total_pages as f32).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_handles_empty_exports() {
        assert_eq!(ExportProgress::new(0, 0, "Finalizing PDF...").fraction(), 1.0);
        assert_eq!(ExportProgress::new(1, 4, "Processed page 2").fraction(), 0.25);
    }
}
