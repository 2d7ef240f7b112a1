//! Page-level text extraction for PDF documents.
//!
//! Returns one string per page, in page order. Extraction never panics; a
//! document that cannot be parsed yields an [`ExtractError`] and the caller
//! decides whether to skip it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Extraction error.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract the text of every page of the PDF held in `bytes`.
///
/// The PDF parser panics on some malformed inputs; those panics are caught
/// and reported as [`ExtractError::Pdf`].
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(panic_info) => {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(ExtractError::Pdf(format!("parser panicked: {}", msg)))
        }
    }
}

/// Read `path` and extract its pages.
pub fn extract_pdf_file(path: &Path) -> Result<Vec<String>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    extract_pdf_pages(&bytes)
}
