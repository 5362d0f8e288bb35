//! Page-layout provider: PDF bytes to positioned words.
//!
//! ```text
//! bytes -> LopdfBackend -> content ops -> TextSpan[] -> Word[] -> PageLayout
//!          parser::backend  parser::spans               words
//! ```
//!
//! Only the text layer is read. Scanned pages without text come back as
//! layouts with no words. [`render`] draws a layout back onto a PNG.

use log::debug;
use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};
use pdfse_core::word::PageLayout;

pub mod cleanup;
pub mod parser;
pub mod render;
pub mod words;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page {index} not found (document has {count} pages)")]
    PageNotFound { index: usize, count: usize },
    #[error("Render error: {0}")]
    Render(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the layout of one page (0-based `page_index`) from any backend.
pub fn layout_from_backend(
    backend: &dyn PdfBackend,
    page_index: usize,
) -> Result<PageLayout, PdfError> {
    let pages = backend.pages();
    let page_id = *pages.values().nth(page_index).ok_or(PdfError::PageNotFound {
        index: page_index,
        count: pages.len(),
    })?;

    let (width, height) = backend.page_size(page_id)?;
    let spans = parser::spans::extract_page_spans(backend, page_id)?;
    let words = words::spans_to_words(&spans, height);
    debug!(
        "page {}: {} spans, {} words, {}x{}",
        page_index,
        spans.len(),
        words.len(),
        width,
        height
    );

    Ok(PageLayout::new(width as f64, height as f64, words))
}

/// Parse PDF bytes and build the layout of one page.
pub fn page_layout(bytes: &[u8], page_index: usize) -> Result<PageLayout, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    layout_from_backend(&backend, page_index)
}

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfError> {
    Ok(LopdfBackend::load_bytes(bytes)?.page_count())
}
