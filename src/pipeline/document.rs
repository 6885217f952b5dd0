//! The document seam between the pipeline and a PDF engine.
//!
//! Extractors only see [`PdfEngine`] and [`PdfDocument`], so tests can run
//! the whole pipeline against in-memory documents and the pdfium backend in
//! [`super::render`] stays the only code that touches native bindings.

use crate::error::SummarizeError;
use image::DynamicImage;
use std::sync::Arc;

/// A loaded, immutable PDF. Pages are numbered from 1.
///
/// Methods are blocking; async callers go through the blocking pool.
pub trait PdfDocument: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Text fragments of page `page_num`, in reading order.
    ///
    /// Errors with [`SummarizeError::ExtractionError`].
    fn page_text(&self, page_num: usize) -> Result<Vec<String>, SummarizeError>;

    /// Rasterise page `page_num` at `scale` × its natural size.
    ///
    /// Errors with [`SummarizeError::RasterisationFailed`].
    fn render_page(&self, page_num: usize, scale: f32) -> Result<DynamicImage, SummarizeError>;
}

/// Parses raw bytes into a [`PdfDocument`].
pub trait PdfEngine: Send + Sync {
    /// Errors with [`SummarizeError::ParseError`] when the buffer is not a
    /// readable PDF.
    fn open(&self, bytes: Arc<[u8]>) -> Result<Arc<dyn PdfDocument>, SummarizeError>;
}

/// Open `bytes` on the blocking pool.
pub async fn open_document(
    engine: &Arc<dyn PdfEngine>,
    bytes: Arc<[u8]>,
) -> Result<Arc<dyn PdfDocument>, SummarizeError> {
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || engine.open(bytes))
        .await
        .map_err(|e| SummarizeError::Internal(format!("Open task panicked: {e}")))?
}
