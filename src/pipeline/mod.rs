//! Pipeline stages for PDF summarisation.
//!
//! Each submodule implements exactly one step. The orchestrator in
//! [`crate::orchestrator`] decides which steps run and in which order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ local ──(too short)──▶ ocr ──▶ truncate ──▶ summary
//! (MIME)    (text layer)        (render+encode+upload)   (HTTP)
//! ```
//!
//! 1. [`input`]: read the user's file and check it is a PDF
//! 2. [`document`]: the `PdfEngine`/`PdfDocument` seam; [`render`] is the
//!    pdfium implementation
//! 3. [`local`]: embedded text layer, page by page
//! 4. [`ocr`]: OCR.space fallback; uses [`encode`] per page
//! 5. [`summary`]: the summarisation endpoint client

pub mod document;
pub mod encode;
pub mod input;
pub mod local;
pub mod ocr;
pub mod render;
pub mod summary;

use crate::error::SummarizeError;
use document::PdfDocument;
use std::sync::Arc;

/// Side effects a stage may produce while it runs.
///
/// Implemented by the orchestrator, which forwards them to observers.
pub trait StageEvents: Send + Sync {
    /// Replace the current status line.
    fn status(&self, status: &str);

    /// Empty the display surface.
    fn clear_display(&self);

    /// Append text to the display surface.
    fn append_display(&self, text: &str);
}

/// Run a blocking document operation on tokio's blocking pool.
///
/// pdfium and the JPEG encoder are CPU-bound and must not stall the async
/// worker threads.
pub(crate) async fn blocking<T, F>(doc: &Arc<dyn PdfDocument>, op: F) -> Result<T, SummarizeError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PdfDocument) -> Result<T, SummarizeError> + Send + 'static,
{
    let doc = Arc::clone(doc);
    tokio::task::spawn_blocking(move || op(doc.as_ref()))
        .await
        .map_err(|e| SummarizeError::Internal(format!("Document task panicked: {e}")))?
}

/// The first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, never splitting a character.
pub fn truncate_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
