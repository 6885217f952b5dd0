//! Error types for the pdf-summarizer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SummarizeError`]: **fatal** for the current run. The file is not a
//!   PDF, the document cannot be parsed, the summarisation endpoint refused
//!   the request. Returned as `Err(SummarizeError)` from the stages and
//!   turned into a displayable [`crate::orchestrator::RunOutcome`] by the
//!   orchestrator.
//!
//! * [`PageError`]: **non-fatal**. OCR.space could not read a single page.
//!   The OCR extractor logs it, degrades that page's text to an empty block
//!   and moves on to the next page.

use std::path::PathBuf;
use thiserror::Error;

/// All run-level errors returned by the pdf-summarizer library.
#[derive(Debug, Error)]
pub enum SummarizeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The supplied file is not a PDF. Raised before any stage runs.
    #[error("Please select a valid PDF file (got '{mime}').")]
    InvalidFileType { mime: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The buffer could not be parsed as a PDF document.
    #[error("Failed to parse PDF: {detail}")]
    ParseError { detail: String },

    /// Text retrieval failed for one page; the whole extraction aborts.
    #[error("Failed to extract text from PDF (page {page}): {detail}")]
    ExtractionError { page: usize, detail: String },

    /// A page could not be rendered or re-encoded for OCR.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Neither local extraction nor OCR produced usable text.
    #[error(
        "No text could be extracted from the PDF. The PDF might be image-based or encrypted."
    )]
    NoTextExtracted,

    /// A single OCR page failed. Absorbed by the OCR extractor.
    #[error(transparent)]
    Page(#[from] PageError),

    // ── Remote service errors ─────────────────────────────────────────────
    /// Summarisation endpoint answered with a non-2xx status.
    #[error("API request failed ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// Summarisation endpoint answered 2xx without a usable `summary`.
    #[error("AI backend returned no summary: {body}")]
    InvalidResponse { body: serde_json::Value },

    /// The request never reached the remote service.
    #[error("Network error reaching '{endpoint}': {reason}")]
    NetworkError { endpoint: String, reason: String },

    // ── Run control ───────────────────────────────────────────────────────
    /// A run is already in progress; the new request was not started.
    #[error("A PDF is already being processed")]
    AlreadyRunning,

    /// The run was cancelled by a reset before it finished.
    #[error("Run cancelled")]
    Cancelled,

    // ── Setup errors ──────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SummarizeError {
    /// The text written to the display surface when this error ends a run.
    ///
    /// Each remote-service failure keeps its own wording so the operator can
    /// tell a refused request from an unreachable endpoint.
    pub fn user_message(&self) -> String {
        match self {
            SummarizeError::ApiError { status, body } => {
                format!("AI backend error response (HTTP {status}):\n{body}")
            }
            SummarizeError::InvalidResponse { body } => format!(
                "AI backend response:\n{}",
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
            ),
            SummarizeError::NetworkError { reason, .. } => format!(
                "Network error: Unable to connect to the summarization service. \
Please check your internet connection.\n({reason})"
            ),
            other => format!("Error: {other}"),
        }
    }

    /// Whether the error only concerns one OCR page.
    pub fn is_page_local(&self) -> bool {
        matches!(self, SummarizeError::Page(_))
    }
}

/// A non-fatal OCR failure for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// OCR.space answered with an HTTP error status.
    #[error("Page {page}: OCR service returned HTTP {status}: {detail}")]
    OcrRejected {
        page: usize,
        status: u16,
        detail: String,
    },

    /// The OCR response body was not the expected JSON.
    #[error("Page {page}: invalid OCR response: {detail}")]
    InvalidOcrResponse { page: usize, detail: String },

    /// OCR.space flagged the page as errored during processing.
    #[error("Page {page}: OCR processing failed: {detail}")]
    OcrProcessingFailed { page: usize, detail: String },
}
