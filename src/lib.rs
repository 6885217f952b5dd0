//! # pdf-summarizer
//!
//! Summarise PDF documents through a remote summarisation endpoint.
//!
//! ## Why this crate?
//!
//! Most PDFs carry a text layer and can be read directly. Scans and photos
//! of pages do not, so when the text layer is empty (or nearly so) each page
//! is rasterised, compressed to fit the OCR service's upload limit and sent
//! to OCR.space. Whatever text comes out is capped and posted to a
//! summarisation endpoint.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     MIME check (application/pdf only)
//!  ├─ 2. Local     embedded text layer via pdfium (spawn_blocking)
//!  ├─ 3. OCR       only if < 10 chars: render → JPEG ≤ 950 KiB → OCR.space
//!  ├─ 4. Truncate  first 12 000 characters
//!  └─ 5. Summary   POST {"text": ..} → {"summary": ..}
//! ```
//!
//! One [`Pipeline`] runs one file at a time. Observers
//! ([`PipelineObserver`]) receive status lines and the display text; the
//! [`ProgressPresenter`] turns them into a progress timeline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_summarizer::{InputFile, Pipeline, SummarizerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SummarizerConfig::builder()
//!         .summary_endpoint("https://summary.example.workers.dev")
//!         .ocr_api_key(std::env::var("OCR_SPACE_API_KEY")?)
//!         .build()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!     let outcome = pipeline.process_file(InputFile::from_path("paper.pdf").await?).await?;
//!     println!("{}", outcome.display_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsum` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-summarizer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod presenter;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ImageBounds, SummarizerConfig, SummarizerConfigBuilder, DEFAULT_OCR_ENDPOINT};
pub use error::{PageError, SummarizeError};
pub use orchestrator::{
    summarize_file, summarize_file_sync, ExtractionPhase, Pipeline, PipelineState, RunOutcome,
};
pub use pipeline::document::{PdfDocument, PdfEngine};
pub use pipeline::encode::EncodedImage;
pub use pipeline::input::{InputFile, PDF_MIME};
pub use pipeline::ocr::{OcrClient, OcrSpaceClient};
pub use pipeline::render::PdfiumEngine;
pub use pipeline::summary::{HttpSummaryClient, SummaryClient};
pub use presenter::{ProgressPresenter, ProgressSnapshot, ProgressView, Stage, StepState};
pub use progress::{NoopObserver, Observer, PipelineObserver};
