//! Observer trait for pipeline events.
//!
//! Register an [`Arc<dyn PipelineObserver>`] with
//! [`crate::orchestrator::Pipeline::subscribe`] to receive status lines,
//! display-surface changes and run outcomes as they happen. The
//! [`crate::presenter::ProgressPresenter`] is one such observer; the CLI
//! adds another that mirrors the display surface.
//!
//! # Example
//!
//! ```rust
//! use pdf_summarizer::PipelineObserver;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StatusLog {
//!     lines: Mutex<Vec<String>>,
//! }
//!
//! impl PipelineObserver for StatusLog {
//!     fn on_status(&self, status: &str) {
//!         self.lines.lock().unwrap().push(status.to_string());
//!     }
//! }
//!
//! let log = Arc::new(StatusLog::default());
//! log.on_status("Extracting text from page 1 of 3...");
//! assert_eq!(log.lines.lock().unwrap().len(), 1);
//! ```

use crate::orchestrator::RunOutcome;
use std::sync::Arc;

/// Called by the pipeline as a run progresses.
///
/// All methods default to no-ops. Calls for one run arrive in order from
/// whichever task drives the run; implementations guard their own state.
pub trait PipelineObserver: Send + Sync {
    /// A run passed the single-flight guard and is starting.
    fn on_run_start(&self) {}

    /// The status line changed.
    fn on_status(&self, status: &str) {
        let _ = status;
    }

    /// The display surface now holds `text`.
    fn on_display(&self, text: &str) {
        let _ = text;
    }

    /// The run reached a terminal state.
    fn on_done(&self, outcome: &RunOutcome) {
        let _ = outcome;
    }

    /// The pipeline returned to idle (user reset or automatic reset after
    /// a failure).
    fn on_reset(&self) {}

    /// A file was refused before any stage ran.
    fn on_rejected(&self, reason: &str) {
        let _ = reason;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Shared observer handle.
pub type Observer = Arc<dyn PipelineObserver>;
