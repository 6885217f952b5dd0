//! The summarisation pipeline: state machine, fallback policy, single-flight.
//!
//! ```text
//!  Idle ──▶ Extracting(Local) ──(text < min)──▶ Extracting(Remote)
//!                │                                    │
//!                └──────────────▶ Summarizing ◀───────┘
//!                                     │
//!                          Done(Summary | Degraded | Failed)
//! ```
//!
//! One [`Pipeline`] owns one run slot. A run takes the slot under a mutex
//! before its first suspension point and gives it back only on a terminal
//! transition, so a second request while a run is in flight is refused
//! with [`SummarizeError::AlreadyRunning`] instead of racing on the display.
//!
//! Every failure, including a panic inside a stage, ends as
//! [`RunOutcome::Failed`]: the message is written to the display, then the
//! pipeline drops back to [`PipelineState::Idle`] so the next file can be
//! processed. [`Pipeline::reset`] during a run cancels it; the cancelled run
//! returns [`SummarizeError::Cancelled`] and never touches the display again.

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use crate::pipeline::document::{open_document, PdfEngine};
use crate::pipeline::input::InputFile;
use crate::pipeline::ocr::{self, OcrClient, OcrSpaceClient};
use crate::pipeline::render::PdfiumEngine;
use crate::pipeline::summary::{HttpSummaryClient, SummaryClient};
use crate::pipeline::{local, truncate_input, StageEvents};
use crate::progress::{Observer, PipelineObserver};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Which extraction path is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    /// Embedded text layer.
    Local,
    /// OCR.space fallback.
    Remote,
}

/// Terminal result of a run, as shown on the display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The endpoint produced a summary.
    Summary(String),
    /// The run finished but the endpoint gave nothing usable; `message`
    /// shows what it did return.
    Degraded { message: String },
    /// The run failed; `message` says why.
    Failed { message: String },
}

impl RunOutcome {
    /// Text for the display surface.
    pub fn display_text(&self) -> &str {
        match self {
            RunOutcome::Summary(text) => text,
            RunOutcome::Degraded { message } | RunOutcome::Failed { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Summary(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

/// Where the pipeline is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting {
        phase: ExtractionPhase,
    },
    Summarizing,
    Done(RunOutcome),
}

impl PipelineState {
    /// `true` while a run holds the single-flight slot.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            PipelineState::Extracting { .. } | PipelineState::Summarizing
        )
    }
}

#[derive(Default)]
struct RunSlot {
    state: PipelineState,
    status: String,
    run_id: u64,
    cancel: Option<watch::Sender<bool>>,
}

/// Orchestrates extraction, OCR fallback and summarisation for one file at
/// a time.
pub struct Pipeline {
    config: SummarizerConfig,
    engine: Arc<dyn PdfEngine>,
    ocr: Arc<dyn OcrClient>,
    summarizer: Arc<dyn SummaryClient>,
    slot: Mutex<RunSlot>,
    display: Mutex<String>,
    observers: RwLock<Vec<Observer>>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: SummarizerConfig,
        engine: Arc<dyn PdfEngine>,
        ocr: Arc<dyn OcrClient>,
        summarizer: Arc<dyn SummaryClient>,
    ) -> Self {
        Self {
            config,
            engine,
            ocr,
            summarizer,
            slot: Mutex::new(RunSlot::default()),
            display: Mutex::new(String::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Pipeline backed by pdfium, OCR.space and the configured endpoint.
    pub fn from_config(config: SummarizerConfig) -> Result<Self, SummarizeError> {
        let engine = Arc::new(PdfiumEngine::new(config.pdfium_lib_path.clone())?);
        let ocr = Arc::new(OcrSpaceClient::new(&config)?);
        let summarizer = Arc::new(HttpSummaryClient::new(&config)?);
        Ok(Self::new(config, engine, ocr, summarizer))
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Register an observer for all following events.
    pub fn subscribe(&self, observer: Observer) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn state(&self) -> PipelineState {
        self.lock_slot().state.clone()
    }

    pub fn is_in_progress(&self) -> bool {
        self.lock_slot().state.is_in_progress()
    }

    /// The latest status line.
    pub fn status(&self) -> String {
        self.lock_slot().status.clone()
    }

    /// Current content of the display surface.
    pub fn display(&self) -> String {
        self.lock_display().clone()
    }

    /// Run the whole pipeline for `file`.
    ///
    /// # Errors
    /// Only for requests that never became a run or whose run was
    /// cancelled: [`SummarizeError::InvalidFileType`],
    /// [`SummarizeError::AlreadyRunning`], [`SummarizeError::Cancelled`].
    /// Every other failure is reported as `Ok(RunOutcome::Failed { .. })`.
    pub async fn process_file(&self, file: InputFile) -> Result<RunOutcome, SummarizeError> {
        if !file.is_pdf() {
            let err = SummarizeError::InvalidFileType {
                mime: file.mime.clone(),
            };
            warn!("Rejected '{}': {}", file.name, err);
            self.notify(|o| o.on_rejected(&err.to_string()));
            return Err(err);
        }

        let (run_id, mut cancel, had_display) = self.begin_run()?;
        info!(
            "Run {} started: '{}' ({} bytes)",
            run_id,
            file.name,
            file.bytes.len()
        );
        self.notify(|o| o.on_run_start());
        if had_display {
            self.notify(|o| o.on_display(""));
        }

        let ctx = RunContext {
            pipeline: self,
            run_id,
        };
        let run = AssertUnwindSafe(self.execute(&ctx, file.bytes)).catch_unwind();

        let result = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                info!("Run {} cancelled", run_id);
                return Err(SummarizeError::Cancelled);
            }
            result = run => result,
        };

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Run {} failed: {}", run_id, e);
                RunOutcome::Failed {
                    message: e.user_message(),
                }
            }
            Err(panic) => {
                error!("Run {} panicked: {}", run_id, panic_message(panic.as_ref()));
                RunOutcome::Failed {
                    message: "Error: An unexpected error occurred. Please try again.".to_string(),
                }
            }
        };

        self.finish_run(run_id, &outcome)?;
        Ok(outcome)
    }

    /// Return to idle and clear the display.
    ///
    /// Cancels a run in flight. A no-op when already idle with an empty
    /// display.
    pub fn reset(&self) {
        let interrupted = {
            let mut slot = self.lock_slot();
            let mut display = self.lock_display();
            if slot.state == PipelineState::Idle && display.is_empty() {
                return;
            }
            let interrupted = slot.state.is_in_progress();
            if let Some(tx) = slot.cancel.take() {
                let _ = tx.send(true);
            }
            slot.run_id += 1;
            slot.state = PipelineState::Idle;
            slot.status.clear();
            display.clear();
            interrupted
        };

        if interrupted {
            info!("Reset: in-flight run cancelled");
        } else {
            debug!("Reset");
        }
        self.notify(|o| o.on_display(""));
        self.notify(|o| o.on_reset());
    }

    // ── Run lifecycle ────────────────────────────────────────────────────

    /// Take the slot. The flag tells whether a kept display was cleared.
    fn begin_run(&self) -> Result<(u64, watch::Receiver<bool>, bool), SummarizeError> {
        let mut slot = self.lock_slot();
        if slot.state.is_in_progress() {
            warn!("Run {} still in progress; request ignored", slot.run_id);
            return Err(SummarizeError::AlreadyRunning);
        }
        let (tx, rx) = watch::channel(false);
        slot.run_id += 1;
        slot.cancel = Some(tx);
        slot.state = PipelineState::Extracting {
            phase: ExtractionPhase::Local,
        };
        slot.status.clear();
        let mut display = self.lock_display();
        let had_display = !display.is_empty();
        display.clear();
        Ok((slot.run_id, rx, had_display))
    }

    async fn execute(
        &self,
        ctx: &RunContext<'_>,
        bytes: Arc<[u8]>,
    ) -> Result<RunOutcome, SummarizeError> {
        ctx.status("Extracting text from PDF...");
        let doc = open_document(&self.engine, Arc::clone(&bytes)).await?;
        let mut text = local::extract_text(&doc, ctx).await?;
        drop(doc);

        let local_chars = text.trim().chars().count();
        if local_chars < self.config.min_text_chars {
            info!(
                "Local extraction yielded {} chars (< {}); falling back to OCR",
                local_chars, self.config.min_text_chars
            );
            ctx.transition(PipelineState::Extracting {
                phase: ExtractionPhase::Remote,
            })?;
            ctx.status("No selectable text found. Using OCR.space (cloud OCR)...");

            let doc = open_document(&self.engine, bytes).await?;
            let ocr_text = ocr::extract_text(
                &doc,
                self.ocr.as_ref(),
                self.config.image,
                self.config.render_scale,
                ctx,
            )
            .await?;
            text = if ocr::has_recognized_text(&ocr_text) {
                ocr_text
            } else {
                String::new()
            };
        }

        if text.trim().is_empty() {
            return Err(SummarizeError::NoTextExtracted);
        }

        let input = truncate_input(&text, self.config.max_input_chars);
        if input.len() < text.len() {
            info!(
                "Input truncated to {} of {} chars",
                self.config.max_input_chars,
                text.chars().count()
            );
        }

        ctx.transition(PipelineState::Summarizing)?;
        ctx.status("Generating AI summary...");

        match self.summarizer.summarize(input).await {
            Ok(summary) if summary.trim().is_empty() => Ok(RunOutcome::Degraded {
                message: "No summary returned from AI backend.".to_string(),
            }),
            Ok(summary) => Ok(RunOutcome::Summary(summary)),
            Err(e @ SummarizeError::InvalidResponse { .. }) => Ok(RunOutcome::Degraded {
                message: e.user_message(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Record the outcome; failures then drop straight back to idle with
    /// the message left on the display.
    fn finish_run(&self, run_id: u64, outcome: &RunOutcome) -> Result<(), SummarizeError> {
        {
            let mut slot = self.lock_slot();
            if slot.run_id != run_id || !slot.state.is_in_progress() {
                return Err(SummarizeError::Cancelled);
            }
            slot.state = PipelineState::Done(outcome.clone());
            slot.cancel = None;
            *self.lock_display() = outcome.display_text().to_string();
        }

        info!(
            "Run {} finished: {}",
            run_id,
            match outcome {
                RunOutcome::Summary(_) => "summary",
                RunOutcome::Degraded { .. } => "degraded",
                RunOutcome::Failed { .. } => "failed",
            }
        );
        self.notify(|o| o.on_display(outcome.display_text()));
        self.notify(|o| o.on_done(outcome));

        if outcome.is_failure() {
            {
                let mut slot = self.lock_slot();
                if slot.run_id != run_id {
                    return Ok(());
                }
                slot.state = PipelineState::Idle;
                slot.status.clear();
            }
            self.notify(|o| o.on_reset());
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn notify(&self, event: impl Fn(&dyn PipelineObserver)) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            event(observer.as_ref());
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_display(&self) -> MutexGuard<'_, String> {
        self.display.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stage-facing handle of one run. Events from a run that has been
/// superseded by a reset are dropped.
struct RunContext<'a> {
    pipeline: &'a Pipeline,
    run_id: u64,
}

impl RunContext<'_> {
    fn transition(&self, next: PipelineState) -> Result<(), SummarizeError> {
        let mut slot = self.pipeline.lock_slot();
        if slot.run_id != self.run_id {
            return Err(SummarizeError::Cancelled);
        }
        debug!("Run {}: {:?} → {:?}", self.run_id, slot.state, next);
        slot.state = next;
        Ok(())
    }

    /// Apply `update` to the display if this run is still current.
    fn update_display(&self, update: impl FnOnce(&mut String)) -> Option<String> {
        let slot = self.pipeline.lock_slot();
        if slot.run_id != self.run_id {
            return None;
        }
        let mut display = self.pipeline.lock_display();
        update(&mut display);
        Some(display.clone())
    }
}

impl StageEvents for RunContext<'_> {
    fn status(&self, status: &str) {
        {
            let mut slot = self.pipeline.lock_slot();
            if slot.run_id != self.run_id {
                return;
            }
            slot.status = status.to_string();
        }
        debug!("Status: {}", status);
        self.pipeline.notify(|o| o.on_status(status));
    }

    fn clear_display(&self) {
        if let Some(text) = self.update_display(String::clear) {
            self.pipeline.notify(|o| o.on_display(&text));
        }
    }

    fn append_display(&self, text: &str) {
        if let Some(full) = self.update_display(|d| d.push_str(text)) {
            self.pipeline.notify(|o| o.on_display(&full));
        }
    }
}

/// Resolves once the run's cancel flag is raised. Pends forever if the
/// sender goes away without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            if *rx.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Summarise one PDF file with a fresh pdfium/OCR.space/HTTP pipeline.
///
/// # Example
/// ```rust,no_run
/// use pdf_summarizer::{summarize_file, SummarizerConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SummarizerConfig::builder()
///     .summary_endpoint("https://summary.example.workers.dev")
///     .build()?;
/// let outcome = summarize_file("report.pdf", config).await?;
/// println!("{}", outcome.display_text());
/// # Ok(())
/// # }
/// ```
pub async fn summarize_file(
    path: impl AsRef<Path>,
    config: SummarizerConfig,
) -> Result<RunOutcome, SummarizeError> {
    let file = InputFile::from_path(path).await?;
    let pipeline = Pipeline::from_config(config)?;
    pipeline.process_file(file).await
}

/// Synchronous wrapper around [`summarize_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_file_sync(
    path: impl AsRef<Path>,
    config: SummarizerConfig,
) -> Result<RunOutcome, SummarizeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SummarizeError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(summarize_file(path, config))
}
