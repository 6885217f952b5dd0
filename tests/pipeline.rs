//! Pipeline integration tests against in-memory documents and mock clients.
//!
//! No pdfium library and no network are needed: the engine, the OCR client
//! and the summary client are replaced through their traits.

use async_trait::async_trait;
use image::DynamicImage;
use pdf_summarizer::{
    EncodedImage, ExtractionPhase, InputFile, OcrClient, PageError, PdfDocument, PdfEngine,
    Pipeline, PipelineObserver, PipelineState, ProgressPresenter, ProgressSnapshot, ProgressView,
    RunOutcome, SummarizeError, SummarizerConfig, SummaryClient,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ── Mocks ────────────────────────────────────────────────────────────────

struct MemoryDocument {
    pages: Vec<Vec<String>>,
}

impl PdfDocument for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page_num: usize) -> Result<Vec<String>, SummarizeError> {
        Ok(self.pages[page_num - 1].clone())
    }

    fn render_page(
        &self,
        _page_num: usize,
        _scale: f32,
    ) -> Result<DynamicImage, SummarizeError> {
        Ok(DynamicImage::new_rgb8(32, 48))
    }
}

struct MemoryEngine {
    pages: Vec<Vec<String>>,
    fail_open: bool,
    opens: AtomicUsize,
}

impl MemoryEngine {
    fn with_pages(pages: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|p| p.iter().map(|s| s.to_string()).collect())
                .collect(),
            fail_open: false,
            opens: AtomicUsize::new(0),
        })
    }

    fn scanned(pages: usize) -> Arc<Self> {
        let blank: &[&str] = &[];
        Self::with_pages(&vec![blank; pages])
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            pages: Vec::new(),
            fail_open: true,
            opens: AtomicUsize::new(0),
        })
    }
}

impl PdfEngine for MemoryEngine {
    fn open(&self, _bytes: Arc<[u8]>) -> Result<Arc<dyn PdfDocument>, SummarizeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(SummarizeError::ParseError {
                detail: "Invalid PDF structure".into(),
            });
        }
        Ok(Arc::new(MemoryDocument {
            pages: self.pages.clone(),
        }))
    }
}

/// Per-page OCR answers; `None` means OCR.space rejected the page.
struct MockOcr {
    answers: Vec<Option<String>>,
    calls: AtomicUsize,
}

impl MockOcr {
    fn new(answers: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers.iter().map(|a| a.map(str::to_string)).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn unused() -> Arc<Self> {
        Self::new(&[])
    }
}

#[async_trait]
impl OcrClient for MockOcr {
    async fn recognize(
        &self,
        page_num: usize,
        image: &EncodedImage,
    ) -> Result<String, SummarizeError> {
        assert!(!image.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.get(page_num - 1).cloned().flatten() {
            Some(text) => Ok(text),
            None => Err(PageError::OcrRejected {
                page: page_num,
                status: 403,
                detail: "invalid key".into(),
            }
            .into()),
        }
    }
}

enum Reply {
    Summary(&'static str),
    Invalid(serde_json::Value),
    Api(u16, &'static str),
    Network,
    Panic,
}

struct MockSummary {
    reply: Reply,
    received: Mutex<Vec<String>>,
}

impl MockSummary {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            received: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryClient for MockSummary {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        self.received.lock().unwrap().push(text.to_string());
        match &self.reply {
            Reply::Summary(s) => Ok(s.to_string()),
            Reply::Invalid(body) => Err(SummarizeError::InvalidResponse { body: body.clone() }),
            Reply::Api(status, body) => Err(SummarizeError::ApiError {
                status: *status,
                body: body.to_string(),
            }),
            Reply::Network => Err(SummarizeError::NetworkError {
                endpoint: "https://summary.test".into(),
                reason: "connection refused".into(),
            }),
            Reply::Panic => panic!("summary backend exploded"),
        }
    }
}

/// Blocks the first call until released; later calls answer at once.
struct GatedSummary {
    entered: Notify,
    release: Notify,
    first: AtomicBool,
}

impl GatedSummary {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            first: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl SummaryClient for GatedSummary {
    async fn summarize(&self, _text: &str) -> Result<String, SummarizeError> {
        if self.first.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok("gated summary".into())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start,
    Status(String),
    Display(String),
    Done(RunOutcome),
    Reset,
    Rejected(String),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }
}

impl PipelineObserver for Recorder {
    fn on_run_start(&self) {
        self.push(Event::Start);
    }
    fn on_status(&self, status: &str) {
        self.push(Event::Status(status.to_string()));
    }
    fn on_display(&self, text: &str) {
        self.push(Event::Display(text.to_string()));
    }
    fn on_done(&self, outcome: &RunOutcome) {
        self.push(Event::Done(outcome.clone()));
    }
    fn on_reset(&self) {
        self.push(Event::Reset);
    }
    fn on_rejected(&self, reason: &str) {
        self.push(Event::Rejected(reason.to_string()));
    }
}

#[derive(Default)]
struct Frames(Mutex<Vec<ProgressSnapshot>>);

impl ProgressView for Frames {
    fn render(&self, snapshot: &ProgressSnapshot) {
        self.0.lock().unwrap().push(snapshot.clone());
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn config() -> SummarizerConfig {
    SummarizerConfig::builder()
        .summary_endpoint("https://summary.test")
        .ocr_api_key("test-key")
        .build()
        .unwrap()
}

fn pdf() -> InputFile {
    InputFile::from_bytes("doc.pdf", "application/pdf", b"%PDF-1.7 test".to_vec())
}

fn pipeline(
    engine: Arc<MemoryEngine>,
    ocr: Arc<dyn OcrClient>,
    summary: Arc<dyn SummaryClient>,
) -> (Arc<Pipeline>, Arc<Recorder>) {
    let p = Arc::new(Pipeline::new(config(), engine, ocr, summary));
    let rec = Arc::new(Recorder::default());
    p.subscribe(rec.clone());
    (p, rec)
}

async fn wait_for_idle(p: &Pipeline) {
    for _ in 0..200 {
        if !p.is_in_progress() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pipeline never went idle");
}

// ── Happy paths ──────────────────────────────────────────────────────────

#[tokio::test]
async fn text_pdf_is_summarised_without_ocr() {
    let engine = MemoryEngine::with_pages(&[&["Quarterly", "report"], &["Revenue", "grew"]]);
    let ocr = MockOcr::unused();
    let summary = MockSummary::new(Reply::Summary("Revenue grew."));
    let (p, rec) = pipeline(engine, ocr.clone(), summary.clone());

    let outcome = p.process_file(pdf()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Summary("Revenue grew.".into()));
    assert_eq!(summary.received(), vec!["Quarterly report\n\nRevenue grew"]);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    assert_eq!(p.display(), "Revenue grew.");
    assert_eq!(p.state(), PipelineState::Done(outcome.clone()));
    assert_eq!(
        rec.statuses(),
        vec![
            "Extracting text from PDF...",
            "Extracting text from page 1 of 2...",
            "Extracting text from page 2 of 2...",
            "Generating AI summary...",
        ]
    );
    assert_eq!(rec.events().first(), Some(&Event::Start));
    assert_eq!(rec.events().last(), Some(&Event::Done(outcome)));
}

#[tokio::test]
async fn scanned_pdf_falls_back_to_ocr() {
    let engine = MemoryEngine::scanned(2);
    let ocr = MockOcr::new(&[Some("Hello scanned"), Some("world")]);
    let summary = MockSummary::new(Reply::Summary("A greeting."));
    let (p, rec) = pipeline(engine.clone(), ocr.clone(), summary.clone());

    let outcome = p.process_file(pdf()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Summary("A greeting.".into()));
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.opens.load(Ordering::SeqCst), 2);
    assert_eq!(
        summary.received(),
        vec!["--- Page 1 ---\nHello scanned\n\n--- Page 2 ---\nworld\n\n"]
    );
    assert_eq!(
        rec.statuses(),
        vec![
            "Extracting text from PDF...",
            "Extracting text from page 1 of 2...",
            "Extracting text from page 2 of 2...",
            "No selectable text found. Using OCR.space (cloud OCR)...",
            "Uploading page 1 of 2 to OCR.space...",
            "Uploading page 2 of 2 to OCR.space...",
            "Generating AI summary...",
        ]
    );

    // OCR blocks streamed to the display before the summary replaced them.
    let displays: Vec<_> = rec
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Display(d) => Some(d),
            _ => None,
        })
        .collect();
    assert!(displays.contains(&"--- Page 1 ---\nHello scanned\n\n".to_string()));
    assert_eq!(displays.last().map(String::as_str), Some("A greeting."));
}

#[tokio::test]
async fn whitespace_only_text_layer_triggers_ocr() {
    let engine = MemoryEngine::with_pages(&[&["   ", "\n"], &["\t"]]);
    let ocr = MockOcr::new(&[Some("Recovered text"), Some("")]);
    let summary = MockSummary::new(Reply::Summary("ok"));
    let (p, _) = pipeline(engine, ocr.clone(), summary);

    assert!(p.process_file(pdf()).await.unwrap().is_success());
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn short_text_layer_triggers_ocr() {
    let engine = MemoryEngine::with_pages(&[&["Page 1"]]);
    let ocr = MockOcr::new(&[Some("The actual page content")]);
    let summary = MockSummary::new(Reply::Summary("ok"));
    let (p, _) = pipeline(engine, ocr.clone(), summary.clone());

    p.process_file(pdf()).await.unwrap();
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    assert!(summary.received()[0].contains("The actual page content"));
}

#[tokio::test]
async fn rejected_ocr_page_does_not_stop_the_run() {
    let engine = MemoryEngine::scanned(3);
    let ocr = MockOcr::new(&[Some("first"), None, Some("third")]);
    let summary = MockSummary::new(Reply::Summary("ok"));
    let (p, _) = pipeline(engine, ocr, summary.clone());

    assert!(p.process_file(pdf()).await.unwrap().is_success());
    let sent = &summary.received()[0];
    assert!(sent.contains("--- Page 2 ---\n\n\n"));
    assert!(sent.contains("third"));
}

#[tokio::test]
async fn long_text_is_truncated() {
    let long = "x".repeat(15_000);
    let engine = MemoryEngine::with_pages(&[&[long.as_str()]]);
    let summary = MockSummary::new(Reply::Summary("ok"));
    let (p, _) = pipeline(engine, MockOcr::unused(), summary.clone());

    p.process_file(pdf()).await.unwrap();
    let sent = &summary.received()[0];
    assert_eq!(sent.chars().count(), 12_000);
    assert!(long.starts_with(sent.as_str()));
}

// ── Degraded and failed runs ─────────────────────────────────────────────

#[tokio::test]
async fn invalid_response_is_degraded_with_body() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Invalid(serde_json::json!({"error": "quota"})));
    let (p, _) = pipeline(engine, MockOcr::unused(), summary);

    let outcome = p.process_file(pdf()).await.unwrap();

    match &outcome {
        RunOutcome::Degraded { message } => {
            assert!(message.starts_with("AI backend response:\n"));
            assert!(message.contains("\"error\": \"quota\""));
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
    assert_eq!(p.state(), PipelineState::Done(outcome.clone()));
    assert_eq!(p.display(), outcome.display_text());
}

#[tokio::test]
async fn empty_summary_is_degraded() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Summary(""));
    let (p, _) = pipeline(engine, MockOcr::unused(), summary);

    let outcome = p.process_file(pdf()).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Degraded {
            message: "No summary returned from AI backend.".into()
        }
    );
}

#[tokio::test]
async fn network_failure_fails_and_returns_to_idle() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Network);
    let (p, rec) = pipeline(engine, MockOcr::unused(), summary);

    let outcome = p.process_file(pdf()).await.unwrap();

    assert!(outcome.is_failure());
    assert!(outcome.display_text().starts_with("Network error"));
    assert_eq!(p.state(), PipelineState::Idle);
    assert_eq!(p.display(), outcome.display_text());
    assert_eq!(rec.count(&Event::Reset), 1);
}

#[tokio::test]
async fn api_error_shows_status_and_body() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Api(502, "bad gateway"));
    let (p, _) = pipeline(engine, MockOcr::unused(), summary);

    let outcome = p.process_file(pdf()).await.unwrap();
    assert!(outcome.is_failure());
    assert!(outcome.display_text().contains("502"));
    assert!(outcome.display_text().contains("bad gateway"));
}

#[tokio::test]
async fn no_text_anywhere_fails_before_summary() {
    let engine = MemoryEngine::scanned(2);
    let ocr = MockOcr::new(&[Some(""), Some("  ")]);
    let summary = MockSummary::new(Reply::Summary("never"));
    let (p, _) = pipeline(engine, ocr, summary.clone());

    let outcome = p.process_file(pdf()).await.unwrap();

    assert!(outcome.is_failure());
    assert!(outcome.display_text().starts_with("Error: "));
    assert!(summary.received().is_empty());
}

#[tokio::test]
async fn unparseable_pdf_fails() {
    let summary = MockSummary::new(Reply::Summary("never"));
    let (p, _) = pipeline(MemoryEngine::broken(), MockOcr::unused(), summary.clone());

    let outcome = p.process_file(pdf()).await.unwrap();
    assert!(outcome.is_failure());
    assert!(outcome.display_text().contains("Invalid PDF structure"));
    assert!(summary.received().is_empty());
    assert_eq!(p.state(), PipelineState::Idle);
}

#[tokio::test]
async fn panic_in_a_stage_is_contained() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Panic);
    let (p, _) = pipeline(engine, MockOcr::unused(), summary);

    let outcome = p.process_file(pdf()).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            message: "Error: An unexpected error occurred. Please try again.".into()
        }
    );
    assert_eq!(p.state(), PipelineState::Idle);
    assert!(!p.is_in_progress());
}

// ── Input boundary ───────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_is_rejected_without_state_change() {
    let engine = MemoryEngine::with_pages(&[&["text"]]);
    let summary = MockSummary::new(Reply::Summary("never"));
    let (p, rec) = pipeline(engine.clone(), MockOcr::unused(), summary.clone());

    let file = InputFile::from_bytes("photo.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    let err = p.process_file(file).await.unwrap_err();

    assert!(matches!(err, SummarizeError::InvalidFileType { ref mime } if mime == "image/png"));
    assert_eq!(p.state(), PipelineState::Idle);
    assert_eq!(engine.opens.load(Ordering::SeqCst), 0);
    assert!(summary.received().is_empty());
    assert!(matches!(rec.events().as_slice(), [Event::Rejected(_)]));
}

// ── Single-flight, reset and cancellation ────────────────────────────────

#[tokio::test]
async fn second_request_while_running_is_refused() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let gate = GatedSummary::new();
    let (p, _) = pipeline(engine, MockOcr::unused(), gate.clone());

    let first = {
        let p = Arc::clone(&p);
        tokio::spawn(async move { p.process_file(pdf()).await })
    };
    gate.entered.notified().await;
    assert_eq!(p.state(), PipelineState::Summarizing);

    let err = p.process_file(pdf()).await.unwrap_err();
    assert!(matches!(err, SummarizeError::AlreadyRunning));
    assert_eq!(p.state(), PipelineState::Summarizing);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Summary("gated summary".into()));
}

#[tokio::test]
async fn reset_cancels_run_in_flight() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let gate = GatedSummary::new();
    let (p, rec) = pipeline(engine, MockOcr::unused(), gate.clone());

    let run = {
        let p = Arc::clone(&p);
        tokio::spawn(async move { p.process_file(pdf()).await })
    };
    gate.entered.notified().await;

    p.reset();
    let result = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("cancelled run should return")
        .unwrap();

    assert!(matches!(result, Err(SummarizeError::Cancelled)));
    assert_eq!(p.state(), PipelineState::Idle);
    assert_eq!(p.display(), "");
    assert_eq!(rec.count(&Event::Reset), 1);
    assert!(!rec.events().iter().any(|e| matches!(e, Event::Done(_))));

    // The pipeline accepts the next file.
    let outcome = p.process_file(pdf()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Summary("gated summary".into()));
}

#[tokio::test]
async fn reset_is_idempotent() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Summary("done"));
    let (p, rec) = pipeline(engine, MockOcr::unused(), summary);

    p.reset();
    assert!(rec.events().is_empty());

    p.process_file(pdf()).await.unwrap();
    p.reset();
    p.reset();

    assert_eq!(p.state(), PipelineState::Idle);
    assert_eq!(p.display(), "");
    assert_eq!(rec.count(&Event::Reset), 1);
}

#[tokio::test]
async fn reset_after_failure_clears_kept_message() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Network);
    let (p, _) = pipeline(engine, MockOcr::unused(), summary);

    p.process_file(pdf()).await.unwrap();
    assert!(!p.display().is_empty());

    p.reset();
    assert_eq!(p.display(), "");
}

#[tokio::test]
async fn new_run_clears_kept_failure_message() {
    let engine = MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]);
    let summary = MockSummary::new(Reply::Network);
    let (p, rec) = pipeline(engine, MockOcr::unused(), summary);

    p.process_file(pdf()).await.unwrap();
    assert!(!p.display().is_empty());
    let before = rec.events().len();

    p.process_file(pdf()).await.unwrap();

    let second_run = rec.events()[before..].to_vec();
    assert_eq!(second_run[0], Event::Start);
    assert_eq!(second_run[1], Event::Display(String::new()));
}

#[tokio::test]
async fn remote_phase_is_visible_during_ocr() {
    struct PhaseWatcher {
        pipeline: Mutex<Option<Arc<Pipeline>>>,
        seen: Mutex<Vec<PipelineState>>,
    }

    #[async_trait]
    impl OcrClient for PhaseWatcher {
        async fn recognize(&self, _: usize, _: &EncodedImage) -> Result<String, SummarizeError> {
            let p = self.pipeline.lock().unwrap().clone();
            if let Some(p) = p {
                self.seen.lock().unwrap().push(p.state());
            }
            Ok("scanned words".into())
        }
    }

    let watcher = Arc::new(PhaseWatcher {
        pipeline: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    let (p, _) = pipeline(
        MemoryEngine::scanned(1),
        watcher.clone(),
        MockSummary::new(Reply::Summary("ok")),
    );
    *watcher.pipeline.lock().unwrap() = Some(Arc::clone(&p));

    p.process_file(pdf()).await.unwrap();
    assert_eq!(
        *watcher.seen.lock().unwrap(),
        vec![PipelineState::Extracting {
            phase: ExtractionPhase::Remote
        }]
    );
    *watcher.pipeline.lock().unwrap() = None;
}

// ── Progress presenter wiring ────────────────────────────────────────────

#[tokio::test]
async fn presenter_tracks_an_ocr_run() {
    let frames = Arc::new(Frames::default());
    let presenter = Arc::new(ProgressPresenter::new(frames.clone()));
    let (p, _) = pipeline(
        MemoryEngine::scanned(2),
        MockOcr::new(&[Some("alpha"), Some("beta")]),
        MockSummary::new(Reply::Summary("ok")),
    );
    p.subscribe(presenter.clone());

    p.process_file(pdf()).await.unwrap();

    let frames = frames.0.lock().unwrap().clone();
    let (running, done): (Vec<_>, Vec<_>) = frames.iter().partition(|f| !f.completed);
    assert!(running.iter().all(|f| f.percent <= 95.0));
    assert!(running.iter().any(|f| f.stage == 2));
    assert_eq!(running.last().map(|f| f.stage), Some(3));
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].percent, 100.0);
    assert_eq!(done[0].status, "Summary ready");
    assert!(done[0].reset_enabled);
}

#[tokio::test]
async fn presenter_resets_after_failure() {
    let presenter = Arc::new(ProgressPresenter::new(Arc::new(Frames::default())));
    let (p, _) = pipeline(
        MemoryEngine::with_pages(&[&["Plenty of embedded text here"]]),
        MockOcr::unused(),
        MockSummary::new(Reply::Network),
    );
    p.subscribe(presenter.clone());

    p.process_file(pdf()).await.unwrap();
    wait_for_idle(&p).await;

    assert_eq!(presenter.snapshot(), ProgressSnapshot::default());
}
