//! CLI binary for pdf-summarizer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `SummarizerConfig`, renders the progress timeline and prints the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_summarizer::presenter::determine_stage;
use pdf_summarizer::{
    InputFile, Pipeline, PipelineObserver, ProgressPresenter, ProgressSnapshot, ProgressView,
    RunOutcome, Stage, SummarizeError, SummarizerConfig, DEFAULT_OCR_ENDPOINT,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal progress view using indicatif ───────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Draws the timeline as a single percent bar on stderr.
struct TerminalView {
    bar: ProgressBar,
    finished: AtomicBool,
}

impl TerminalView {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Waiting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            finished: AtomicBool::new(false),
        })
    }
}

impl ProgressView for TerminalView {
    fn render(&self, snap: &ProgressSnapshot) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        if snap.completed {
            self.bar.set_position(100);
            self.bar.finish_and_clear();
            self.finished.store(true, Ordering::SeqCst);
            eprintln!("{} {}", green("✔"), snap.status);
            return;
        }
        if !snap.visible {
            return;
        }

        self.bar.set_prefix(format!("{} {}/3", snap.heading, snap.stage));
        self.bar.set_position(snap.percent.round() as u64);
        if snap.obscured && !snap.placeholder.is_empty() {
            self.bar
                .set_message(format!("{}  {}", snap.status, dim(&snap.placeholder)));
        } else {
            self.bar.set_message(snap.status.clone());
        }
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

// ── Display echo ─────────────────────────────────────────────────────────────

/// Prints OCR text on stderr as each page is recognised.
///
/// Only the part appended since the last display update is printed, and
/// only while the OCR stage runs: the final summary goes to stdout instead.
struct DisplayEcho {
    bar: Option<ProgressBar>,
    state: Mutex<EchoState>,
}

const PAGE_LABEL: &str = "--- Page ";

#[derive(Default)]
struct EchoState {
    ocr_active: bool,
    shown: String,
}

impl DisplayEcho {
    fn new(bar: Option<ProgressBar>) -> Arc<Self> {
        Arc::new(Self {
            bar,
            state: Mutex::new(EchoState::default()),
        })
    }

    /// Text appended by the OCR pass since the previous display update.
    fn fresh_text(&self, text: &str) -> String {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // A failure message can replace an empty display mid-OCR; page
        // blocks always open with their label.
        let fresh = match text.strip_prefix(st.shown.as_str()) {
            Some(rest) if st.ocr_active && rest.starts_with(PAGE_LABEL) => rest.to_string(),
            _ => String::new(),
        };
        st.shown = text.to_string();
        fresh
    }

    fn emit(&self, text: &str) {
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }
        match self.bar {
            Some(ref bar) => bar.println(dim(text)),
            None => eprintln!("{}", dim(text)),
        }
    }
}

impl PipelineObserver for DisplayEcho {
    fn on_status(&self, status: &str) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.ocr_active = determine_stage(status) == Stage::Ocr;
    }

    fn on_display(&self, text: &str) {
        let fresh = self.fresh_text(text);
        self.emit(&fresh);
    }

    fn on_reset(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *st = EchoState::default();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise a PDF
  pdfsum --endpoint https://summary.example.workers.dev report.pdf

  # Scanned document: OCR.space is used automatically
  OCR_SPACE_API_KEY=K8... pdfsum scan.pdf

  # Send at most 4000 characters to the endpoint
  pdfsum --max-chars 4000 paper.pdf

ENVIRONMENT VARIABLES:
  PDFSUM_ENDPOINT         Summarisation endpoint (POST {"text": ...})
  OCR_SPACE_API_KEY       OCR.space API key, used when the PDF has no text layer
  PDFSUM_OCR_ENDPOINT     Override the OCR.space endpoint
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Override log filtering (e.g. pdf_summarizer=debug)
"#;

/// Summarise PDF files through a remote summarisation endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsum",
    version,
    about = "Summarise PDF files, with OCR fallback for scanned documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Summarisation endpoint URL.
    #[arg(long, env = "PDFSUM_ENDPOINT")]
    endpoint: String,

    /// OCR.space API key.
    #[arg(long, env = "OCR_SPACE_API_KEY", hide_env_values = true)]
    ocr_key: Option<String>,

    /// OCR.space endpoint URL.
    #[arg(long, env = "PDFSUM_OCR_ENDPOINT", default_value = DEFAULT_OCR_ENDPOINT)]
    ocr_endpoint: String,

    /// OCR language code.
    #[arg(long, env = "PDFSUM_OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// Maximum characters sent to the summarisation endpoint.
    #[arg(long, env = "PDFSUM_MAX_CHARS", default_value_t = 12_000)]
    max_chars: usize,

    /// Minimum embedded-text characters before OCR is skipped.
    #[arg(long, env = "PDFSUM_MIN_CHARS", default_value_t = 10)]
    min_chars: usize,

    /// Network timeout in seconds (none by default).
    #[arg(long, env = "PDFSUM_TIMEOUT")]
    timeout: Option<u64>,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long, env = "PDFSUM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the summary.
    #[arg(short, long, env = "PDFSUM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let pipeline = Arc::new(Pipeline::from_config(config).context("Failed to set up pipeline")?);

    let (_ticker, bar) = if show_progress {
        let view = TerminalView::new();
        let bar = view.bar.clone();
        let presenter = Arc::new(ProgressPresenter::new(view));
        pipeline.subscribe(presenter.clone());
        (Some(presenter.spawn_ticker()), Some(bar))
    } else {
        (None, None)
    };
    if !cli.quiet {
        pipeline.subscribe(DisplayEcho::new(bar));
    }

    // Ctrl-C cancels the run in flight.
    {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted");
                pipeline.reset();
            }
        });
    }

    let file = InputFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let outcome = match pipeline.process_file(file).await {
        Ok(outcome) => outcome,
        Err(SummarizeError::Cancelled) => bail!("Cancelled"),
        Err(e) => return Err(e).context("Summarisation failed"),
    };

    match outcome {
        RunOutcome::Summary(summary) => print_stdout(&summary)?,
        RunOutcome::Degraded { message } => {
            if !cli.quiet {
                eprintln!("{} summary endpoint returned no summary", cyan("⚠"));
            }
            print_stdout(&message)?;
        }
        RunOutcome::Failed { message } => {
            eprintln!("{} {}", red("✘"), message);
            bail!("Summarisation failed");
        }
    }

    Ok(())
}

fn print_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `SummarizerConfig`.
fn build_config(cli: &Cli) -> Result<SummarizerConfig> {
    let mut builder = SummarizerConfig::builder()
        .summary_endpoint(cli.endpoint.clone())
        .ocr_endpoint(cli.ocr_endpoint.clone())
        .ocr_language(cli.ocr_language.clone())
        .max_input_chars(cli.max_chars)
        .min_text_chars(cli.min_chars);

    if let Some(ref key) = cli.ocr_key {
        builder = builder.ocr_api_key(key.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}
