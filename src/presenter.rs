//! Progress timeline derived from pipeline status lines.
//!
//! The presenter never drives the pipeline: it only listens. Each status
//! line is classified into one of three stages, and a `page N of M`
//! fragment moves the bar within the stage's band:
//!
//! ```text
//!   0    6          38  44        72  76      94 95  100
//!   |----[ extract  ]---[   OCR   ]---[summary]--|----|
//!        stage 1        stage 2       stage 3   cap  done
//! ```
//!
//! While a run is in flight the summary area is obscured by a scrambled
//! copy of the current status. [`ProgressPresenter::spawn_ticker`] refreshes
//! that placeholder and collapses the finished timeline after a short
//! delay. Rendering is delegated to a [`ProgressView`].

use crate::orchestrator::RunOutcome;
use crate::progress::PipelineObserver;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Number of steps shown on the timeline.
pub const STEP_COUNT: usize = 3;

/// Bar position never passes this before completion.
pub const PROGRESS_CAP: f32 = 95.0;

/// Placeholder refresh period.
pub const SCRAMBLE_INTERVAL: Duration = Duration::from_millis(320);

/// Delay between completion and the timeline collapsing.
pub const COLLAPSE_DELAY: Duration = Duration::from_millis(600);

const SCRAMBLE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789#$%&";
const DEFAULT_RATIO: f32 = 0.25;

static PAGE_PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)page\s+(\d+)\s+of\s+(\d+)").expect("valid regex"));

/// Timeline step a status line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Ocr,
    Summarizing,
}

impl Stage {
    /// 1-based position on the timeline.
    pub fn number(self) -> usize {
        match self {
            Stage::Extracting => 1,
            Stage::Ocr => 2,
            Stage::Summarizing => 3,
        }
    }

    /// `(base, range)` of the stage's percent band.
    pub fn band(self) -> (f32, f32) {
        match self {
            Stage::Extracting => (6.0, 32.0),
            Stage::Ocr => (44.0, 28.0),
            Stage::Summarizing => (76.0, 18.0),
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            Stage::Summarizing => "Generating AI summary…",
            _ => "Processing your PDF…",
        }
    }
}

/// Classify a status line.
pub fn determine_stage(status: &str) -> Stage {
    let normalized = status.to_lowercase();
    if normalized.contains("generating ai summary") {
        Stage::Summarizing
    } else if normalized.contains("ocr") {
        Stage::Ocr
    } else {
        Stage::Extracting
    }
}

/// `N / M` from a `page N of M` fragment, clamped to `[0, 1]`.
pub fn parse_page_progress(status: &str) -> Option<f32> {
    let caps = PAGE_PROGRESS.captures(status)?;
    let current: f64 = caps[1].parse().ok()?;
    let total: f64 = caps[2].parse().ok()?;
    if !current.is_finite() || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some((current / total).clamp(0.0, 1.0) as f32)
}

/// Uncapped bar position for `status` within `stage`'s band.
pub fn compute_progress(stage: Stage, status: &str) -> f32 {
    let (base, range) = stage.band();
    base + range * parse_page_progress(status).unwrap_or(DEFAULT_RATIO)
}

/// Replace every non-whitespace char with a random glyph.
pub fn scramble<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    text.chars()
        .map(|c| {
            if c.is_whitespace() {
                c
            } else {
                SCRAMBLE_CHARS[rng.gen_range(0..SCRAMBLE_CHARS.len())] as char
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Upcoming,
    Active,
    Complete,
}

fn step_states(stage: usize) -> [StepState; STEP_COUNT] {
    let mut steps = [StepState::Upcoming; STEP_COUNT];
    for (i, step) in steps.iter_mut().enumerate() {
        let position = i + 1;
        *step = if stage > STEP_COUNT || position < stage {
            StepState::Complete
        } else if position == stage {
            StepState::Active
        } else {
            StepState::Upcoming
        };
    }
    steps
}

/// Everything a view needs to draw the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Timeline shown at all.
    pub visible: bool,
    /// 0 when idle, otherwise 1..=3.
    pub stage: usize,
    pub percent: f32,
    pub steps: [StepState; STEP_COUNT],
    pub status: String,
    pub heading: &'static str,
    /// Summary area hidden behind `placeholder`.
    pub obscured: bool,
    pub placeholder: String,
    pub completed: bool,
    pub reset_enabled: bool,
    pub upload_visible: bool,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            visible: false,
            stage: 0,
            percent: 0.0,
            steps: [StepState::Upcoming; STEP_COUNT],
            status: "Initializing…".to_string(),
            heading: Stage::Extracting.heading(),
            obscured: false,
            placeholder: String::new(),
            completed: false,
            reset_enabled: false,
            upload_visible: true,
        }
    }
}

/// Draws snapshots. Called with every change.
pub trait ProgressView: Send + Sync {
    fn render(&self, snapshot: &ProgressSnapshot);
}

struct PresenterState {
    snap: ProgressSnapshot,
    source_text: String,
    collapse_at: Option<Instant>,
    rng: StdRng,
}

/// Observer that turns pipeline events into timeline snapshots.
pub struct ProgressPresenter {
    view: Arc<dyn ProgressView>,
    state: Mutex<PresenterState>,
}

impl ProgressPresenter {
    pub fn new(view: Arc<dyn ProgressView>) -> Self {
        Self::with_rng(view, StdRng::from_entropy())
    }

    /// Presenter with a fixed scramble source, for reproducible output.
    pub fn with_rng(view: Arc<dyn ProgressView>, rng: StdRng) -> Self {
        Self {
            view,
            state: Mutex::new(PresenterState {
                snap: ProgressSnapshot::default(),
                source_text: "Processing summary".to_string(),
                collapse_at: None,
                rng,
            }),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snap.clone()
    }

    /// Show the timeline at stage 1. No-op while already shown.
    pub fn start_timeline(&self) {
        let mut st = self.lock();
        if Self::start_locked(&mut st) {
            self.render(st);
        }
    }

    /// Advance the timeline for a new status line.
    pub fn update_timeline(&self, status: &str) {
        if status.is_empty() {
            return;
        }
        let mut st = self.lock();
        Self::start_locked(&mut st);

        let stage = determine_stage(status);
        let percent = compute_progress(stage, status).min(PROGRESS_CAP);
        debug!("Progress: stage {} at {:.1}%", stage.number(), percent);

        st.snap.stage = stage.number();
        st.snap.steps = step_states(stage.number());
        st.snap.percent = percent;
        st.snap.status = status.to_string();
        st.snap.heading = stage.heading();
        if st.snap.obscured {
            st.source_text = status.to_string();
            Self::rescramble(&mut st);
        }
        self.render(st);
    }

    /// Mark every step complete and reveal the summary area.
    ///
    /// Ignored unless the timeline is shown and not yet complete.
    pub fn complete_timeline(&self, message: Option<&str>) {
        let mut st = self.lock();
        if !st.snap.visible || st.snap.completed {
            return;
        }
        st.snap.completed = true;
        st.snap.steps = step_states(STEP_COUNT + 1);
        st.snap.percent = 100.0;
        st.snap.status = message.unwrap_or("Summary ready").to_string();
        st.snap.obscured = false;
        st.snap.placeholder.clear();
        st.snap.reset_enabled = true;
        st.collapse_at = Some(Instant::now() + COLLAPSE_DELAY);
        self.render(st);
    }

    /// Back to the initial, hidden timeline.
    pub fn reset_timeline(&self) {
        let mut st = self.lock();
        st.snap = ProgressSnapshot::default();
        st.collapse_at = None;
        self.render(st);
    }

    /// Periodic work: refresh the placeholder while obscured and collapse
    /// a completed timeline once its delay has passed.
    pub fn tick(&self, now: Instant) {
        let mut st = self.lock();
        let mut changed = false;

        if st.snap.obscured {
            Self::rescramble(&mut st);
            changed = true;
        }
        if st.collapse_at.is_some_and(|at| now >= at) {
            st.collapse_at = None;
            st.snap.visible = false;
            st.snap.stage = 0;
            st.snap.percent = 0.0;
            st.snap.steps = [StepState::Upcoming; STEP_COUNT];
            changed = true;
        }

        if changed {
            self.render(st);
        }
    }

    /// Drive [`Self::tick`] every [`SCRAMBLE_INTERVAL`] until the presenter
    /// is dropped.
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SCRAMBLE_INTERVAL);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(presenter) => presenter.tick(Instant::now()),
                    None => break,
                }
            }
        })
    }

    fn start_locked(st: &mut PresenterState) -> bool {
        if st.snap.visible && !st.snap.completed {
            return false;
        }
        let (base, _) = Stage::Extracting.band();
        st.snap = ProgressSnapshot {
            visible: true,
            stage: 1,
            percent: base,
            steps: step_states(1),
            status: st.snap.status.clone(),
            heading: Stage::Extracting.heading(),
            obscured: true,
            placeholder: String::new(),
            completed: false,
            reset_enabled: false,
            upload_visible: false,
        };
        st.collapse_at = None;
        st.source_text = "Preparing summary".to_string();
        Self::rescramble(st);
        true
    }

    fn rescramble(st: &mut PresenterState) {
        let PresenterState {
            snap,
            source_text,
            rng,
            ..
        } = st;
        snap.placeholder = scramble(source_text, rng);
    }

    fn render(&self, st: MutexGuard<'_, PresenterState>) {
        let snap = st.snap.clone();
        drop(st);
        self.view.render(&snap);
    }

    fn lock(&self) -> MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PipelineObserver for ProgressPresenter {
    fn on_run_start(&self) {
        self.start_timeline();
    }

    fn on_status(&self, status: &str) {
        self.update_timeline(status);
    }

    fn on_done(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Summary(_) => self.complete_timeline(None),
            RunOutcome::Degraded { .. } => self.complete_timeline(Some("No summary returned")),
            // A failed run is followed by a reset.
            RunOutcome::Failed { .. } => {}
        }
    }

    fn on_reset(&self) {
        self.reset_timeline();
    }
}
