//! Configuration types for a summarisation pipeline.
//!
//! Every knob lives in [`SummarizerConfig`], built via its
//! [`SummarizerConfigBuilder`]. Defaults match the OCR.space free tier
//! (≈1 MB upload limit) and the input cap of the summarisation endpoint.

use crate::error::SummarizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Public OCR.space endpoint.
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Configuration for a [`crate::orchestrator::Pipeline`].
///
/// # Example
/// ```rust
/// use pdf_summarizer::SummarizerConfig;
///
/// let config = SummarizerConfig::builder()
///     .summary_endpoint("https://summary.example.workers.dev")
///     .ocr_api_key("K0000000000")
///     .max_input_chars(8000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_input_chars, 8000);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Summarisation endpoint receiving `POST {"text": ...}`. Required.
    pub summary_endpoint: String,

    /// OCR endpoint. Default: [`DEFAULT_OCR_ENDPOINT`].
    pub ocr_endpoint: String,

    /// OCR.space API key, sent as the `apikey` header.
    pub ocr_api_key: Option<String>,

    /// OCR language code. Default: `eng`.
    pub ocr_language: String,

    /// OCR.space engine number. Default: 2.
    pub ocr_engine: u8,

    /// Maximum characters submitted for summarisation. Default: 12 000.
    pub max_input_chars: usize,

    /// Minimum trimmed length for local extraction to count as a success.
    /// Shorter output triggers the OCR fallback. Default: 10.
    pub min_text_chars: usize,

    /// Upscale factor used when rasterising a page for OCR. Default: 2.0.
    pub render_scale: f32,

    /// Size and quality bounds for the JPEG uploaded to OCR.
    pub image: ImageBounds,

    /// Timeout for each HTTP request. Default: none, a hung request stalls
    /// the run until it is reset.
    pub request_timeout_secs: Option<u64>,

    /// Explicit path to the pdfium shared library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            summary_endpoint: String::new(),
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            ocr_api_key: None,
            ocr_language: "eng".to_string(),
            ocr_engine: 2,
            max_input_chars: 12_000,
            min_text_chars: 10,
            render_scale: 2.0,
            image: ImageBounds::default(),
            request_timeout_secs: None,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("summary_endpoint", &self.summary_endpoint)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("ocr_api_key", &self.ocr_api_key.as_ref().map(|_| "<redacted>"))
            .field("ocr_language", &self.ocr_language)
            .field("ocr_engine", &self.ocr_engine)
            .field("max_input_chars", &self.max_input_chars)
            .field("min_text_chars", &self.min_text_chars)
            .field("render_scale", &self.render_scale)
            .field("image", &self.image)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl SummarizerConfig {
    /// Create a new builder for `SummarizerConfig`.
    pub fn builder() -> SummarizerConfigBuilder {
        SummarizerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummarizerConfig`].
#[derive(Debug)]
pub struct SummarizerConfigBuilder {
    config: SummarizerConfig,
}

impl SummarizerConfigBuilder {
    pub fn summary_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.summary_endpoint = url.into();
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = url.into();
        self
    }

    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr_api_key = Some(key.into());
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_engine(mut self, engine: u8) -> Self {
        self.config.ocr_engine = engine.clamp(1, 3);
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n.max(1);
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn image(mut self, bounds: ImageBounds) -> Self {
        self.config.image = bounds;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummarizerConfig, SummarizeError> {
        let c = &self.config;
        if !is_http_url(&c.summary_endpoint) {
            return Err(SummarizeError::InvalidConfig(format!(
                "summary endpoint must be an http(s) URL, got '{}'",
                c.summary_endpoint
            )));
        }
        if !is_http_url(&c.ocr_endpoint) {
            return Err(SummarizeError::InvalidConfig(format!(
                "OCR endpoint must be an http(s) URL, got '{}'",
                c.ocr_endpoint
            )));
        }
        c.image.validate()?;
        Ok(self.config)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Bounds applied to each page image before it is uploaded to OCR.
///
/// Quality values are JPEG percentages (1–100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBounds {
    /// Maximum width in pixels after downscaling. Default: 1200.
    pub max_width: u32,
    /// Maximum height in pixels after downscaling. Default: 1600.
    pub max_height: u32,
    /// First JPEG quality tried. Default: 80.
    pub quality: u8,
    /// Quality decrement per re-encode. Default: 10.
    pub quality_step: u8,
    /// Quality below which no further re-encode is attempted. Default: 30.
    pub quality_floor: u8,
    /// Target upper bound on the encoded size. Default: 950 KiB.
    pub max_bytes: usize,
}

impl Default for ImageBounds {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 1600,
            quality: 80,
            quality_step: 10,
            quality_floor: 30,
            max_bytes: 950 * 1024,
        }
    }
}

impl ImageBounds {
    fn validate(&self) -> Result<(), SummarizeError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(SummarizeError::InvalidConfig(
                "image bounds must be at least 1x1 px".into(),
            ));
        }
        if self.quality_floor == 0 || self.quality > 100 || self.quality_floor > self.quality {
            return Err(SummarizeError::InvalidConfig(format!(
                "JPEG quality must satisfy 0 < floor ({}) <= quality ({}) <= 100",
                self.quality_floor, self.quality
            )));
        }
        if self.quality_step == 0 {
            return Err(SummarizeError::InvalidConfig(
                "JPEG quality step must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}
