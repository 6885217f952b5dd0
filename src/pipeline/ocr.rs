//! OCR fallback: render each page, upload it to OCR.space, collect text.
//!
//! Used when the document has no usable text layer (scans, photos of
//! pages). Pages go through strictly one at a time so status updates arrive
//! in page order and at most one upload is in flight.
//!
//! ## Failure policy
//!
//! A page that OCR.space cannot read (HTTP error status, malformed JSON,
//! `IsErroredOnProcessing`) contributes an empty block and the pass
//! continues. A transport failure (DNS, refused connection) aborts the run
//! with [`SummarizeError::NetworkError`]: every following page would fail
//! the same way.

use super::document::PdfDocument;
use super::encode::{encode_page, EncodedImage};
use super::{blocking, StageEvents};
use crate::config::{ImageBounds, SummarizerConfig};
use crate::error::{PageError, SummarizeError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recognises the text of one encoded page.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Page-local failures are returned as [`SummarizeError::Page`];
    /// anything else aborts the OCR pass.
    async fn recognize(
        &self,
        page_num: usize,
        image: &EncodedImage,
    ) -> Result<String, SummarizeError>;
}

/// Run the OCR pass over every page of `doc`.
///
/// The display surface is cleared first and receives each page's labelled
/// block as soon as it is recognised.
pub async fn extract_text(
    doc: &Arc<dyn PdfDocument>,
    client: &dyn OcrClient,
    bounds: ImageBounds,
    render_scale: f32,
    events: &dyn StageEvents,
) -> Result<String, SummarizeError> {
    let total_pages = doc.page_count();
    let mut text = String::new();
    events.clear_display();

    for page_num in 1..=total_pages {
        let image = blocking(doc, move |d| {
            let raster = d.render_page(page_num, render_scale)?;
            encode_page(&raster, &bounds, page_num)
        })
        .await?;

        events.status(&format!(
            "Uploading page {page_num} of {total_pages} to OCR.space..."
        ));

        let page_text = match client.recognize(page_num, &image).await {
            Ok(t) => t,
            Err(e) if e.is_page_local() => {
                warn!("{}; continuing with an empty page", e);
                String::new()
            }
            Err(e) => return Err(e),
        };

        let block = format!("--- Page {page_num} ---\n{page_text}\n\n");
        text.push_str(&block);
        events.append_display(&block);
    }

    Ok(text)
}

/// Whether an OCR pass recognised anything beyond its page labels.
pub fn has_recognized_text(ocr_text: &str) -> bool {
    ocr_text
        .lines()
        .any(|line| !line.trim().is_empty() && !is_page_label(line))
}

fn is_page_label(line: &str) -> bool {
    line.strip_prefix("--- Page ")
        .and_then(|rest| rest.strip_suffix(" ---"))
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

// ── OCR.space client ─────────────────────────────────────────────────────

/// Subset of the OCR.space response this crate reads.
#[derive(Debug, Deserialize)]
pub struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    pub parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    pub is_errored_on_processing: bool,
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    pub parsed_text: Option<String>,
}

/// Extract the page text from an OCR.space response body.
///
/// The first parsed result wins; a response without results yields "".
pub fn parse_ocr_body(page_num: usize, body: &str) -> Result<String, PageError> {
    let response: OcrSpaceResponse =
        serde_json::from_str(body).map_err(|e| PageError::InvalidOcrResponse {
            page: page_num,
            detail: e.to_string(),
        })?;

    let first = response
        .parsed_results
        .as_deref()
        .and_then(|results| results.first())
        .and_then(|r| r.parsed_text.clone());

    match first {
        Some(text) => Ok(text),
        None if response.is_errored_on_processing => Err(PageError::OcrProcessingFailed {
            page: page_num,
            detail: response
                .error_message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "no detail".to_string()),
        }),
        None => Ok(String::new()),
    }
}

/// [`OcrClient`] for the OCR.space `parse/image` API.
pub struct OcrSpaceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    language: String,
    engine: u8,
}

impl OcrSpaceClient {
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| SummarizeError::Internal(format!("HTTP client: {e}")))?;

        if config.ocr_api_key.is_none() {
            warn!("No OCR.space API key configured; OCR requests will likely be rejected");
        }

        Ok(Self {
            http,
            endpoint: config.ocr_endpoint.clone(),
            api_key: config.ocr_api_key.clone(),
            language: config.ocr_language.clone(),
            engine: config.ocr_engine,
        })
    }

    fn form(&self, page_num: usize, image: &EncodedImage) -> Result<Form, SummarizeError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("page{page_num}.jpg"))
            .mime_str("image/jpeg")
            .map_err(|e| SummarizeError::Internal(format!("multipart: {e}")))?;

        Ok(Form::new()
            .part("file", part)
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false")
            .text("OCREngine", self.engine.to_string()))
    }
}

#[async_trait]
impl OcrClient for OcrSpaceClient {
    async fn recognize(
        &self,
        page_num: usize,
        image: &EncodedImage,
    ) -> Result<String, SummarizeError> {
        info!(
            "Page {}: uploading {} bytes (q{}) to OCR",
            page_num,
            image.len(),
            image.quality
        );

        let mut request = self.http.post(&self.endpoint).multipart(self.form(page_num, image)?);
        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SummarizeError::NetworkError {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PageError::InvalidOcrResponse {
            page: page_num,
            detail: format!("failed to read body: {e}"),
        })?;

        if !status.is_success() {
            return Err(PageError::OcrRejected {
                page: page_num,
                status: status.as_u16(),
                detail: body,
            }
            .into());
        }

        let text = parse_ocr_body(page_num, &body)?;
        debug!("Page {}: OCR returned {} chars", page_num, text.len());
        Ok(text)
    }
}
