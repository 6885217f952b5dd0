//! Summarisation endpoint client.
//!
//! The endpoint takes `POST {"text": "..."}` and answers `{"summary": "..."}`.
//! Three failure kinds are kept apart because the operator fixes each one
//! differently: [`SummarizeError::ApiError`] (endpoint refused, carries the
//! status and raw body), [`SummarizeError::InvalidResponse`] (2xx without a
//! summary, carries the parsed body) and [`SummarizeError::NetworkError`]
//! (endpoint unreachable).

use crate::config::SummarizerConfig;
use crate::error::SummarizeError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces a summary for already-truncated text.
#[async_trait]
pub trait SummaryClient: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

#[derive(Debug, Serialize)]
struct SummaryRequest<'a> {
    text: &'a str,
}

/// Classify an HTTP answer from the summarisation endpoint.
pub fn classify_response(status: u16, body: &str) -> Result<String, SummarizeError> {
    if !(200..300).contains(&status) {
        return Err(SummarizeError::ApiError {
            status,
            body: body.to_string(),
        });
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .unwrap_or_else(|_| serde_json::Value::String(body.to_string()));

    match value.get("summary") {
        Some(serde_json::Value::String(summary)) => Ok(summary.clone()),
        _ => {
            warn!("Summary endpoint answered {} without a summary field", status);
            Err(SummarizeError::InvalidResponse { body: value })
        }
    }
}

/// [`SummaryClient`] posting JSON to a configured URL.
pub struct HttpSummaryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSummaryClient {
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizeError> {
        if config.summary_endpoint.is_empty() {
            return Err(SummarizeError::InvalidConfig(
                "no summary endpoint configured".into(),
            ));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| SummarizeError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.summary_endpoint.clone(),
        })
    }

    fn network_error(&self, e: reqwest::Error) -> SummarizeError {
        SummarizeError::NetworkError {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl SummaryClient for HttpSummaryClient {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        info!("Requesting summary for {} chars", text.chars().count());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&SummaryRequest { text })
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.network_error(e))?;
        debug!("Summary endpoint: HTTP {} ({} bytes)", status, body.len());

        classify_response(status, &body)
    }
}
