//! Local extraction: read the embedded text layer page by page.

use super::document::PdfDocument;
use super::{blocking, StageEvents};
use crate::error::SummarizeError;
use std::sync::Arc;
use tracing::debug;

/// Concatenate the text layer of every page.
///
/// Each page's fragments are joined with single spaces and followed by a
/// blank line; the final buffer is trimmed. Any page failure aborts the
/// whole pass with [`SummarizeError::ExtractionError`].
pub async fn extract_text(
    doc: &Arc<dyn PdfDocument>,
    events: &dyn StageEvents,
) -> Result<String, SummarizeError> {
    let total_pages = doc.page_count();
    let mut text = String::new();

    for page_num in 1..=total_pages {
        events.status(&format!(
            "Extracting text from page {page_num} of {total_pages}..."
        ));

        let fragments = blocking(doc, move |d| d.page_text(page_num))
            .await
            .map_err(|e| match e {
                e @ SummarizeError::ExtractionError { .. } => e,
                other => SummarizeError::ExtractionError {
                    page: page_num,
                    detail: other.to_string(),
                },
            })?;

        let page_text = fragments.join(" ");
        debug!("Page {}: {} chars of embedded text", page_num, page_text.len());
        text.push_str(&page_text);
        text.push_str("\n\n");
    }

    Ok(text.trim().to_string())
}
