//! Input boundary: read the user's file and decide whether it is a PDF.
//!
//! The MIME type is sniffed from the `%PDF` magic bytes first and guessed
//! from the file extension otherwise, so a renamed PDF is still accepted
//! and a `.pdf` that is really a PNG is still rejected by the parser later.

use crate::error::SummarizeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The only MIME type the pipeline accepts.
pub const PDF_MIME: &str = "application/pdf";

/// A file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl InputFile {
    /// Build an input from memory with an explicit MIME type.
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// Read `path` and detect its MIME type.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SummarizeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => SummarizeError::PermissionDenied {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::NotFound => SummarizeError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => SummarizeError::Internal(format!("Failed to read '{}': {e}", path.display())),
        })?;

        let mime = detect_mime(path, &bytes);
        debug!("Read {} ({} bytes, {})", path.display(), bytes.len(), mime);

        Ok(Self {
            name: file_name(path),
            mime,
            bytes: Arc::from(bytes),
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }
}

/// MIME type from magic bytes, then extension.
pub fn detect_mime(path: &Path, bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF") {
        return PDF_MIME.to_string();
    }
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}
