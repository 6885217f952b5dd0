//! pdfium backend for [`PdfEngine`]: text layer and page rasterisation.
//!
//! `pdfium-render` wraps the pdfium C++ library. With the `thread_safe`
//! feature every call is serialised internally, so the backend may be used
//! from any blocking-pool thread. A `PdfDocument<'a>` borrows both the
//! bindings and the byte buffer, so [`PdfiumDocument`] keeps the bytes and
//! re-opens the document for each page operation; the shared library itself
//! is loaded once per process by the OS loader.

use super::document::{PdfDocument, PdfEngine};
use crate::error::SummarizeError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// [`PdfEngine`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Create an engine, verifying that pdfium can be bound.
    ///
    /// Discovery order:
    /// 1. `lib_path` (from [`crate::SummarizerConfig::pdfium_lib_path`])
    /// 2. `PDFIUM_LIB_PATH` env var
    /// 3. Alongside the running executable
    /// 4. System library search paths
    pub fn new(lib_path: Option<PathBuf>) -> Result<Self, SummarizeError> {
        let engine = Self { lib_path };
        let _ = engine.bind()?;
        Ok(engine)
    }

    fn bind(&self) -> Result<Pdfium, SummarizeError> {
        load_pdfium(self.lib_path.as_deref())
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(&self, bytes: Arc<[u8]>) -> Result<Arc<dyn PdfDocument>, SummarizeError> {
        let pdfium = self.bind()?;
        let page_count = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(map_load_error)?;
            document.pages().len() as usize
        };
        info!("PDF loaded: {} pages", page_count);

        Ok(Arc::new(PdfiumDocument {
            engine: self.clone(),
            bytes,
            page_count,
        }))
    }
}

/// A PDF opened through [`PdfiumEngine`].
pub struct PdfiumDocument {
    engine: PdfiumEngine,
    bytes: Arc<[u8]>,
    page_count: usize,
}

impl PdfiumDocument {
    fn with_page<T>(
        &self,
        page_num: usize,
        on_error: impl Fn(String) -> SummarizeError,
        op: impl FnOnce(&PdfPage<'_>) -> Result<T, SummarizeError>,
    ) -> Result<T, SummarizeError> {
        let pdfium = self.engine.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(map_load_error)?;

        if page_num == 0 || page_num > self.page_count {
            return Err(on_error(format!(
                "page out of range (document has {} pages)",
                self.page_count
            )));
        }
        let index = u16::try_from(page_num - 1)
            .map_err(|_| on_error(format!("page index {page_num} exceeds u16 maximum")))?;

        let page = document
            .pages()
            .get(index)
            .map_err(|e| on_error(format!("{e:?}")))?;
        op(&page)
    }
}

impl PdfDocument for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page_num: usize) -> Result<Vec<String>, SummarizeError> {
        let on_error = |detail| SummarizeError::ExtractionError {
            page: page_num,
            detail,
        };
        self.with_page(page_num, on_error, |page| {
            let text = page.text().map_err(|e| on_error(format!("{e:?}")))?;
            let fragments: Vec<String> = text
                .segments()
                .iter()
                .map(|segment| segment.text())
                .collect();
            debug!("Page {}: {} text fragments", page_num, fragments.len());
            Ok(fragments)
        })
    }

    fn render_page(&self, page_num: usize, scale: f32) -> Result<DynamicImage, SummarizeError> {
        let on_error = |detail| SummarizeError::RasterisationFailed {
            page: page_num,
            detail,
        };
        self.with_page(page_num, on_error, |page| {
            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| on_error(format!("{e:?}")))?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            Ok(image)
        })
    }
}

/// Bind to the pdfium dynamic library.
fn load_pdfium(explicit: Option<&Path>) -> Result<Pdfium, SummarizeError> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    if let Some(path) = explicit {
        debug!(path = %path.display(), "Binding pdfium from explicit path");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            SummarizeError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "Bound pdfium next to executable");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| SummarizeError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Map a pdfium load failure, keeping the password case recognisable.
fn map_load_error(e: PdfiumError) -> SummarizeError {
    let detail = format!("{e:?}");
    if detail.to_lowercase().contains("password") {
        SummarizeError::ParseError {
            detail: format!("document is encrypted ({detail})"),
        }
    } else {
        SummarizeError::ParseError { detail }
    }
}
