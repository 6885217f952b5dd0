//! Image encoding: rendered page → size-bounded JPEG for OCR upload.
//!
//! OCR.space rejects uploads over ~1 MB on the free tier, so the encoder
//! first caps the pixel dimensions and then walks the JPEG quality down
//! until the blob fits. JPEG is used instead of PNG because scanned pages
//! compress an order of magnitude smaller at quality 80.

use crate::config::ImageBounds;
use crate::error::SummarizeError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// A JPEG ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    /// JPEG quality (percent) of the final encode.
    pub quality: u8,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Downscale `img` into `bounds` and encode it as a JPEG no larger than
/// `bounds.max_bytes` when the quality floor allows it.
pub fn encode_page(
    img: &DynamicImage,
    bounds: &ImageBounds,
    page_num: usize,
) -> Result<EncodedImage, SummarizeError> {
    let (width, height) = fit_within(img.width(), img.height(), bounds);
    let rgb = if (width, height) != (img.width(), img.height()) {
        img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
    } else {
        img.to_rgb8()
    };

    let mut quality = bounds.quality;
    let mut bytes = encode_jpeg(&rgb, quality, page_num)?;
    while bytes.len() > bounds.max_bytes && quality > bounds.quality_floor {
        quality = quality
            .saturating_sub(bounds.quality_step)
            .max(bounds.quality_floor);
        bytes = encode_jpeg(&rgb, quality, page_num)?;
    }

    debug!(
        "Page {}: {}x{} px JPEG q{} → {} bytes",
        page_num,
        width,
        height,
        quality,
        bytes.len()
    );

    Ok(EncodedImage {
        bytes,
        quality,
        width,
        height,
    })
}

/// Target dimensions: unchanged when within bounds, otherwise scaled by
/// `min(max_w / w, max_h / h)` and truncated to whole pixels.
pub fn fit_within(width: u32, height: u32, bounds: &ImageBounds) -> (u32, u32) {
    if width <= bounds.max_width && height <= bounds.max_height {
        return (width, height);
    }
    let scale = f64::min(
        bounds.max_width as f64 / width as f64,
        bounds.max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale) as u32).max(1);
    let h = ((height as f64 * scale) as u32).max(1);
    (w, h)
}

fn encode_jpeg(
    rgb: &image::RgbImage,
    quality: u8,
    page_num: usize,
) -> Result<Vec<u8>, SummarizeError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(rgb)
        .map_err(|e| SummarizeError::RasterisationFailed {
            page: page_num,
            detail: format!("JPEG encoding failed: {e}"),
        })?;
    Ok(buf)
}
