//! Acquisition boundary: decoded source images and PNG encoding.
//!
//! The pipeline never reads files on its own. Callers hand it a decoded
//! raster (or raw bytes / a path, decoded here once) and the source stays
//! read-only for the whole scan.

use crate::error::ScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// An immutable decoded image shared by every stage of a scan.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: Arc<DynamicImage>,
}

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image: Arc::new(image) }
    }

    /// Decode PNG/JPEG/etc. bytes (format sniffed from the header).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ScanError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::new(image))
    }

    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let image = image::open(path)?;
        Ok(Self::new(image))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// True when the source carries more than one colour channel.
    pub fn is_color(&self) -> bool {
        self.image.color().has_color()
    }

    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Encode any image as PNG bytes for the engine or the debug artifact.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// PNG data URI for presentation layers (`data:image/png;base64,...`).
pub fn png_data_uri(image: &DynamicImage) -> Result<String, image::ImageError> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Copy out a rectangle, clamped to the image bounds.
///
/// Returns `None` when the clamped rectangle is empty.
pub fn crop_clamped(image: &DynamicImage, x: u32, y: u32, w: u32, h: u32) -> Option<DynamicImage> {
    let (iw, ih) = image.dimensions();
    if x >= iw || y >= ih {
        return None;
    }
    let w = w.min(iw - x);
    let h = h.min(ih - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(image.crop_imm(x, y, w, h))
}
