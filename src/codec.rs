//! Base64 and raster conversions shared by the tool service and the query side.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

use crate::error::SearchError;

/// Reads a file and returns its bytes as a base64 string.
pub fn file_to_base64(path: &Path) -> Result<String, SearchError> {
    let bytes = std::fs::read(path)?;
    Ok(STANDARD.encode(bytes))
}

/// Decodes a base64 image payload into a three channel raster.
pub fn base64_to_rgb(b64: &str) -> Result<RgbImage, SearchError> {
    let bytes = STANDARD.decode(b64.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}

/// Encodes a raster as PNG bytes.
pub fn rgb_to_png(image: &RgbImage) -> Result<Vec<u8>, SearchError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn rgb_to_base64(image: &RgbImage) -> Result<String, SearchError> {
    Ok(STANDARD.encode(rgb_to_png(image)?))
}
