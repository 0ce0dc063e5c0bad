//! Generic raster decoding via the embedded format signature.

use image::RgbImage;

use crate::error::NormalizeError;

/// Decodes ordinary raster bytes (JPEG, PNG, ...) into 8-bit RGB.
pub fn decode(data: &[u8]) -> Result<RgbImage, NormalizeError> {
    let img = image::load_from_memory(data)
        .map_err(|e| NormalizeError::DecodeFailure(format!("unreadable raster image: {}", e)))?;
    Ok(img.to_rgb8())
}
