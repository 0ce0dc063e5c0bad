//! Classifier input preprocessing.
//!
//! The resize/crop/encode sequence is fixed, not configurable: the deployed
//! classifier was trained on crops produced exactly this way, and result
//! parity requires reproducing it bit for bit.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::PreprocessError;

/// Intermediate stretch target.
pub const RESIZE_DIM: u32 = 1024;
/// Final crop edge length.
pub const CROP_DIM: u32 = 512;

/// Produces the fixed-shape PNG the classifier consumes:
///
/// 1. stretch to 1024x1024 (aspect ratio not preserved),
/// 2. crop the 512x512 region spanning the top rows, horizontally centered,
/// 3. encode losslessly as PNG.
///
/// Pure: identical input pixels always yield identical output bytes.
pub fn classifier_input(raster: &RgbImage) -> Result<Vec<u8>, PreprocessError> {
    let resized = imageops::resize(raster, RESIZE_DIM, RESIZE_DIM, FilterType::Lanczos3);

    let left = (RESIZE_DIM - CROP_DIM) / 2;
    let cropped = imageops::crop_imm(&resized, left, 0, CROP_DIM, CROP_DIM).to_image();

    let mut out = Vec::new();
    cropped
        .write_with_encoder(image::codecs::png::PngEncoder::new(&mut out))
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(out)
}
