//! Reference classifier: mean-brightness threshold.
//!
//! This establishes the exact call contract a trained-model backend must
//! honor as a drop-in replacement: fixed-size PNG in, single integer out.

use image::imageops::FilterType;

use super::Classifier;
use crate::error::InferenceError;

/// Downscale edge used before averaging; keeps the reference cheap.
const SAMPLE_DIM: u32 = 64;
/// Mean-intensity decision threshold.
const THRESHOLD: f64 = 127.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct BrightnessClassifier;

impl Classifier for BrightnessClassifier {
    fn classify(&self, png: &[u8]) -> Result<i64, InferenceError> {
        let img = image::load_from_memory(png).map_err(|e| {
            InferenceError::InvalidInput(format!(
                "classifier input is not a decodable image: {}",
                e
            ))
        })?;

        let small = img
            .grayscale()
            .resize_exact(SAMPLE_DIM, SAMPLE_DIM, FilterType::Triangle)
            .to_luma8();

        let sum: u64 = small.pixels().map(|p| u64::from(p.0[0])).sum();
        let mean = sum as f64 / f64::from(SAMPLE_DIM * SAMPLE_DIM);

        Ok(if mean > THRESHOLD { 1 } else { 0 })
    }
}
