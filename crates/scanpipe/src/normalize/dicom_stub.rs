//! Stub compiled when the `dicom` feature is disabled.
//!
//! Keeps the module surface identical so callers can check availability at
//! runtime and report the missing capability instead of a decode failure.

use image::RgbImage;

use crate::error::NormalizeError;

/// DICOM decoding is not part of this build.
pub const fn support_available() -> bool {
    false
}

pub fn decode(_data: &[u8]) -> Result<RgbImage, NormalizeError> {
    Err(NormalizeError::CapabilityUnavailable(
        "this build does not include the DICOM decoder".to_string(),
    ))
}
