//! DICOM decoding: structured pixel data to an 8-bit RGB raster.
//!
//! Single-frame only; for multi-frame objects the first frame is used.
//! Intensities are mapped to the 8-bit display range with a min-max rescale,
//! so repeated decodes of the same object are byte-identical.

use dicom_pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption};
use image::RgbImage;

use crate::error::NormalizeError;

/// Whether DICOM decoding is available in this build. The disabled build
/// compiles a stub returning `false` (see `dicom_stub`).
pub const fn support_available() -> bool {
    true
}

/// DICOM part-10 files begin with a 128-byte preamble before the "DICM"
/// magic; the reader expects the stream to start at the magic.
fn strip_preamble(data: &[u8]) -> &[u8] {
    if data.len() >= 132 && &data[128..132] == b"DICM" {
        &data[128..]
    } else {
        data
    }
}

/// Decodes a single-frame DICOM object into 8-bit RGB.
pub fn decode(data: &[u8]) -> Result<RgbImage, NormalizeError> {
    let obj = dicom_object::from_reader(strip_preamble(data))
        .map_err(|e| NormalizeError::DecodeFailure(format!("unreadable DICOM object: {}", e)))?;

    let decoded = obj.decode_pixel_data().map_err(|e| {
        NormalizeError::DecodeFailure(format!("DICOM pixel data decode failed: {}", e))
    })?;

    // Min-max rescale into the display range, frame 0 only.
    let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Normalize);
    let frame = decoded
        .to_dynamic_image_with_options(0, &options)
        .map_err(|e| {
            NormalizeError::DecodeFailure(format!("DICOM frame conversion failed: {}", e))
        })?;

    Ok(frame.to_rgb8())
}
