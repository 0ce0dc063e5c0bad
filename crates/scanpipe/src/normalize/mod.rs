//! Format normalization: turn uploaded bytes into one canonical raster.
//!
//! Medical-imaging inputs are recognized by filename suffix alone; content
//! sniffing is deliberately not performed, so a mislabeled file is treated
//! as a generic raster. DICOM decoding is feature-gated: building without
//! the `dicom` feature compiles a stub whose absence is reported as
//! `CapabilityUnavailable`, distinct from a bad file.

pub mod raster;

#[cfg(feature = "dicom")]
pub mod dicom;

#[cfg(not(feature = "dicom"))]
pub mod dicom_stub;
#[cfg(not(feature = "dicom"))]
pub use dicom_stub as dicom;

use image::RgbImage;

use crate::error::NormalizeError;

/// Recognized medical-imaging filename suffixes (case-insensitive).
const DICOM_SUFFIXES: &[&str] = &[".dcm", ".dicom"];

/// Display-copy JPEG quality.
const JPEG_QUALITY: u8 = 95;

/// Whether the declared name marks a medical-imaging file.
pub fn is_dicom_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DICOM_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// A fully decoded canonical raster, independent of source format.
pub struct NormalizedImage {
    /// 8-bit RGB pixels at the source's native dimensions.
    pub raster: RgbImage,
    /// JPEG display copy, present only when the source required conversion.
    pub converted_jpeg: Option<Vec<u8>>,
}

impl NormalizedImage {
    pub fn was_converted(&self) -> bool {
        self.converted_jpeg.is_some()
    }
}

/// Normalizes uploaded bytes into the canonical raster form.
pub fn normalize(file_name: &str, data: &[u8]) -> Result<NormalizedImage, NormalizeError> {
    if is_dicom_name(file_name) {
        if !dicom::support_available() {
            return Err(NormalizeError::CapabilityUnavailable(
                "this build does not include the DICOM decoder".to_string(),
            ));
        }
        let raster = dicom::decode(data)?;
        let converted_jpeg = encode_jpeg(&raster)?;
        Ok(NormalizedImage {
            raster,
            converted_jpeg: Some(converted_jpeg),
        })
    } else {
        let raster = raster::decode(data)?;
        Ok(NormalizedImage {
            raster,
            converted_jpeg: None,
        })
    }
}

/// JPEG-encodes a raster at display quality.
pub fn encode_jpeg(raster: &RgbImage) -> Result<Vec<u8>, NormalizeError> {
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    raster
        .write_with_encoder(encoder)
        .map_err(|e| NormalizeError::EncodeFailure(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}
