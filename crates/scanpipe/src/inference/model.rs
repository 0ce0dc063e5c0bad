//! ONNX-backed classifier.
//!
//! The session is process-wide state: loaded once on first use and reused by
//! every job in the same process. `load` fails (rather than panicking) when
//! the weights cannot be read, letting the wiring in
//! [`super::default_classifier`] fall back to the brightness reference.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::Array4;
use once_cell::sync::OnceCell;
use ort::{session::Session, value::Value};

use super::Classifier;
use crate::error::InferenceError;
use crate::preprocess::CROP_DIM;

/// Process-wide session slot. `get_or_try_init` guards concurrent first-use
/// so the weights are never loaded twice; the first successfully loaded
/// model wins for the process lifetime.
static SESSION: OnceCell<Arc<Mutex<Session>>> = OnceCell::new();

pub struct OnnxClassifier {
    session: Arc<Mutex<Session>>,
}

impl OnnxClassifier {
    /// Loads (or reuses) the process-wide session for the model at `path`.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let session = SESSION.get_or_try_init(|| {
            tracing::info!("Loading classifier model from {}", path.display());
            let session = Session::builder()
                .map_err(|e| {
                    InferenceError::Unavailable(format!("failed to create session builder: {}", e))
                })?
                .commit_from_file(path)
                .map_err(|e| {
                    InferenceError::Unavailable(format!(
                        "failed to load classifier model from {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            Ok(Arc::new(Mutex::new(session)))
        })?;

        Ok(Self {
            session: Arc::clone(session),
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, png: &[u8]) -> Result<i64, InferenceError> {
        let img = image::load_from_memory(png)
            .map_err(|e| {
                InferenceError::InvalidInput(format!(
                    "classifier input is not a decodable image: {}",
                    e
                ))
            })?
            .to_rgb8();

        let (width, height) = img.dimensions();
        if (width, height) != (CROP_DIM, CROP_DIM) {
            return Err(InferenceError::InvalidInput(format!(
                "classifier expects a {}x{} input, got {}x{}",
                CROP_DIM, CROP_DIM, width, height
            )));
        }

        // [1, H, W, 3] float tensor, raw 0-255 channel values as trained.
        let side = CROP_DIM as usize;
        let mut input = Array4::<f32>::zeros((1, side, side, 3));
        for (x, y, pixel) in img.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, y as usize, x as usize, channel]] = f32::from(pixel.0[channel]);
            }
        }

        let value = Value::from_array(input).map_err(|e| {
            InferenceError::Unavailable(format!("failed to build input tensor: {}", e))
        })?;

        let mut session = self.session.lock().map_err(|_| {
            InferenceError::Unavailable("classifier session lock poisoned".to_string())
        })?;
        let outputs = session.run(ort::inputs![value]).map_err(|e| {
            InferenceError::Unavailable(format!("classifier inference failed: {}", e))
        })?;

        let (_shape, scores) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            InferenceError::Unavailable(format!("failed to read classifier output: {}", e))
        })?;

        // Argmax over the class scores.
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (index, &score) in scores.iter().enumerate() {
            if score > best_score {
                best = index;
                best_score = score;
            }
        }
        Ok(best as i64)
    }
}
