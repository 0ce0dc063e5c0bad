use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanpipeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Object storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Numeric codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Failures while turning uploaded bytes into the canonical raster.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// The bytes are unreadable in their declared or detected format.
    #[error("Failed to decode image: {0}")]
    DecodeFailure(String),

    /// The decode capability itself is missing in this environment, as
    /// opposed to the file being bad.
    #[error("DICOM decoding is not available: {0}")]
    CapabilityUnavailable(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailure(String),
}

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to encode classifier input: {0}")]
    Encode(String),
}

/// Failures reported by an inference backend. The gateway performs no
/// retries; each variant maps 1:1 to a terminal job error.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Transport, capacity or timeout failure of the backend call.
    #[error("Inference backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the payload; the message names the violated
    /// constraint.
    #[error("Inference input rejected: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    WriteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{key}': {source}")]
    ReadObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Cannot encode non-finite number {0} as a decimal")]
    NonFinite(f64),

    #[error("Invalid decimal literal '{0}'")]
    InvalidDecimal(String),
}

pub type Result<T> = std::result::Result<T, ScanpipeError>;
