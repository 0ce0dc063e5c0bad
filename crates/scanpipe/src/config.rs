//! Runtime configuration, loaded from a JSON file.
//!
//! Every field has a default so a partial (or absent) config file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root directory of the object store (uploads and converted copies).
    pub data_dir: PathBuf,
    /// Path of the SQLite job-record database.
    pub database_path: PathBuf,
    pub detector: DetectorConfig,
    pub classifier: ClassifierConfig,
    /// Lifetime of generated display URLs, in seconds.
    pub display_url_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_path: PathBuf::from("./data/scanpipe.db"),
            detector: DetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            display_url_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectorConfig {
    /// Label-detection service endpoint. Without one, detection reports the
    /// backend as unavailable.
    pub endpoint: Option<String>,
    /// Maximum number of labels requested per image.
    pub max_labels: u32,
    /// Minimum confidence (0-100) requested from the backend.
    pub min_confidence: f32,
    /// Execution-time budget for one detector call.
    pub timeout_secs: u64,
    /// Largest accepted JPEG payload; bigger images are rejected locally.
    pub max_payload_bytes: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_labels: 20,
            min_confidence: 70.0,
            timeout_secs: 25,
            max_payload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    /// Path of the exported model weights. When absent (or when the model
    /// fails to load) the brightness reference classifier is used.
    pub model_path: Option<PathBuf>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&config.detector.min_confidence) {
        return Err(ConfigError::Validation {
            message: format!(
                "detector.minConfidence must be within [0, 100], got {}",
                config.detector.min_confidence
            ),
        });
    }
    if config.detector.max_labels == 0 {
        return Err(ConfigError::Validation {
            message: "detector.maxLabels must be at least 1".to_string(),
        });
    }
    if config.detector.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "detector.timeoutSecs must be at least 1".to_string(),
        });
    }
    Ok(())
}
