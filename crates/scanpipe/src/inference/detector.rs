//! HTTP-backed label detector.
//!
//! Posts the JPEG-encoded canonical raster to a remote detection service.
//! The call carries a bounded execution-time budget; exceeding it is an
//! `Unavailable` failure, never a hang.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{Label, LabelDetector};
use crate::config::DetectorConfig;
use crate::error::InferenceError;

/// Wire shape of the detection service response.
#[derive(Debug, Deserialize)]
struct DetectResponse {
    labels: Vec<WireLabel>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
    confidence: f64,
}

pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    max_labels: u32,
    min_confidence: f32,
    max_payload_bytes: usize,
}

impl HttpDetector {
    pub fn from_config(config: &DetectorConfig) -> Result<Self, InferenceError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            InferenceError::Unavailable("no label detector endpoint configured".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                InferenceError::Unavailable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            max_labels: config.max_labels,
            min_confidence: config.min_confidence,
            max_payload_bytes: config.max_payload_bytes,
        })
    }
}

#[async_trait]
impl LabelDetector for HttpDetector {
    async fn detect(&self, jpeg: &[u8]) -> Result<Vec<Label>, InferenceError> {
        // Reject oversized payloads locally; the backend would anyway.
        if jpeg.len() > self.max_payload_bytes {
            return Err(InferenceError::InvalidInput(format!(
                "image payload is {} bytes, exceeding the backend limit of {} bytes",
                jpeg.len(),
                self.max_payload_bytes
            )));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("maxLabels", self.max_labels.to_string()),
                ("minConfidence", self.min_confidence.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Unavailable("label detector timed out".to_string())
                } else {
                    InferenceError::Unavailable(format!("label detector request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::InvalidInput(format!(
                "label detector rejected the image ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(InferenceError::Unavailable(format!(
                "label detector returned {}",
                status
            )));
        }

        let parsed: DetectResponse = response.json().await.map_err(|e| {
            InferenceError::Unavailable(format!("malformed detector response: {}", e))
        })?;

        Ok(parsed
            .labels
            .into_iter()
            .map(|l| Label {
                name: l.name,
                confidence: l.confidence,
            })
            .collect())
    }
}
