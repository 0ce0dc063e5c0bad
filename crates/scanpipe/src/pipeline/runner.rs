//! The job state machine.
//!
//! One `process` call takes one upload event from `pending` to a terminal
//! record state. Stages run strictly sequentially, since each depends on the
//! previous stage's output, and every failure is caught here and mapped to
//! a terminal `error` record; nothing propagates past this boundary.

use std::sync::Arc;

use tracing::{error, info_span, warn, Instrument};

use crate::codec::Decimal;
use crate::config::Config;
use crate::db::job_repo::{self, CompletionFields, StoredLabel};
use crate::db::Database;
use crate::error::{
    CodecError, InferenceError, NormalizeError, PreprocessError, ScanpipeError, StoreError,
};
use crate::inference::{self, Classifier, LabelDetector};
use crate::normalize;
use crate::preprocess;
use crate::storage::{self, FsObjectStore};

use super::context::{JobContext, UploadEvent};

/// Failure of one processing stage, tagged so the error record names the
/// stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Reading the uploaded object failed: {0}")]
    FetchSource(StoreError),

    #[error("Image normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Storing the converted image failed: {0}")]
    StoreConverted(StoreError),

    #[error("Label detection failed: {0}")]
    Detect(InferenceError),

    #[error("Classifier preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Classification failed: {0}")]
    Classify(InferenceError),
}

/// What happened to the job, as written to the record store.
#[derive(Debug)]
pub enum JobOutcome {
    /// Terminal `complete` written.
    Complete { labels: usize, converted: bool },
    /// Terminal `error` written.
    Error { message: String },
    /// A terminal state was reached but the record write itself failed; the
    /// job remains `pending` for operator intervention or a re-trigger.
    WritePending { message: String },
}

pub struct Orchestrator {
    db: Database,
    store: FsObjectStore,
    detector: Arc<dyn LabelDetector>,
    classifier: Arc<dyn Classifier>,
    display_url_ttl_secs: u64,
}

impl Orchestrator {
    /// Constructor with injected backends. Production wiring goes through
    /// `from_config`; tests inject mocks here.
    pub fn new(
        db: Database,
        store: FsObjectStore,
        detector: Arc<dyn LabelDetector>,
        classifier: Arc<dyn Classifier>,
        display_url_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            store,
            detector,
            classifier,
            display_url_ttl_secs,
        }
    }

    /// Production constructor — builds all backends from config.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, ScanpipeError> {
        let store = FsObjectStore::new(&config.data_dir);
        let detector = inference::HttpDetector::from_config(&config.detector)?;
        let classifier = inference::default_classifier(config.classifier.model_path.as_deref());

        Ok(Self::new(
            db,
            store,
            Arc::new(detector),
            classifier,
            config.display_url_ttl_secs,
        ))
    }

    /// Processes one upload event to its terminal record state.
    pub async fn process(&self, event: UploadEvent) -> JobOutcome {
        let span = info_span!("job", job_id = %event.job_id, file = %event.file_name);
        self.process_inner(event).instrument(span).await
    }

    async fn process_inner(&self, event: UploadEvent) -> JobOutcome {
        let mut ctx = JobContext::new(event);

        match self.run_stages(&mut ctx).await {
            Ok(fields) => {
                let labels = fields.labels.len();
                let converted = fields.converted_key.is_some();
                match job_repo::mark_complete(
                    &self.db,
                    &ctx.event.job_id,
                    &ctx.event.source_key,
                    &ctx.event.file_name,
                    &fields,
                ) {
                    Ok(()) => JobOutcome::Complete { labels, converted },
                    Err(db_err) => {
                        // Deliberately not converted into another record
                        // write; the job stays pending and recoverable.
                        error!(
                            "job {}: completion write failed, record left pending: {}",
                            ctx.event.job_id, db_err
                        );
                        JobOutcome::WritePending {
                            message: db_err.to_string(),
                        }
                    }
                }
            }
            Err(stage) => {
                let message = stage.to_string();
                warn!("job {} failed: {}", ctx.event.job_id, message);
                match job_repo::mark_error(
                    &self.db,
                    &ctx.event.job_id,
                    &ctx.event.source_key,
                    &ctx.event.file_name,
                    &message,
                ) {
                    Ok(()) => JobOutcome::Error { message },
                    Err(db_err) => {
                        error!(
                            "job {}: error-state write failed, record left pending: {}",
                            ctx.event.job_id, db_err
                        );
                        JobOutcome::WritePending {
                            message: db_err.to_string(),
                        }
                    }
                }
            }
        }
    }

    /// Runs the processing stages in dependency order and assembles the
    /// fields of the `complete` transition.
    async fn run_stages(&self, ctx: &mut JobContext) -> Result<CompletionFields, StageError> {
        // Stage 1: fetch the uploaded bytes.
        let data = {
            let _step = info_span!("fetch_source").entered();
            self.store
                .get(&ctx.event.source_key)
                .map_err(StageError::FetchSource)?
        };

        // Stage 2: normalize to the canonical raster.
        let normalized = {
            let _step = info_span!("normalize").entered();
            normalize::normalize(&ctx.event.file_name, &data)?
        };

        // Stage 3: persist the display copy for converted inputs.
        if let Some(jpeg) = &normalized.converted_jpeg {
            let _step = info_span!("store_converted").entered();
            let key = storage::converted_key(&ctx.event.job_id);
            self.store
                .put(&key, jpeg)
                .map_err(StageError::StoreConverted)?;
            let url = self
                .store
                .display_url(&key, self.display_url_ttl_secs)
                .map_err(StageError::StoreConverted)?;
            ctx.converted_key = Some(key);
            ctx.display_url = Some(url);
        }

        // Stage 4: both inference calls. Each is attempted regardless of
        // the other's outcome; either failure forces the error transition.
        let detector_jpeg = match &normalized.converted_jpeg {
            Some(jpeg) => jpeg.clone(),
            None => normalize::encode_jpeg(&normalized.raster)?,
        };
        let detect_result = self
            .detector
            .detect(&detector_jpeg)
            .instrument(info_span!("detect_labels"))
            .await;

        let classify_result = {
            let _step = info_span!("classify").entered();
            preprocess::classifier_input(&normalized.raster)
                .map_err(StageError::from)
                .and_then(|png| self.classifier.classify(&png).map_err(StageError::Classify))
        };

        let labels = detect_result.map_err(StageError::Detect)?;
        let class_flag = classify_result?;

        // Stage 5: pass every numeric leaf through the codec.
        let stored_labels = labels
            .iter()
            .map(|label| {
                Ok(StoredLabel {
                    name: label.name.clone(),
                    confidence: Decimal::encode(label.confidence)?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()
            .map_err(|e| {
                StageError::Detect(InferenceError::InvalidInput(format!(
                    "backend returned a non-encodable confidence: {}",
                    e
                )))
            })?;

        Ok(CompletionFields {
            labels: stored_labels,
            class_flag: Decimal::encode_int(class_flag),
            converted_key: ctx.converted_key.clone(),
            display_url: ctx.display_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::db::job_repo::{JobRow, STATUS_COMPLETE, STATUS_ERROR, STATUS_PENDING};
    use crate::inference::{BrightnessClassifier, Label};

    struct StaticDetector {
        labels: Vec<Label>,
    }

    #[async_trait]
    impl LabelDetector for StaticDetector {
        async fn detect(&self, _jpeg: &[u8]) -> Result<Vec<Label>, InferenceError> {
            Ok(self.labels.clone())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl LabelDetector for FailingDetector {
        async fn detect(&self, _jpeg: &[u8]) -> Result<Vec<Label>, InferenceError> {
            Err(InferenceError::Unavailable(
                "label detector timed out".to_string(),
            ))
        }
    }

    /// Records whether classify ran, then delegates to the reference.
    struct ProbeClassifier {
        called: Arc<AtomicBool>,
    }

    impl Classifier for ProbeClassifier {
        fn classify(&self, png: &[u8]) -> Result<i64, InferenceError> {
            self.called.store(true, Ordering::SeqCst);
            BrightnessClassifier.classify(png)
        }
    }

    struct Harness {
        db: Database,
        store_dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                store_dir: TempDir::new().unwrap(),
            }
        }

        fn store(&self) -> FsObjectStore {
            FsObjectStore::new(self.store_dir.path())
        }

        fn orchestrator(
            &self,
            detector: Arc<dyn LabelDetector>,
            classifier: Arc<dyn Classifier>,
        ) -> Orchestrator {
            Orchestrator::new(self.db.clone(), self.store(), detector, classifier, 3600)
        }

        /// Creates the pending record and uploads the bytes, returning the
        /// triggering event, the same sequence the collaborators perform.
        fn submit(&self, job_id: &str, file_name: &str, data: &[u8]) -> UploadEvent {
            let key = storage::upload_key(job_id, file_name);
            let now = "2026-01-01T00:00:00Z".to_string();
            job_repo::insert_pending(
                &self.db,
                &JobRow {
                    job_id: job_id.to_string(),
                    status: STATUS_PENDING.to_string(),
                    source_key: key.clone(),
                    file_name: file_name.to_string(),
                    file_type: None,
                    converted_key: None,
                    labels: None,
                    class_flag: None,
                    display_url: None,
                    error: None,
                    created_at: now.clone(),
                    updated_at: now,
                },
            )
            .unwrap();
            self.store().put(&key, data).unwrap();
            UploadEvent::from_key(&key).unwrap()
        }
    }

    fn detector_with(labels: Vec<(&str, f64)>) -> Arc<dyn LabelDetector> {
        Arc::new(StaticDetector {
            labels: labels
                .into_iter()
                .map(|(name, confidence)| Label {
                    name: name.to_string(),
                    confidence,
                })
                .collect(),
        })
    }

    fn jpeg_of(width: u32, height: u32, luma: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([luma, luma, luma]));
        let mut out = Vec::new();
        img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut out, 95,
        ))
        .unwrap();
        out
    }

    // ── Scenario A: plain raster, happy path ──

    #[tokio::test]
    async fn test_plain_jpeg_completes_without_conversion() {
        let harness = Harness::new();
        let event = harness.submit("job-a", "photo.jpg", &jpeg_of(3000, 2000, 200));

        let orchestrator = harness.orchestrator(
            detector_with(vec![("Cat", 96.5), ("Pet", 88.1)]),
            Arc::new(BrightnessClassifier),
        );
        let outcome = orchestrator.process(event).await;

        assert!(matches!(
            outcome,
            JobOutcome::Complete {
                labels: 2,
                converted: false
            }
        ));

        let row = job_repo::find_by_id(&harness.db, "job-a").unwrap().unwrap();
        assert_eq!(row.status, STATUS_COMPLETE);
        assert!(row.converted_key.is_none());
        assert!(row.display_url.is_none());
        assert!(row.error.is_none());
        // Bright input: the reference classifier flags 1.
        assert_eq!(row.class_flag.as_deref(), Some("1"));

        let labels: Vec<StoredLabel> = serde_json::from_str(&row.labels.unwrap()).unwrap();
        assert_eq!(labels[0].name, "Cat");
        assert_eq!(labels[0].confidence.decode().unwrap(), 96.5);
    }

    #[tokio::test]
    async fn test_empty_label_list_is_still_complete() {
        let harness = Harness::new();
        let event = harness.submit("job-empty", "photo.jpg", &jpeg_of(64, 64, 10));

        let orchestrator =
            harness.orchestrator(detector_with(vec![]), Arc::new(BrightnessClassifier));
        let outcome = orchestrator.process(event).await;

        assert!(matches!(outcome, JobOutcome::Complete { labels: 0, .. }));
        let row = job_repo::find_by_id(&harness.db, "job-empty")
            .unwrap()
            .unwrap();
        assert_eq!(row.status, STATUS_COMPLETE);
        assert_eq!(row.labels.as_deref(), Some("[]"));
    }

    // ── Scenario B/C: DICOM inputs ──

    #[cfg(feature = "dicom")]
    #[tokio::test]
    async fn test_dicom_completes_with_converted_copy() {
        use crate::normalize::dicom::testdata::synthetic_dicom;

        let pixels: Vec<u8> = (0..64u32 * 64).map(|i| (i % 256) as u8).collect();
        let harness = Harness::new();
        let event = harness.submit("job-b", "chest.dcm", &synthetic_dicom(64, 64, pixels));

        let orchestrator = harness.orchestrator(
            detector_with(vec![("X-Ray", 99.0)]),
            Arc::new(BrightnessClassifier),
        );
        let outcome = orchestrator.process(event).await;

        assert!(matches!(
            outcome,
            JobOutcome::Complete {
                converted: true,
                ..
            }
        ));

        let row = job_repo::find_by_id(&harness.db, "job-b").unwrap().unwrap();
        assert_eq!(row.status, STATUS_COMPLETE);
        assert_eq!(
            row.converted_key.as_deref(),
            Some("converted/job-b/converted.jpg")
        );
        assert!(row.display_url.unwrap().contains("expires="));
        let flag: i64 = row.class_flag.unwrap().parse().unwrap();
        assert!(flag == 0 || flag == 1);

        // The display copy really is a stored JPEG.
        let copy = harness.store().get("converted/job-b/converted.jpg").unwrap();
        assert_eq!(&copy[0..2], &[0xFF, 0xD8]);
    }

    #[cfg(feature = "dicom")]
    #[tokio::test]
    async fn test_corrupt_dicom_transitions_to_error() {
        let harness = Harness::new();
        let event = harness.submit("job-c", "broken.dcm", b"DICM truncated garbage");

        let orchestrator = harness.orchestrator(
            detector_with(vec![("Never", 1.0)]),
            Arc::new(BrightnessClassifier),
        );
        let outcome = orchestrator.process(event).await;

        assert!(matches!(outcome, JobOutcome::Error { .. }));

        let row = job_repo::find_by_id(&harness.db, "job-c").unwrap().unwrap();
        assert_eq!(row.status, STATUS_ERROR);
        let message = row.error.unwrap();
        assert!(message.contains("normalization failed"), "{}", message);
        assert!(row.labels.is_none());
        assert!(row.class_flag.is_none());
        assert!(row.converted_key.is_none());
    }

    // ── Scenario D: all-black raster classifies to 0 ──

    #[tokio::test]
    async fn test_all_black_raster_flags_zero() {
        let harness = Harness::new();
        let event = harness.submit("job-d", "dark.jpg", &jpeg_of(1024, 1024, 0));

        let orchestrator =
            harness.orchestrator(detector_with(vec![]), Arc::new(BrightnessClassifier));
        orchestrator.process(event).await;

        let row = job_repo::find_by_id(&harness.db, "job-d").unwrap().unwrap();
        assert_eq!(row.status, STATUS_COMPLETE);
        assert_eq!(row.class_flag.as_deref(), Some("0"));
    }

    // ── Scenario E: detector failure with healthy preprocessing ──

    #[tokio::test]
    async fn test_detector_failure_forces_error_not_partial_complete() {
        let harness = Harness::new();
        let event = harness.submit("job-e", "photo.jpg", &jpeg_of(800, 600, 40));

        let classify_called = Arc::new(AtomicBool::new(false));
        let orchestrator = harness.orchestrator(
            Arc::new(FailingDetector),
            Arc::new(ProbeClassifier {
                called: Arc::clone(&classify_called),
            }),
        );
        let outcome = orchestrator.process(event).await;

        match outcome {
            JobOutcome::Error { message } => {
                assert!(message.contains("Label detection failed"), "{}", message);
                assert!(message.contains("timed out"), "{}", message);
            }
            other => panic!("Expected error outcome, got {:?}", other),
        }

        // The classifier call was still attempted; the calls are isolated.
        assert!(classify_called.load(Ordering::SeqCst));

        let row = job_repo::find_by_id(&harness.db, "job-e").unwrap().unwrap();
        assert_eq!(row.status, STATUS_ERROR);
        assert!(row.class_flag.is_none());
    }

    // ── Failure and edge paths ──

    #[tokio::test]
    async fn test_missing_upload_is_fetch_error() {
        let harness = Harness::new();
        // Pending record exists, but nothing was uploaded.
        let event = harness.submit("job-f", "ghost.png", b"");
        std::fs::remove_file(harness.store_dir.path().join("uploads/job-f/ghost.png")).unwrap();

        let orchestrator =
            harness.orchestrator(detector_with(vec![]), Arc::new(BrightnessClassifier));
        let outcome = orchestrator.process(event).await;

        assert!(matches!(outcome, JobOutcome::Error { .. }));
        let row = job_repo::find_by_id(&harness.db, "job-f").unwrap().unwrap();
        assert_eq!(row.status, STATUS_ERROR);
        assert!(row.error.unwrap().contains("uploaded object"));
    }

    #[tokio::test]
    async fn test_terminal_transition_preserves_creation_fields() {
        let harness = Harness::new();
        let event = harness.submit("job-g", "keep.jpg", &jpeg_of(32, 32, 99));

        let orchestrator =
            harness.orchestrator(detector_with(vec![]), Arc::new(BrightnessClassifier));
        orchestrator.process(event).await;

        let row = job_repo::find_by_id(&harness.db, "job-g").unwrap().unwrap();
        assert_eq!(row.file_name, "keep.jpg");
        assert_eq!(row.created_at, "2026-01-01T00:00:00Z");
        assert_ne!(row.updated_at, "2026-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_duplicate_invocation_is_idempotent() {
        let harness = Harness::new();
        let event = harness.submit("job-h", "twice.jpg", &jpeg_of(32, 32, 250));

        let orchestrator = harness.orchestrator(
            detector_with(vec![("Sun", 91.0)]),
            Arc::new(BrightnessClassifier),
        );
        let first = orchestrator.process(event.clone()).await;
        let second = orchestrator.process(event).await;

        assert!(matches!(first, JobOutcome::Complete { .. }));
        assert!(matches!(second, JobOutcome::Complete { .. }));

        let row = job_repo::find_by_id(&harness.db, "job-h").unwrap().unwrap();
        assert_eq!(row.status, STATUS_COMPLETE);
        assert_eq!(row.file_name, "twice.jpg");
        harness
            .db
            .with_conn(|conn| {
                let count: u32 =
                    conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
                assert_eq!(count, 1);
                Ok(())
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_write_failure_leaves_job_pending() {
        let harness = Harness::new();
        let event = harness.submit("job-i", "photo.jpg", &jpeg_of(16, 16, 1));

        // Sabotage the record store after submission: the terminal write
        // must fail, be logged, and not be retried.
        harness
            .db
            .with_conn(|conn| {
                conn.execute_batch("DROP TABLE jobs;")?;
                Ok(())
            })
            .unwrap();

        let orchestrator =
            harness.orchestrator(detector_with(vec![]), Arc::new(BrightnessClassifier));
        let outcome = orchestrator.process(event).await;

        assert!(matches!(outcome, JobOutcome::WritePending { .. }));
    }
}
