//! Per-job processing state threaded through the orchestrator stages.

/// The storage event that triggers processing of one uploaded object. The
/// job id and file name are carried by the upload key itself.
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub job_id: String,
    pub source_key: String,
    pub file_name: String,
}

impl UploadEvent {
    /// Parses an event from an upload key (`uploads/{jobId}/{fileName}`).
    pub fn from_key(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '/');
        let prefix = parts.next()?;
        let job_id = parts.next()?;
        let file_name = parts.next()?;
        if prefix != "uploads" || job_id.is_empty() || file_name.is_empty() {
            return None;
        }
        Some(Self {
            job_id: job_id.to_string(),
            source_key: key.to_string(),
            file_name: file_name.to_string(),
        })
    }
}

pub struct JobContext {
    pub event: UploadEvent,

    // Set by the converted-copy stage for DICOM inputs.
    pub converted_key: Option<String>,
    pub display_url: Option<String>,
}

impl JobContext {
    pub fn new(event: UploadEvent) -> Self {
        Self {
            event,
            converted_key: None,
            display_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key_parses_layout() {
        let event = UploadEvent::from_key("uploads/job-42/chest scan.dcm").unwrap();
        assert_eq!(event.job_id, "job-42");
        assert_eq!(event.file_name, "chest scan.dcm");
        assert_eq!(event.source_key, "uploads/job-42/chest scan.dcm");
    }

    #[test]
    fn test_from_key_keeps_nested_file_names() {
        // Only the first two separators structure the key.
        let event = UploadEvent::from_key("uploads/j1/dir/name.png").unwrap();
        assert_eq!(event.file_name, "dir/name.png");
    }

    #[test]
    fn test_from_key_rejects_foreign_prefixes() {
        assert!(UploadEvent::from_key("converted/j1/converted.jpg").is_none());
        assert!(UploadEvent::from_key("uploads/j1").is_none());
        assert!(UploadEvent::from_key("uploads//x.png").is_none());
        assert!(UploadEvent::from_key("").is_none());
    }
}
