//! Job intake: the seam to the upload-issuing collaborator.
//!
//! Assigns the job identifier, fixes up the declared file type (browsers
//! often hand DICOM uploads an empty MIME type), computes the upload key and
//! inserts the initial `pending` record. Pre-signed upload URLs themselves
//! are the collaborator's concern, so intake returns the storage key as the
//! upload target.

use chrono::Utc;
use uuid::Uuid;

use crate::db::job_repo::{self, JobRow, STATUS_PENDING};
use crate::db::{Database, DatabaseError};
use crate::normalize;
use crate::storage;

pub const DICOM_MIME: &str = "application/dicom";
const FALLBACK_MIME: &str = "application/octet-stream";

/// A newly created job: the id to poll and the storage key to upload to.
#[derive(Debug, Clone)]
pub struct CreatedJob {
    pub job_id: String,
    pub upload_key: String,
    pub file_type: String,
}

/// Resolves the stored file type from the declared one and the file name.
/// A DICOM extension always wins; an empty declaration falls back to a
/// guess from the name, then to the generic octet-stream type.
pub fn resolve_file_type(file_name: &str, declared: Option<&str>) -> String {
    if normalize::is_dicom_name(file_name) {
        return DICOM_MIME.to_string();
    }
    match declared {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => mime_guess::from_path(file_name)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string()),
    }
}

/// Creates a job: assigns a v4 id, computes the upload key and inserts the
/// initial `pending` record.
pub fn create_job(
    db: &Database,
    file_name: &str,
    declared_type: Option<&str>,
) -> Result<CreatedJob, DatabaseError> {
    let job_id = Uuid::new_v4().to_string();
    let file_type = resolve_file_type(file_name, declared_type);
    let upload_key = storage::upload_key(&job_id, file_name);
    let now = Utc::now().to_rfc3339();

    let row = JobRow {
        job_id: job_id.clone(),
        status: STATUS_PENDING.to_string(),
        source_key: upload_key.clone(),
        file_name: file_name.to_string(),
        file_type: Some(file_type.clone()),
        converted_key: None,
        labels: None,
        class_flag: None,
        display_url: None,
        error: None,
        created_at: now.clone(),
        updated_at: now,
    };
    job_repo::insert_pending(db, &row)?;

    log::info!("Created job {} for '{}' ({})", job_id, file_name, file_type);

    Ok(CreatedJob {
        job_id,
        upload_key,
        file_type,
    })
}
