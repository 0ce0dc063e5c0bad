//! Job repository — reads and terminal-transition writes of the `jobs` table.
//!
//! One row per job, keyed by `job_id`. The two terminal writers are
//! partial-update upserts: their `DO UPDATE` arms touch only the fields
//! being set, so a duplicate invocation can refresh a terminal record but
//! can never clobber `file_name`, `file_type`, `source_key` or `created_at`.

use chrono::Utc;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};
use crate::codec::Decimal;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETE: &str = "complete";
pub const STATUS_ERROR: &str = "error";

/// A label as persisted in a record: the confidence is a decimal string,
/// never a binary float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLabel {
    pub name: String,
    pub confidence: Decimal,
}

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub source_key: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub converted_key: Option<String>,
    /// JSON-encoded `Vec<StoredLabel>`.
    pub labels: Option<String>,
    /// Decimal string, `0` or `1`.
    pub class_flag: Option<String>,
    pub display_url: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            status: row.get("status")?,
            source_key: row.get("source_key")?,
            file_name: row.get("file_name")?,
            file_type: row.get("file_type")?,
            converted_key: row.get("converted_key")?,
            labels: row.get("labels")?,
            class_flag: row.get("class_flag")?,
            display_url: row.get("display_url")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields written by the `pending -> complete` transition.
#[derive(Debug, Clone)]
pub struct CompletionFields {
    pub labels: Vec<StoredLabel>,
    pub class_flag: Decimal,
    pub converted_key: Option<String>,
    pub display_url: Option<String>,
}

/// Inserts the initial `pending` record for a newly created job.
pub fn insert_pending(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_id, status, source_key, file_name, file_type,
             converted_key, labels, class_flag, display_url, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.job_id,
                job.status,
                job.source_key,
                job.file_name,
                job.file_type,
                job.converted_key,
                job.labels,
                job.class_flag,
                job.display_url,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Applies the `pending -> complete` transition.
///
/// The write is an upsert keyed on `job_id`: the update arm sets only the
/// result fields (and clears any prior error), and the insert arm exists so
/// a record lost out-of-band still lands in a coherent terminal state.
pub fn mark_complete(
    db: &Database,
    job_id: &str,
    source_key: &str,
    file_name: &str,
    fields: &CompletionFields,
) -> Result<(), DatabaseError> {
    let labels_json =
        serde_json::to_string(&fields.labels).map_err(|e| DatabaseError::Encode(e.to_string()))?;
    let now = Utc::now().to_rfc3339();

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_id, status, source_key, file_name, labels, class_flag,
             converted_key, display_url, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?9)
             ON CONFLICT(job_id) DO UPDATE SET
                 status = excluded.status,
                 labels = excluded.labels,
                 class_flag = excluded.class_flag,
                 converted_key = excluded.converted_key,
                 display_url = excluded.display_url,
                 error = NULL,
                 updated_at = excluded.updated_at",
            params![
                job_id,
                STATUS_COMPLETE,
                source_key,
                file_name,
                labels_json,
                fields.class_flag.as_str(),
                fields.converted_key,
                fields.display_url,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Applies the `pending -> error` transition. Sets only `status`, `error`
/// and `updated_at`; anything already written stays in place.
pub fn mark_error(
    db: &Database,
    job_id: &str,
    source_key: &str,
    file_name: &str,
    message: &str,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_id, status, source_key, file_name, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(job_id) DO UPDATE SET
                 status = excluded.status,
                 error = excluded.error,
                 updated_at = excluded.updated_at",
            params![job_id, STATUS_ERROR, source_key, file_name, message, now],
        )?;
        Ok(())
    })
}

/// One decoded label in the caller-facing view.
#[derive(Debug, Clone, Serialize)]
pub struct LabelView {
    pub name: String,
    pub confidence: f64,
}

/// Decoded, caller-facing projection of a job record. Numeric fields are
/// native again; result fields are present only for completed jobs, since
/// anything written before a failure is not authoritative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_flag: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reads a job and decodes it for the retrieval collaborator.
pub fn fetch_view(db: &Database, id: &str) -> Result<Option<JobView>, DatabaseError> {
    let Some(row) = find_by_id(db, id)? else {
        return Ok(None);
    };

    let complete = row.status == STATUS_COMPLETE;

    let labels = match (complete, &row.labels) {
        (true, Some(json)) => {
            let stored: Vec<StoredLabel> =
                serde_json::from_str(json).map_err(|e| DatabaseError::Decode(e.to_string()))?;
            let mut decoded = Vec::with_capacity(stored.len());
            for label in stored {
                decoded.push(LabelView {
                    confidence: label
                        .confidence
                        .decode()
                        .map_err(|e| DatabaseError::Decode(e.to_string()))?,
                    name: label.name,
                });
            }
            Some(decoded)
        }
        _ => None,
    };

    let class_flag = match (complete, &row.class_flag) {
        (true, Some(raw)) => Some(
            Decimal::from_stored(raw)
                .decode_int()
                .map_err(|e| DatabaseError::Decode(e.to_string()))?,
        ),
        _ => None,
    };

    Ok(Some(JobView {
        job_id: row.job_id,
        status: row.status,
        labels,
        class_flag,
        display_url: row.display_url,
        error: row.error,
    }))
}
