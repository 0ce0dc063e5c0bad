//! Object storage for uploaded originals and converted display copies.
//!
//! The key layout is a deployment contract shared with existing data:
//! originals live at `uploads/{jobId}/{originalFileName}` and normalized
//! display copies at `converted/{jobId}/converted.jpg`.

pub mod filesystem;

pub use filesystem::FsObjectStore;

/// Storage key of an original upload.
pub fn upload_key(job_id: &str, file_name: &str) -> String {
    format!("uploads/{}/{}", job_id, file_name)
}

/// Storage key of the normalized display copy.
pub fn converted_key(job_id: &str) -> String {
    format!("converted/{}/converted.jpg", job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key_layout() {
        assert_eq!(
            upload_key("abc-123", "chest.dcm"),
            "uploads/abc-123/chest.dcm"
        );
    }

    #[test]
    fn test_converted_key_layout() {
        assert_eq!(converted_key("abc-123"), "converted/abc-123/converted.jpg");
    }
}
