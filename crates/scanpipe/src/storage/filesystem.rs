//! Filesystem-rooted object store.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;

use crate::error::StoreError;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path under the store root. Keys are always
    /// relative, forward-slash separated, and must not traverse upward.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(StoreError::InvalidKey(key.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    /// Writes an object, creating parent directories as needed.
    pub fn put(&self, key: &str, content: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        std::fs::write(&path, content).map_err(|e| StoreError::WriteObject {
            key: key.to_string(),
            source: e,
        })?;

        Ok(path)
    }

    /// Reads an object's bytes.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        std::fs::read(&path).map_err(|e| StoreError::ReadObject {
            key: key.to_string(),
            source: e,
        })
    }

    pub fn exists(&self, key: &str) -> bool {
        self.resolve(key).map(|p| p.exists()).unwrap_or(false)
    }

    /// Returns a time-limited retrieval reference for an object, expiring
    /// `ttl_secs` from now.
    pub fn display_url(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
        let path = self.resolve(key)?;
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        Ok(format!("file://{}?expires={}", path.display(), expires))
    }
}
