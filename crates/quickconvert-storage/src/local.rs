use crate::keys::validate_key;
use crate::traits::{KeyValueStore, StorageError, StorageResult};
use crate::StorageBackend;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Local filesystem storage: one file per key inside a base directory
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory holding one file per key (e.g., "./.quickconvert")
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );

        Ok(Some(data))
    }

    /// Writes through a temp file in the same directory and renames it over the
    /// target, so a crash mid-write leaves the previous value intact.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        let mut file = NamedTempFile::new_in(&self.base_path).map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create temp file in {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        file.write_all(value).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;

        file.as_file().sync_all().map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync {}: {}", path.display(), e))
        })?;

        file.persist(&path).map_err(|e| {
            StorageError::WriteFailed(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = value.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_storage_set_get() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        storage.set("fileList", b"[]").unwrap();
        assert_eq!(storage.get("fileList").unwrap(), Some(b"[]".to_vec()));

        storage.set("fileList", b"[1]").unwrap();
        assert_eq!(storage.get("fileList").unwrap(), Some(b"[1]".to_vec()));
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert_eq!(storage.get("fileList").unwrap(), None);
    }

    #[test]
    fn test_creates_nested_base_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = LocalStorage::new(&nested).unwrap();
        storage.set("fileList", b"{}").unwrap();
        assert!(nested.join("fileList.json").exists());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        let result = storage.get("../../etc/passwd");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.set("nested/key", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.set("", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_values_survive_new_instance() {
        let dir = tempdir().unwrap();
        LocalStorage::new(dir.path())
            .unwrap()
            .set("fileList", b"persisted")
            .unwrap();

        let reopened = LocalStorage::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get("fileList").unwrap(),
            Some(b"persisted".to_vec())
        );
    }
}
