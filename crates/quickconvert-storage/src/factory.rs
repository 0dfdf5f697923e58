#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-memory")]
use crate::MemoryStorage;
use crate::{KeyValueStore, StorageBackend, StorageError, StorageResult};
use quickconvert_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub fn create_storage(config: &Config) -> StorageResult<Arc<dyn KeyValueStore>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.state_dir.clone())?;
            tracing::info!(path = %config.state_dir.display(), "Using local storage");
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage; the file list will not survive restarts");
            Ok(Arc::new(MemoryStorage::new()))
        }

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)"
                .to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local", feature = "storage-memory"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_local_storage() {
        let dir = tempdir().unwrap();
        let config = Config {
            state_dir: dir.path().join("state"),
            ..Config::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert!(dir.path().join("state").is_dir());
    }

    #[test]
    fn test_create_memory_storage() {
        let config = Config {
            storage_backend: StorageBackend::Memory,
            ..Config::default()
        };
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Memory);
    }
}
