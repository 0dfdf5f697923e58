use crate::keys::validate_key;
use crate::traits::{KeyValueStore, StorageError, StorageResult};
use crate::StorageBackend;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory storage for tests and sessions that should not touch disk
///
/// Clones share the same map, so a test can keep one handle to inspect what
/// the store wrote, or hand a clone to a second store to simulate a reload.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail, to exercise degraded persistence
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Seed a raw value, e.g. a corrupt payload
    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.into());
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        if *self.fail_writes.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StorageError::WriteFailed(format!(
                "Memory storage rejected write to {}",
                key
            )));
        }
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.set("fileList", b"[]").unwrap();
        assert_eq!(other.get("fileList").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn test_fail_writes() {
        let storage = MemoryStorage::new();
        storage.fail_writes(true);
        assert!(matches!(
            storage.set("fileList", b"[]"),
            Err(StorageError::WriteFailed(_))
        ));
        assert_eq!(storage.get("fileList").unwrap(), None);

        storage.fail_writes(false);
        storage.set("fileList", b"[]").unwrap();
    }
}
