//! Persistent file store
//!
//! Owns the ordered collection of file records. Every successful mutation
//! serializes the persistable fields of the whole collection under one fixed
//! key and republishes the collection to subscribers. At startup the store
//! rehydrates from that key; a missing or unreadable value yields an empty
//! collection.
//!
//! Positions are a presentation convenience. Anything that outlives a single
//! call (a running conversion, for instance) must address records by
//! [`RecordId`].

use quickconvert_core::{FileRecord, IngestFile, PersistedRecord, RecordId};
use quickconvert_storage::{KeyValueStore, MemoryStorage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;

use crate::error::StoreError;

pub struct FileStore {
    records: Mutex<Vec<FileRecord>>,
    storage: Arc<dyn KeyValueStore>,
    key: String,
    degraded: AtomicBool,
    changes: watch::Sender<Vec<FileRecord>>,
}

impl FileStore {
    /// Open the store and rehydrate whatever was persisted under `key`.
    pub fn open(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (records, degraded) = Self::rehydrate(storage.as_ref(), &key);
        let (changes, _) = watch::channel(records.clone());

        Self {
            records: Mutex::new(records),
            storage,
            key,
            degraded: AtomicBool::new(degraded),
            changes,
        }
    }

    /// Open an empty store with no working backend. Nothing is persisted for
    /// the rest of the session.
    pub fn detached(key: impl Into<String>) -> Self {
        let (changes, _) = watch::channel(Vec::new());

        Self {
            records: Mutex::new(Vec::new()),
            storage: Arc::new(MemoryStorage::new()),
            key: key.into(),
            degraded: AtomicBool::new(true),
            changes,
        }
    }

    /// Append one `Ready` record per file, in input order.
    pub fn ingest(&self, files: Vec<IngestFile>) -> Vec<RecordId> {
        if files.is_empty() {
            return Vec::new();
        }

        let mut records = self.lock();
        let ids = files
            .into_iter()
            .map(|file| {
                let record = FileRecord::from_ingest(file);
                tracing::info!(
                    record_id = %record.id(),
                    name = %record.original_name(),
                    mime_type = %record.original_mime_type(),
                    size_bytes = record.original_size_bytes(),
                    "File added"
                );
                let id = record.id();
                records.push(record);
                id
            })
            .collect();
        self.commit(&records);
        ids
    }

    /// Remove the record at `index`. Out-of-range indices are a silent no-op.
    pub fn remove(&self, index: usize) -> Option<FileRecord> {
        let mut records = self.lock();
        if index >= records.len() {
            tracing::debug!(index, len = records.len(), "Remove ignored: no record at index");
            return None;
        }
        let removed = records.remove(index);
        tracing::info!(record_id = %removed.id(), index, "File removed");
        self.commit(&records);
        Some(removed)
    }

    pub fn remove_id(&self, id: RecordId) -> Option<FileRecord> {
        let mut records = self.lock();
        let index = records.iter().position(|r| r.id() == id)?;
        let removed = records.remove(index);
        tracing::info!(record_id = %id, index, "File removed");
        self.commit(&records);
        Some(removed)
    }

    /// Remove every record, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut records = self.lock();
        let count = records.len();
        if count == 0 {
            return 0;
        }
        records.clear();
        tracing::info!(count, "File list cleared");
        self.commit(&records);
        count
    }

    /// Apply `updater` to the record at `index`.
    ///
    /// The collection is persisted and republished only if the updater
    /// returns `Ok`. An updater that fails must leave the record untouched.
    pub fn mutate_at<T, E, F>(&self, index: usize, updater: F) -> Result<T, E>
    where
        F: FnOnce(&mut FileRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut records = self.lock();
        let record = records
            .get_mut(index)
            .ok_or(StoreError::InvalidIndex(index))?;
        let value = updater(record)?;
        self.commit(&records);
        Ok(value)
    }

    /// Apply `updater` to the record with identity `id`.
    pub fn mutate<T, E, F>(&self, id: RecordId, updater: F) -> Result<T, E>
    where
        F: FnOnce(&mut FileRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound(id))?;
        let value = updater(record)?;
        self.commit(&records);
        Ok(value)
    }

    pub fn id_at(&self, index: usize) -> Option<RecordId> {
        self.lock().get(index).map(FileRecord::id)
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.lock().iter().position(|r| r.id() == id)
    }

    pub fn get(&self, id: RecordId) -> Option<FileRecord> {
        self.lock().iter().find(|r| r.id() == id).cloned()
    }

    /// Current collection, in order. Payloads are shared, not copied.
    pub fn snapshot(&self) -> Vec<FileRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Receive the full collection after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<FileRecord>> {
        self.changes.subscribe()
    }

    /// True once persistence has been abandoned for this session.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FileRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist and publish. Called with the collection lock held so writes
    /// reach storage in mutation order.
    fn commit(&self, records: &[FileRecord]) {
        self.persist(records);
        self.changes.send_replace(records.to_vec());
    }

    fn persist(&self, records: &[FileRecord]) {
        if self.is_degraded() {
            return;
        }

        let start = Instant::now();
        let persisted: Vec<PersistedRecord> = records.iter().map(FileRecord::to_persisted).collect();
        let result = serde_json::to_vec(&persisted)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                let size = json.len();
                self.storage
                    .set(&self.key, &json)
                    .map(|_| size)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(size) => tracing::debug!(
                key = %self.key,
                records = records.len(),
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File list persisted"
            ),
            Err(e) => {
                self.degraded.store(true, Ordering::Release);
                tracing::warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to persist file list; continuing in memory only for this session"
                );
            }
        }
    }

    /// Returns the restored records and whether persistence should start degraded.
    fn rehydrate(storage: &dyn KeyValueStore, key: &str) -> (Vec<FileRecord>, bool) {
        let bytes = match storage.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(key = %key, "No persisted file list");
                return (Vec::new(), false);
            }
            Err(e) => {
                // Keep whatever is stored intact rather than overwrite it blind
                tracing::warn!(
                    key = %key,
                    error = %e,
                    "Failed to read persisted file list; continuing in memory only"
                );
                return (Vec::new(), true);
            }
        };

        match serde_json::from_slice::<Vec<PersistedRecord>>(&bytes) {
            Ok(persisted) => {
                let records: Vec<FileRecord> =
                    persisted.into_iter().map(FileRecord::from_persisted).collect();
                tracing::info!(key = %key, records = records.len(), "File list restored");
                (records, false)
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    error = %e,
                    size_bytes = bytes.len(),
                    "Persisted file list is corrupt; starting empty"
                );
                (Vec::new(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use quickconvert_core::{FileStatus, StorageBackend, TransitionError};
    use quickconvert_storage::{StorageError, StorageResult};

    const KEY: &str = "fileList";

    fn file(name: &str, size: usize) -> IngestFile {
        IngestFile::from_bytes(name, "image/png", Bytes::from(vec![7u8; size]))
    }

    fn store_with(storage: &MemoryStorage) -> FileStore {
        FileStore::open(Arc::new(storage.clone()), KEY)
    }

    struct UnreadableStorage;

    impl KeyValueStore for UnreadableStorage {
        fn get(&self, _key: &str) -> StorageResult<Option<Vec<u8>>> {
            Err(StorageError::ReadFailed("quota exceeded".to_string()))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> StorageResult<()> {
            Ok(())
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Memory
        }
    }

    #[test]
    fn test_ingest_appends_in_order() {
        let store = store_with(&MemoryStorage::new());
        store.ingest(vec![file("a.png", 1)]);
        let ids = store.ingest(vec![file("b.png", 2), file("c.png", 3)]);

        let names: Vec<_> = store
            .snapshot()
            .iter()
            .map(|r| r.original_name().to_string())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        assert_eq!(ids.len(), 2);
        assert_eq!(store.id_at(1), Some(ids[0]));
        assert!(store
            .snapshot()
            .iter()
            .all(|r| r.status() == FileStatus::Ready));
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        store.ingest(vec![file("a.png", 1)]);
        let before = storage.get(KEY).unwrap();

        assert!(store.remove(5).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(storage.get(KEY).unwrap(), before);
    }

    #[test]
    fn test_remove_shifts_later_records() {
        let store = store_with(&MemoryStorage::new());
        let ids = store.ingest(vec![file("a.png", 1), file("b.png", 2)]);

        let removed = store.remove(0).unwrap();
        assert_eq!(removed.id(), ids[0]);
        assert_eq!(store.id_at(0), Some(ids[1]));
        assert_eq!(store.position(ids[1]), Some(0));
        assert!(store.get(ids[0]).is_none());
    }

    #[test]
    fn test_mutate_at_invalid_index() {
        let store = store_with(&MemoryStorage::new());
        let result: Result<(), StoreError> = store.mutate_at(0, |_| Ok(()));
        assert_eq!(result, Err(StoreError::InvalidIndex(0)));
    }

    #[test]
    fn test_mutate_unknown_id() {
        let store = store_with(&MemoryStorage::new());
        let id = RecordId::new();
        let result: Result<(), StoreError> = store.mutate(id, |_| Ok(()));
        assert_eq!(result, Err(StoreError::NotFound(id)));
    }

    #[test]
    fn test_failed_updater_does_not_persist() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        let ids = store.ingest(vec![file("a.png", 1)]);
        let before = storage.get(KEY).unwrap();

        let result: Result<(), StoreError> =
            store.mutate(ids[0], |r| Ok(r.fail_conversion("nope")?));
        assert_eq!(
            result,
            Err(StoreError::Transition(TransitionError::NotConverting(
                FileStatus::Ready
            )))
        );
        assert_eq!(storage.get(KEY).unwrap(), before);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        let ids = store.ingest(vec![file("a.png", 10)]);

        store
            .mutate::<_, StoreError, _>(ids[0], |r| Ok(r.begin_conversion()?))
            .unwrap();

        let persisted: Vec<PersistedRecord> =
            serde_json::from_slice(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].status, FileStatus::Converting);
    }

    #[test]
    fn test_reload_restores_metadata_without_payloads() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        let ids = store.ingest(vec![file("photo.png", 2_000)]);
        store
            .mutate::<_, StoreError, _>(ids[0], |r| {
                r.begin_conversion()?;
                Ok(r.complete_conversion("photo.webp", Bytes::from(vec![1u8; 500]))?)
            })
            .unwrap();

        let reloaded = store_with(&storage);
        let record = reloaded.get(ids[0]).unwrap();
        assert_eq!(record.original_name(), "photo.png");
        assert_eq!(record.original_size_bytes(), 2_000);
        assert_eq!(record.status(), FileStatus::Converted);
        assert_eq!(record.output_full_name(), "photo.webp");
        assert_eq!(record.output_size_bytes(), 500);
        assert!(record.needs_reupload());
        assert!(record.is_stale());
    }

    #[test]
    fn test_corrupt_value_starts_empty() {
        let storage = MemoryStorage::new();
        storage.insert_raw(KEY, "{not json");
        let store = store_with(&storage);

        assert!(store.is_empty());
        assert!(!store.is_degraded());

        store.ingest(vec![file("a.png", 1)]);
        let persisted: Vec<PersistedRecord> =
            serde_json::from_slice(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[test]
    fn test_unreadable_storage_starts_degraded() {
        let store = FileStore::open(Arc::new(UnreadableStorage), KEY);
        assert!(store.is_empty());
        assert!(store.is_degraded());

        store.ingest(vec![file("a.png", 1)]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_write_failure_degrades_to_memory() {
        let storage = MemoryStorage::new();
        let store = store_with(&storage);
        store.ingest(vec![file("a.png", 1)]);

        storage.fail_writes(true);
        store.ingest(vec![file("b.png", 1)]);
        assert!(store.is_degraded());
        assert_eq!(store.len(), 2);

        // Storage recovered, but the session stays memory-only
        storage.fail_writes(false);
        store.remove(0);
        assert_eq!(store.len(), 1);
        let persisted: Vec<PersistedRecord> =
            serde_json::from_slice(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].original_name, "a.png");
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let store = store_with(&MemoryStorage::new());
        let mut changes = store.subscribe();
        assert!(!changes.has_changed().unwrap());

        store.ingest(vec![file("a.png", 1)]);
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().len(), 1);

        store.clear();
        assert!(changes.has_changed().unwrap());
        assert!(changes.borrow_and_update().is_empty());
    }

    #[test]
    fn test_detached_store_starts_degraded() {
        let store = FileStore::detached(KEY);
        assert!(store.is_degraded());
        assert!(store.is_empty());

        let ids = store.ingest(vec![file("a.png", 1)]);
        store
            .mutate::<_, StoreError, _>(ids[0], |r| Ok(r.begin_conversion()?))
            .unwrap();
        assert_eq!(store.get(ids[0]).unwrap().status(), FileStatus::Converting);
    }
}
