//! Download dispatch and output delivery
//!
//! The dispatcher checks that a record has output bytes, hands them to an
//! [`OutputSink`] under the record's output name, and only then marks the
//! record `Downloaded`. Output bytes and size fields are never touched.

use bytes::Bytes;
use quickconvert_core::RecordId;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::error::{DownloadError, StoreError};
use crate::store::FileStore;

/// Give up finding a free name after this many numbered variants
const MAX_NAME_SUFFIX: usize = 1000;

/// Where a delivery ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredOutput {
    /// Name the output was saved under; may differ from the suggested name
    pub file_name: String,
    pub path: Option<PathBuf>,
    pub size_bytes: u64,
}

/// Turns a byte buffer into a user-retrievable file given a suggested name
pub trait OutputSink: Send + Sync {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<DeliveredOutput, DownloadError>;
}

/// Saves downloads into a directory without ever overwriting existing files.
///
/// A name that is taken gets a numbered suffix (`photo (1).webp`), the way
/// browsers handle repeated downloads.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidate_name(file_name: &str, attempt: usize) -> String {
        if attempt == 0 {
            return file_name.to_string();
        }
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, attempt, ext),
            _ => format!("{} ({})", file_name, attempt),
        }
    }

    fn validate_file_name(file_name: &str) -> Result<(), DownloadError> {
        let path = Path::new(file_name);
        let plain = path.file_name().map(|n| n == path.as_os_str()) == Some(true);
        if file_name.is_empty() || !plain {
            return Err(DownloadError::Delivery(format!(
                "Invalid file name: {}",
                file_name
            )));
        }
        Ok(())
    }
}

fn delivery_error(context: &str, err: impl std::fmt::Display) -> DownloadError {
    DownloadError::Delivery(format!("{}: {}", context, err))
}

impl OutputSink for DirectorySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<DeliveredOutput, DownloadError> {
        Self::validate_file_name(file_name)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| delivery_error("Failed to create output directory", e))?;

        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| delivery_error("Failed to create temp file", e))?;
        temp.write_all(bytes)
            .map_err(|e| delivery_error("Failed to write output", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| delivery_error("Failed to sync output", e))?;

        for attempt in 0..=MAX_NAME_SUFFIX {
            let name = Self::candidate_name(file_name, attempt);
            let path = self.dir.join(&name);
            match temp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), size_bytes = bytes.len(), "Output saved");
                    return Ok(DeliveredOutput {
                        file_name: name,
                        path: Some(path),
                        size_bytes: bytes.len() as u64,
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => temp = e.file,
                Err(e) => return Err(delivery_error("Failed to save output", e.error)),
            }
        }

        Err(DownloadError::Delivery(format!(
            "No free file name for {} in {}",
            file_name,
            self.dir.display()
        )))
    }
}

/// Keeps deliveries in memory; for tests and embedding
#[derive(Clone, Default)]
pub struct MemorySink {
    deliveries: Arc<Mutex<Vec<(String, Bytes)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(String, Bytes)> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Make every subsequent delivery fail
    pub fn fail_deliveries(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }
}

impl OutputSink for MemorySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<DeliveredOutput, DownloadError> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(DownloadError::Delivery("sink rejected delivery".to_string()));
        }
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((file_name.to_string(), Bytes::copy_from_slice(bytes)));
        Ok(DeliveredOutput {
            file_name: file_name.to_string(),
            path: None,
            size_bytes: bytes.len() as u64,
        })
    }
}

pub struct DownloadDispatcher {
    store: Arc<FileStore>,
    sink: Arc<dyn OutputSink>,
}

impl DownloadDispatcher {
    pub fn new(store: Arc<FileStore>, sink: Arc<dyn OutputSink>) -> Self {
        Self { store, sink }
    }

    /// Deliver the output of the record at `index` and mark it `Downloaded`.
    pub fn download(&self, index: usize) -> Result<DeliveredOutput, DownloadError> {
        let id = self
            .store
            .id_at(index)
            .ok_or(DownloadError::InvalidIndex(index))?;
        self.download_id(id)
    }

    pub fn download_id(&self, id: RecordId) -> Result<DeliveredOutput, DownloadError> {
        let record = self.store.get(id).ok_or(DownloadError::NotFound(id))?;
        let output = record.ensure_downloadable()?.clone();
        let file_name = record.output_full_name().to_string();

        let delivered = self.sink.deliver(&file_name, &output)?;

        // Only mark the output that was delivered; a re-conversion may have
        // replaced it while the sink was writing
        let marked = self.store.mutate(id, |r| {
            if r.output() != Some(&output) || r.output_full_name() != file_name {
                return Ok::<_, StoreError>(false);
            }
            r.mark_downloaded()?;
            Ok(true)
        });
        match marked {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(record_id = %id, "Record changed during download; status left as is")
            }
            // Delivered already; a removal in between is not worth failing over
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(record_id = %id, "Record removed during download")
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            record_id = %id,
            file_name = %delivered.file_name,
            size_bytes = delivered.size_bytes,
            "Download delivered"
        );
        Ok(delivered)
    }
}
