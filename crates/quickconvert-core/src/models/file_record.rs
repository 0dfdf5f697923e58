use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::{FALLBACK_MIME_TYPE, INTERRUPTED_CONVERSION_CAUSE};

/// Opaque, immutable identity assigned to a record at ingestion.
///
/// Positions in the collection shift on removal; ids never do, so every
/// asynchronous write-back addresses records by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ready,
    Converting,
    Converted,
    Error,
    Downloaded,
}

impl FileStatus {
    /// Every state except `Converting` may start a (re-)conversion.
    pub fn can_start_conversion(&self) -> bool {
        !matches!(self, FileStatus::Converting)
    }

    pub fn can_download(&self) -> bool {
        matches!(self, FileStatus::Converted | FileStatus::Downloaded)
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Ready => write!(f, "ready"),
            FileStatus::Converting => write!(f, "converting"),
            FileStatus::Converted => write!(f, "converted"),
            FileStatus::Error => write!(f, "error"),
            FileStatus::Downloaded => write!(f, "downloaded"),
        }
    }
}

impl FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(FileStatus::Ready),
            "converting" => Ok(FileStatus::Converting),
            "converted" => Ok(FileStatus::Converted),
            "error" => Ok(FileStatus::Error),
            "downloaded" => Ok(FileStatus::Downloaded),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

/// Rejected status transition. The record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a conversion is already in progress")]
    AlreadyConverting,

    #[error("source payload is not available (re-add the file)")]
    SourceUnavailable,

    #[error("expected status converting, found {0}")]
    NotConverting(FileStatus),

    #[error("cannot download a record in status {0}")]
    NotDownloadable(FileStatus),

    #[error("converted output is not available (convert again)")]
    OutputUnavailable,
}

/// One file supplied by the ingestion collaborator.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub payload: Bytes,
}

impl IngestFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        payload: Bytes,
    ) -> Self {
        let mime_type = mime_type.into();
        Self {
            name: name.into(),
            mime_type: if mime_type.is_empty() {
                FALLBACK_MIME_TYPE.to_string()
            } else {
                mime_type
            },
            size_bytes,
            payload,
        }
    }

    /// Size taken from the payload itself.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        let size = payload.len() as u64;
        Self::new(name, mime_type, size, payload)
    }
}

/// One user-submitted file and its conversion outcome.
///
/// Fields are private: every status change goes through a transition method so
/// the state machine cannot be bypassed by callers.
#[derive(Debug, Clone)]
pub struct FileRecord {
    id: RecordId,
    original_name: String,
    original_mime_type: String,
    original_size_bytes: u64,
    source: Option<Bytes>,
    status: FileStatus,
    output: Option<Bytes>,
    output_size_bytes: u64,
    output_full_name: String,
    last_error: Option<String>,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn from_ingest(file: IngestFile) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            original_name: file.name,
            original_mime_type: file.mime_type,
            original_size_bytes: file.size_bytes,
            source: Some(file.payload),
            status: FileStatus::Ready,
            output: None,
            output_size_bytes: 0,
            output_full_name: String::new(),
            last_error: None,
            added_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn original_mime_type(&self) -> &str {
        &self.original_mime_type
    }

    pub fn original_size_bytes(&self) -> u64 {
        self.original_size_bytes
    }

    pub fn source(&self) -> Option<&Bytes> {
        self.source.as_ref()
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn output(&self) -> Option<&Bytes> {
        self.output.as_ref()
    }

    pub fn output_size_bytes(&self) -> u64 {
        self.output_size_bytes
    }

    pub fn output_full_name(&self) -> &str {
        &self.output_full_name
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True when the source payload did not survive a reload.
    pub fn needs_reupload(&self) -> bool {
        self.source.is_none()
    }

    pub fn output_available(&self) -> bool {
        self.output.is_some()
    }

    /// A `Converted`/`Downloaded` record whose bytes were lost on reload.
    pub fn is_stale(&self) -> bool {
        self.status.can_download() && !self.output_available()
    }

    /// Output size relative to the original, rounded to whole percent.
    pub fn size_ratio_percent(&self) -> Option<u64> {
        if self.output_size_bytes == 0 || self.original_size_bytes == 0 {
            return None;
        }
        let ratio = self.output_size_bytes as f64 / self.original_size_bytes as f64;
        Some((ratio * 100.0).round() as u64)
    }

    /// Commit point of a conversion: `* -> Converting`.
    ///
    /// Downstream fields are reset so a re-conversion never exposes the previous
    /// attempt's output while the new one is running.
    pub fn begin_conversion(&mut self) -> Result<(), TransitionError> {
        if !self.status.can_start_conversion() {
            return Err(TransitionError::AlreadyConverting);
        }
        if self.source.is_none() {
            return Err(TransitionError::SourceUnavailable);
        }
        self.status = FileStatus::Converting;
        self.output = None;
        self.output_size_bytes = 0;
        self.output_full_name.clear();
        self.last_error = None;
        self.touch();
        Ok(())
    }

    /// `Converting -> Converted`, setting every output field in one step.
    pub fn complete_conversion(
        &mut self,
        output_full_name: impl Into<String>,
        output: Bytes,
    ) -> Result<(), TransitionError> {
        if self.status != FileStatus::Converting {
            return Err(TransitionError::NotConverting(self.status));
        }
        self.output_size_bytes = output.len() as u64;
        self.output = Some(output);
        self.output_full_name = output_full_name.into();
        self.status = FileStatus::Converted;
        self.touch();
        Ok(())
    }

    /// `Converting -> Error`, retaining the cause for diagnostics.
    pub fn fail_conversion(&mut self, cause: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != FileStatus::Converting {
            return Err(TransitionError::NotConverting(self.status));
        }
        self.status = FileStatus::Error;
        self.last_error = Some(cause.into());
        self.touch();
        Ok(())
    }

    /// Checks the download precondition without changing anything.
    pub fn ensure_downloadable(&self) -> Result<&Bytes, TransitionError> {
        if !self.status.can_download() {
            return Err(TransitionError::NotDownloadable(self.status));
        }
        self.output.as_ref().ok_or(TransitionError::OutputUnavailable)
    }

    /// `Converted | Downloaded -> Downloaded`. Output and size fields are left alone.
    pub fn mark_downloaded(&mut self) -> Result<(), TransitionError> {
        self.ensure_downloadable()?;
        self.status = FileStatus::Downloaded;
        self.touch();
        Ok(())
    }

    pub fn to_persisted(&self) -> PersistedRecord {
        PersistedRecord {
            id: self.id,
            original_name: self.original_name.clone(),
            original_mime_type: self.original_mime_type.clone(),
            original_size_bytes: self.original_size_bytes,
            status: self.status,
            output_full_name: self.output_full_name.clone(),
            output_size_bytes: self.output_size_bytes,
            last_error: self.last_error.clone(),
            added_at: self.added_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuild a record from its persisted metadata.
    ///
    /// Payloads are gone after a reload. A conversion that was running when the
    /// previous session ended can never complete, so it surfaces as `Error`.
    pub fn from_persisted(persisted: PersistedRecord) -> Self {
        let (status, last_error) = match persisted.status {
            FileStatus::Converting => (
                FileStatus::Error,
                Some(INTERRUPTED_CONVERSION_CAUSE.to_string()),
            ),
            other => (other, persisted.last_error),
        };

        Self {
            id: persisted.id,
            original_name: persisted.original_name,
            original_mime_type: persisted.original_mime_type,
            original_size_bytes: persisted.original_size_bytes,
            source: None,
            status,
            output: None,
            output_size_bytes: persisted.output_size_bytes,
            output_full_name: persisted.output_full_name,
            last_error,
            added_at: persisted.added_at,
            updated_at: persisted.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The persisted-eligible subset of a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: RecordId,
    pub original_name: String,
    pub original_mime_type: String,
    pub original_size_bytes: u64,
    pub status: FileStatus,
    #[serde(default)]
    pub output_full_name: String,
    #[serde(default)]
    pub output_size_bytes: u64,
    #[serde(default)]
    pub last_error: Option<String>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
