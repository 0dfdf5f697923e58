//! Service-level error types and their mapping onto `AppError`

use quickconvert_core::{AppError, FileStatus, RecordId, RequestError, TransitionError};
use thiserror::Error;

/// File store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No record at index {0}")]
    InvalidIndex(usize),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Rejected `convert` call. The record is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("No record at index {0}")]
    InvalidIndex(usize),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Invalid conversion request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("A conversion is already in progress for this file")]
    AlreadyConverting,

    #[error("Source payload is not available; re-add the file")]
    SourceUnavailable,

    #[error("Invalid state: {0}")]
    InvalidState(TransitionError),
}

impl From<StoreError> for ConvertError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIndex(index) => ConvertError::InvalidIndex(index),
            StoreError::NotFound(id) => ConvertError::NotFound(id),
            StoreError::Transition(TransitionError::AlreadyConverting) => {
                ConvertError::AlreadyConverting
            }
            StoreError::Transition(TransitionError::SourceUnavailable) => {
                ConvertError::SourceUnavailable
            }
            StoreError::Transition(other) => ConvertError::InvalidState(other),
        }
    }
}

/// Rejected or failed `download` call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("No record at index {0}")]
    InvalidIndex(usize),

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Cannot download a file in status {0}")]
    NotDownloadable(FileStatus),

    #[error("Converted output is no longer available; convert the file again")]
    OutputUnavailable,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl From<TransitionError> for DownloadError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotDownloadable(status) => DownloadError::NotDownloadable(status),
            TransitionError::OutputUnavailable => DownloadError::OutputUnavailable,
            other => DownloadError::Delivery(other.to_string()),
        }
    }
}

impl From<StoreError> for DownloadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIndex(index) => DownloadError::InvalidIndex(index),
            StoreError::NotFound(id) => DownloadError::NotFound(id),
            StoreError::Transition(err) => err.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIndex(index) => AppError::InvalidIndex(index),
            StoreError::NotFound(id) => AppError::NotFound(id.to_string()),
            StoreError::Transition(err) => err.into(),
        }
    }
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InvalidIndex(index) => AppError::InvalidIndex(index),
            ConvertError::NotFound(id) => AppError::NotFound(id.to_string()),
            ConvertError::InvalidRequest(err) => err.into(),
            other => AppError::InvalidState(other.to_string()),
        }
    }
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidIndex(index) => AppError::InvalidIndex(index),
            DownloadError::NotFound(id) => AppError::NotFound(id.to_string()),
            DownloadError::Delivery(msg) => AppError::Delivery(msg),
            other => AppError::InvalidState(other.to_string()),
        }
    }
}
