//! Quickconvert Core Library
//!
//! This crate provides the domain models, error types and configuration that are
//! shared across all quickconvert components: the file record and its status
//! state machine, the ephemeral conversion request, and environment-driven config.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, EngineKind, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ConversionRequest, FileRecord, FileStatus, IngestFile, PersistedRecord, RecordId,
    RequestError, TransitionError,
};
pub use storage_types::StorageBackend;
