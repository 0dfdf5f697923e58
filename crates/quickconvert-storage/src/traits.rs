//! Storage abstraction trait
//!
//! This module defines the `KeyValueStore` trait that all storage backends must implement.

use crate::StorageBackend;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key-value storage
///
/// The file store writes the whole collection under one key after every
/// mutation and reads it back once at startup. Calls are synchronous: a
/// mutation and its persistence happen together, with no suspension point in
/// between.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing was stored
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
