//! Quickconvert Storage Library
//!
//! This crate provides the durable key-value storage the file collection is
//! persisted to: the `KeyValueStore` trait plus local-filesystem and in-memory
//! implementations.
//!
//! # Key format
//!
//! Keys are flat names (the collection uses a single fixed key, `fileList` by
//! default). Keys must be non-empty and must not contain path separators or
//! `..`. Validation is centralized in the `keys` module so all backends agree.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use quickconvert_core::StorageBackend;
pub use traits::{KeyValueStore, StorageError, StorageResult};
