//! Quickconvert Services Layer
//!
//! This crate holds the file lifecycle and conversion orchestration: the
//! persistent `FileStore`, the `ConversionOrchestrator` that drives each
//! record's status, the `DownloadDispatcher` with its output sinks, and the
//! `ConverterSession` that wires them to storage and engine backends. It also
//! re-exports the parts of the lower crates a front end needs, so a binary can
//! depend on this crate alone.

pub mod download;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use download::{DeliveredOutput, DirectorySink, DownloadDispatcher, MemorySink, OutputSink};
pub use error::{ConvertError, DownloadError, StoreError};
pub use orchestrator::{ConversionHandle, ConversionOrchestrator, ConversionOutcome};
pub use session::ConverterSession;
pub use store::FileStore;

pub use quickconvert_processing::{
    ConversionEngine, EngineAdapter, EngineError, EngineHandle, EngineResult, OutputFormat,
    Transcoder,
};
pub use quickconvert_storage::{KeyValueStore, MemoryStorage, StorageError};
