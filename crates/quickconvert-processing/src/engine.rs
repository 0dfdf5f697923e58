//! Core traits for conversion engines
//!
//! An engine is loaded once (`ConversionEngine::load`) and the resulting
//! `Transcoder` is shared by every conversion for the rest of the process.

use async_trait::async_trait;
use bytes::Bytes;
use quickconvert_core::AppError;
use std::sync::Arc;

/// Conversion engine errors
///
/// Clone so a single failed initialization can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid output name: {0}")]
    InvalidOutputName(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Conversion timed out after {0} seconds")]
    Timeout(u64),
}

impl EngineError {
    pub fn is_initialization(&self) -> bool {
        matches!(self, EngineError::Initialization(_))
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Initialization(msg) => AppError::EngineInitialization(msg),
            other => AppError::Conversion(other.to_string()),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Bytes produced by one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedOutput {
    pub bytes: Bytes,
    pub size: u64,
}

impl ConvertedOutput {
    pub fn new(bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self { bytes, size }
    }
}

/// A loaded engine, ready to convert
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `data` (originally named `source_name`) into a file called `output_name`.
    /// The output format is derived from `output_name`'s extension.
    async fn transcode(
        &self,
        source_name: &str,
        data: Bytes,
        output_name: &str,
    ) -> EngineResult<Bytes>;
}

/// Shared handle to a loaded engine
pub type EngineHandle = Arc<dyn Transcoder>;

/// An engine that still has to be loaded
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time, possibly slow initialization
    async fn load(&self) -> EngineResult<EngineHandle>;
}
