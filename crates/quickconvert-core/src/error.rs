//! Error types module
//!
//! `AppError` is the application-level view of every failure the engine can
//! report. Library crates keep their own `thiserror` enums and convert into
//! `AppError` at the presentation boundary, where `ErrorMetadata` decides how a
//! failure is logged and what the user sees.

use crate::models::{RequestError, TransitionError};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like a stale index
    Debug,
    /// Warning level - for recoverable issues like degraded persistence
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "CONVERSION_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No record at index {0}")]
    InvalidIndex(usize),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conversion engine failed to initialize: {0}")]
    EngineInitialization(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Output delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::InvalidIndex(_) => (
            "INVALID_INDEX",
            false,
            Some("Run `list` to see current positions"),
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => ("NOT_FOUND", false, None, LogLevel::Debug),
        AppError::EngineInitialization(_) => (
            "ENGINE_UNAVAILABLE",
            true,
            Some("Check the engine installation and try again"),
            LogLevel::Error,
        ),
        AppError::Conversion(_) => (
            "CONVERSION_FAILED",
            true,
            Some("Try a different output format or file"),
            LogLevel::Warn,
        ),
        AppError::Persistence(_) => (
            "PERSISTENCE_ERROR",
            true,
            Some("Changes are kept in memory for this session only"),
            LogLevel::Warn,
        ),
        AppError::Delivery(_) => (
            "DELIVERY_FAILED",
            true,
            Some("Check that the output directory is writable"),
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, None, LogLevel::Debug),
        AppError::InvalidState(_) => ("INVALID_STATE", false, None, LogLevel::Debug),
        AppError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check QUICKCONVERT_* environment variables"),
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            ("INTERNAL_ERROR", false, None, LogLevel::Error)
        }
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidIndex(index) => format!("No file at position {}", index),
            AppError::NotFound(_) => "File no longer exists".to_string(),
            AppError::EngineInitialization(_) => {
                "The conversion engine could not be loaded".to_string()
            }
            // The engine's cause stays in the logs and on the record
            AppError::Conversion(_) => "The file could not be converted".to_string(),
            AppError::Persistence(_) => "Could not save the file list".to_string(),
            AppError::Delivery(ref msg) => format!("Could not save the download: {}", msg),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::InvalidState(ref msg) => msg.clone(),
            AppError::Config(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
        }
    }
}
