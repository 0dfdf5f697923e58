//! Quickconvert Infrastructure Library
//!
//! Shared infrastructure for quickconvert front ends:
//! - Telemetry initialization (tracing subscriber setup)
//! - Error reporting (logging an `AppError` at its level, user-facing report)

pub mod error;
pub mod telemetry;

// Re-export commonly used types
pub use error::{log_error, ErrorReport};
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
