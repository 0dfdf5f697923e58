//! Telemetry initialization
//!
//! Installs the global `tracing` subscriber. Logs go to stderr so command
//! output on stdout stays clean.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, TelemetryConfig};
