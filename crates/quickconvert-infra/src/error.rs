//! Error reporting for front ends
//!
//! `log_error` records an `AppError` at the level its metadata asks for;
//! `ErrorReport` is what the user sees.

use quickconvert_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// User-facing error summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub error: String,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorReport {
    pub fn from_error(error: &AppError) -> Self {
        Self {
            error: error.client_message(),
            code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action().map(String::from),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.error.clone())
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "error: {}", self.error)?;
        if let Some(action) = &self.suggested_action {
            write!(f, " ({})", action)?;
        }
        Ok(())
    }
}

/// Log `error` with its full internal detail at its configured level.
pub fn log_error(error: &AppError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code, "Operation rejected"),
        LogLevel::Warn => tracing::warn!(error = %error, code, "Operation failed"),
        LogLevel::Error => tracing::error!(error = %error, code, "Operation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_hides_conversion_cause() {
        let report = ErrorReport::from_error(&AppError::Conversion(
            "libwebp: bitstream error at 0x40".to_string(),
        ));
        assert_eq!(report.code, "CONVERSION_FAILED");
        assert!(report.recoverable);
        assert!(!report.to_string().contains("0x40"));
    }

    #[test]
    fn test_report_json_omits_missing_action() {
        let report = ErrorReport::from_error(&AppError::NotFound("abc".to_string()));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("suggested_action").is_none());
    }
}
