use serde::{Deserialize, Serialize};

use super::file_record::FileRecord;

/// Rejected conversion request. Checked before the record is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("target name must not be empty")]
    EmptyBaseName,

    #[error("target name must not contain path separators: {0}")]
    InvalidBaseName(String),

    #[error("target format must not be empty")]
    EmptyFormat,

    #[error("target format must be alphanumeric: {0}")]
    InvalidFormat(String),
}

/// Candidate output the user is editing for a record before committing.
///
/// Owned by the presentation layer; the orchestrator only reads it when
/// `convert` is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub target_base_name: String,
    pub target_format: String,
}

impl ConversionRequest {
    pub fn new(target_base_name: impl Into<String>, target_format: impl Into<String>) -> Self {
        Self {
            target_base_name: target_base_name.into(),
            target_format: target_format.into(),
        }
    }

    /// Pre-filled request for a record: its current stem and type.
    pub fn defaults_for(record: &FileRecord) -> Self {
        let name = record.original_name();
        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
            _ => (name, None),
        };

        let format = extension
            .map(|ext| ext.to_lowercase())
            .or_else(|| {
                record
                    .original_mime_type()
                    .split_once('/')
                    .map(|(_, subtype)| subtype.to_lowercase())
            })
            .unwrap_or_default();

        Self::new(stem, format)
    }

    /// `<target_base_name>.<target_format>`, surrounding whitespace removed
    pub fn output_full_name(&self) -> String {
        format!("{}.{}", self.base_name(), self.format())
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        let base = self.base_name();
        if base.is_empty() {
            return Err(RequestError::EmptyBaseName);
        }
        if base.contains('/') || base.contains('\\') || base == "." || base == ".." {
            return Err(RequestError::InvalidBaseName(base.to_string()));
        }

        let format = self.format();
        if format.is_empty() {
            return Err(RequestError::EmptyFormat);
        }
        if !format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RequestError::InvalidFormat(format.to_string()));
        }

        Ok(())
    }

    fn base_name(&self) -> &str {
        self.target_base_name.trim()
    }

    fn format(&self) -> &str {
        self.target_format.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngestFile;
    use bytes::Bytes;

    fn record(name: &str, mime: &str) -> FileRecord {
        FileRecord::from_ingest(IngestFile::from_bytes(name, mime, Bytes::from_static(b"x")))
    }

    #[test]
    fn test_output_full_name() {
        let request = ConversionRequest::new("photo", "webp");
        assert_eq!(request.output_full_name(), "photo.webp");
    }

    #[test]
    fn test_output_full_name_ignores_surrounding_whitespace() {
        let request = ConversionRequest::new(" photo ", "webp\n");
        assert!(request.validate().is_ok());
        assert_eq!(request.output_full_name(), "photo.webp");
    }

    #[test]
    fn test_defaults_from_extension() {
        let request = ConversionRequest::defaults_for(&record("holiday.photo.PNG", "image/png"));
        assert_eq!(request, ConversionRequest::new("holiday.photo", "png"));
    }

    #[test]
    fn test_defaults_fall_back_to_mime_subtype() {
        let request = ConversionRequest::defaults_for(&record("scan", "image/tiff"));
        assert_eq!(request, ConversionRequest::new("scan", "tiff"));

        let hidden = ConversionRequest::defaults_for(&record(".profile", "image/jpeg"));
        assert_eq!(hidden, ConversionRequest::new(".profile", "jpeg"));
    }

    #[test]
    fn test_validate() {
        assert!(ConversionRequest::new("photo", "webp").validate().is_ok());
        assert_eq!(
            ConversionRequest::new("  ", "webp").validate(),
            Err(RequestError::EmptyBaseName)
        );
        assert!(matches!(
            ConversionRequest::new("../photo", "webp").validate(),
            Err(RequestError::InvalidBaseName(_))
        ));
        assert_eq!(
            ConversionRequest::new("photo", "").validate(),
            Err(RequestError::EmptyFormat)
        );
        assert!(matches!(
            ConversionRequest::new("photo", "we.bp").validate(),
            Err(RequestError::InvalidFormat(_))
        ));
    }
}
