/// Key under which the whole record collection is persisted.
pub const DEFAULT_STATE_KEY: &str = "fileList";

/// Cause recorded on records that were mid-conversion when the previous session ended.
pub const INTERRUPTED_CONVERSION_CAUSE: &str = "interrupted before completion";

/// MIME type used when the ingestion collaborator cannot tell.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";
