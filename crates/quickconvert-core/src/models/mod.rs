pub mod conversion;
pub mod file_record;

pub use conversion::{ConversionRequest, RequestError};
pub use file_record::{
    FileRecord, FileStatus, IngestFile, PersistedRecord, RecordId, TransitionError,
};
