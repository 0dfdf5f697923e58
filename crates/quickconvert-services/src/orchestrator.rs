//! Conversion orchestrator
//!
//! `convert` moves the record to `Converting` before it returns; that
//! transition is the per-record lock. The engine call then runs on its own
//! task, bounded by a semaphore, and writes its outcome back by record id.
//! A record removed in the meantime is simply skipped on write-back.

use bytes::Bytes;
use futures::FutureExt;
use quickconvert_core::{ConversionRequest, FileRecord, RecordId, TransitionError};
use quickconvert_processing::{EngineAdapter, EngineError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{ConvertError, StoreError};
use crate::store::FileStore;

/// How a spawned conversion ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Record moved to `Converted`
    Converted { output_size_bytes: u64 },
    /// Record moved to `Error`
    Failed(EngineError),
    /// The record was removed before the conversion finished
    Discarded,
}

impl ConversionOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted { .. })
    }
}

/// Handle to a running conversion. Dropping it does not cancel the conversion.
pub struct ConversionHandle {
    id: RecordId,
    task: JoinHandle<ConversionOutcome>,
}

impl ConversionHandle {
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the conversion to finish.
    pub async fn wait(self) -> ConversionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(record_id = %self.id, error = %e, "Conversion task aborted");
                ConversionOutcome::Failed(EngineError::Conversion(format!(
                    "conversion task aborted: {}",
                    e
                )))
            }
        }
    }
}

/// Everything the spawned task needs, captured at the commit point
struct ConversionJob {
    id: RecordId,
    source_name: String,
    source: Bytes,
    output_name: String,
}

#[derive(Clone)]
pub struct ConversionOrchestrator {
    store: Arc<FileStore>,
    adapter: Arc<EngineAdapter>,
    permits: Arc<Semaphore>,
}

impl ConversionOrchestrator {
    pub fn new(
        store: Arc<FileStore>,
        adapter: Arc<EngineAdapter>,
        max_concurrent_conversions: usize,
    ) -> Self {
        Self {
            store,
            adapter,
            permits: Arc::new(Semaphore::new(max_concurrent_conversions.max(1))),
        }
    }

    /// Start converting the record at `index`.
    ///
    /// On `Ok` the record is already `Converting` and the engine work runs in
    /// the background. Must be called from within a Tokio runtime.
    pub fn convert(
        &self,
        index: usize,
        request: &ConversionRequest,
    ) -> Result<ConversionHandle, ConvertError> {
        request.validate()?;
        let output_name = request.output_full_name();
        let job = self
            .store
            .mutate_at(index, |record| Self::begin(record, &output_name))?;
        Ok(self.spawn(job))
    }

    /// Start converting the record with identity `id`.
    pub fn convert_id(
        &self,
        id: RecordId,
        request: &ConversionRequest,
    ) -> Result<ConversionHandle, ConvertError> {
        request.validate()?;
        let output_name = request.output_full_name();
        let job = self
            .store
            .mutate(id, |record| Self::begin(record, &output_name))?;
        Ok(self.spawn(job))
    }

    /// The commit point: `* -> Converting`, capturing the source payload.
    fn begin(record: &mut FileRecord, output_name: &str) -> Result<ConversionJob, ConvertError> {
        let source = record
            .source()
            .cloned()
            .ok_or(StoreError::Transition(TransitionError::SourceUnavailable))?;
        record.begin_conversion().map_err(StoreError::from)?;

        Ok(ConversionJob {
            id: record.id(),
            source_name: record.original_name().to_string(),
            source,
            output_name: output_name.to_string(),
        })
    }

    fn spawn(&self, job: ConversionJob) -> ConversionHandle {
        tracing::info!(
            record_id = %job.id,
            source = %job.source_name,
            output = %job.output_name,
            size_bytes = job.source.len(),
            "Conversion started"
        );

        let id = job.id;
        let store = self.store.clone();
        let adapter = self.adapter.clone();
        let permits = self.permits.clone();
        let task = tokio::spawn(Self::run(store, adapter, permits, job));

        ConversionHandle { id, task }
    }

    async fn run(
        store: Arc<FileStore>,
        adapter: Arc<EngineAdapter>,
        permits: Arc<Semaphore>,
        job: ConversionJob,
    ) -> ConversionOutcome {
        let start = Instant::now();
        let ConversionJob {
            id,
            source_name,
            source,
            output_name,
        } = job;

        let work = {
            let output_name = output_name.clone();
            async move {
                let _permit = permits.acquire_owned().await.map_err(|_| {
                    EngineError::Conversion("conversion pool is closed".to_string())
                })?;
                let handle = adapter.ensure_ready().await?;
                adapter
                    .convert(&handle, &source_name, source, &output_name)
                    .await
            }
        };

        // A panicking engine still has to move the record out of `Converting`
        let result = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(EngineError::Conversion(format!(
                "engine panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        let (write_back, outcome) = match result {
            Ok(output) => {
                let size = output.size;
                let write_back = store.mutate(id, |record| {
                    Ok::<_, StoreError>(record.complete_conversion(&output_name, output.bytes)?)
                });
                tracing::info!(
                    record_id = %id,
                    output = %output_name,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Conversion finished"
                );
                (
                    write_back,
                    ConversionOutcome::Converted {
                        output_size_bytes: size,
                    },
                )
            }
            Err(e) => {
                let write_back = store.mutate(id, |record| {
                    Ok::<_, StoreError>(record.fail_conversion(e.to_string())?)
                });
                tracing::error!(
                    record_id = %id,
                    output = %output_name,
                    error = %e,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Conversion failed"
                );
                (write_back, ConversionOutcome::Failed(e))
            }
        };

        match write_back {
            Ok(()) => outcome,
            Err(e) => {
                tracing::debug!(
                    record_id = %id,
                    reason = %e,
                    "Conversion result discarded"
                );
                ConversionOutcome::Discarded
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
