use anyhow::{Context, Result};
use quickconvert_core::{Config, ConversionRequest, IngestFile, RecordId};
use quickconvert_processing::{create_engine, ConversionEngine, EngineAdapter, EngineResult};
use quickconvert_storage::{create_storage, KeyValueStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::download::{DeliveredOutput, DirectorySink, DownloadDispatcher, OutputSink};
use crate::error::{ConvertError, DownloadError};
use crate::orchestrator::{ConversionHandle, ConversionOrchestrator};
use crate::store::FileStore;

/// One converter session: the store and every collaborator that acts on it.
pub struct ConverterSession {
    store: Arc<FileStore>,
    adapter: Arc<EngineAdapter>,
    orchestrator: ConversionOrchestrator,
    downloads: DownloadDispatcher,
}

impl ConverterSession {
    /// Build a session from configuration and rehydrate the persisted file list.
    ///
    /// A storage backend that cannot be opened does not stop the session: the
    /// file list is kept in memory only.
    pub fn open(config: &Config) -> Result<Self> {
        let engine = create_engine(config).context("Failed to create conversion engine")?;
        let sink = Arc::new(DirectorySink::new(config.output_dir.clone()));

        let store = match create_storage(config) {
            Ok(storage) => FileStore::open(storage, &config.state_key),
            Err(e) => {
                tracing::warn!(
                    backend = %config.storage_backend,
                    error = %e,
                    "Failed to open state storage; the file list will be kept in memory only"
                );
                FileStore::detached(&config.state_key)
            }
        };

        Ok(Self::assemble(
            store,
            engine,
            sink,
            config.max_concurrent_conversions,
        ))
    }

    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        state_key: &str,
        engine: Arc<dyn ConversionEngine>,
        sink: Arc<dyn OutputSink>,
        max_concurrent_conversions: usize,
    ) -> Self {
        Self::assemble(
            FileStore::open(storage, state_key),
            engine,
            sink,
            max_concurrent_conversions,
        )
    }

    fn assemble(
        store: FileStore,
        engine: Arc<dyn ConversionEngine>,
        sink: Arc<dyn OutputSink>,
        max_concurrent_conversions: usize,
    ) -> Self {
        let store = Arc::new(store);
        let adapter = Arc::new(EngineAdapter::new(engine));
        let orchestrator =
            ConversionOrchestrator::new(store.clone(), adapter.clone(), max_concurrent_conversions);
        let downloads = DownloadDispatcher::new(store.clone(), sink);

        Self {
            store,
            adapter,
            orchestrator,
            downloads,
        }
    }

    /// Start loading the engine in the background so the first conversion
    /// does not pay for it. Must be called from within a Tokio runtime.
    pub fn warm_up(&self) -> JoinHandle<EngineResult<()>> {
        let adapter = self.adapter.clone();
        tokio::spawn(async move { adapter.ensure_ready().await.map(|_| ()) })
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn adapter(&self) -> &Arc<EngineAdapter> {
        &self.adapter
    }

    pub fn orchestrator(&self) -> &ConversionOrchestrator {
        &self.orchestrator
    }

    pub fn downloads(&self) -> &DownloadDispatcher {
        &self.downloads
    }

    pub fn ingest(&self, files: Vec<IngestFile>) -> Vec<RecordId> {
        self.store.ingest(files)
    }

    pub fn convert(
        &self,
        index: usize,
        request: &ConversionRequest,
    ) -> Result<ConversionHandle, ConvertError> {
        self.orchestrator.convert(index, request)
    }

    pub fn download(&self, index: usize) -> Result<DeliveredOutput, DownloadError> {
        self.downloads.download(index)
    }

    pub fn remove(&self, index: usize) -> bool {
        self.store.remove(index).is_some()
    }
}
