//! Engine adapter: lazy, at-most-once engine initialization
//!
//! The first `ensure_ready` call starts loading the engine. Callers arriving
//! while that load is in flight await the same future instead of starting a
//! second load. A successful handle is cached for the process lifetime; a
//! failed load is forgotten so the next call retries.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::engine::{ConversionEngine, ConvertedOutput, EngineHandle, EngineResult};

type LoadFuture = Shared<BoxFuture<'static, EngineResult<EngineHandle>>>;

enum LoadState {
    Idle,
    Loading { generation: u64, future: LoadFuture },
    Ready(EngineHandle),
}

pub struct EngineAdapter {
    engine: Arc<dyn ConversionEngine>,
    state: Mutex<LoadState>,
    generations: AtomicU64,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn ConversionEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(LoadState::Idle),
            generations: AtomicU64::new(0),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            LoadState::Ready(_)
        )
    }

    /// Load the engine if needed and return the shared handle.
    pub async fn ensure_ready(&self) -> EngineResult<EngineHandle> {
        let (generation, future) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match &*state {
                LoadState::Ready(handle) => return Ok(handle.clone()),
                LoadState::Loading { generation, future } => (*generation, future.clone()),
                LoadState::Idle => {
                    let generation = self.next_generation();
                    let future = Self::start_load(self.engine.clone());
                    *state = LoadState::Loading {
                        generation,
                        future: future.clone(),
                    };
                    (generation, future)
                }
            }
        };

        let result = future.await;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = matches!(
            &*state,
            LoadState::Loading { generation: g, .. } if *g == generation
        );
        if current {
            *state = match &result {
                Ok(handle) => LoadState::Ready(handle.clone()),
                Err(_) => LoadState::Idle,
            };
        }

        result
    }

    /// Run one conversion on an already-loaded engine.
    pub async fn convert(
        &self,
        handle: &EngineHandle,
        source_name: &str,
        data: Bytes,
        output_name: &str,
    ) -> EngineResult<ConvertedOutput> {
        let start = Instant::now();
        let input_size = data.len();
        let bytes = handle.transcode(source_name, data, output_name).await?;
        let output = ConvertedOutput::new(bytes);

        tracing::debug!(
            engine = self.engine.name(),
            source = %source_name,
            output = %output_name,
            input_bytes = input_size,
            output_bytes = output.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Engine conversion finished"
        );

        Ok(output)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn start_load(engine: Arc<dyn ConversionEngine>) -> LoadFuture {
        async move {
            let start = Instant::now();
            tracing::info!(engine = engine.name(), "Loading conversion engine");

            let result = engine.load().await;
            match &result {
                Ok(_) => tracing::info!(
                    engine = engine.name(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Conversion engine ready"
                ),
                Err(e) => tracing::error!(
                    engine = engine.name(),
                    error = %e,
                    "Conversion engine failed to load"
                ),
            }
            result
        }
        .boxed()
        .shared()
    }
}
