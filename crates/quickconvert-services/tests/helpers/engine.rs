//! Scripted conversion engine
//!
//! By default every conversion echoes the source bytes. Individual output
//! names can be scripted to fail, or gated so the test decides when (and with
//! what) the engine call resolves.

use async_trait::async_trait;
use bytes::Bytes;
use quickconvert_services::{ConversionEngine, EngineError, EngineHandle, EngineResult, Transcoder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

enum Response {
    Immediate(EngineResult<Bytes>),
    Gated(oneshot::Receiver<EngineResult<Bytes>>),
}

#[derive(Default)]
struct Script {
    responses: Mutex<HashMap<String, Response>>,
    load_failures: AtomicUsize,
    loads: AtomicUsize,
    calls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Script>,
}

/// Releases one gated conversion
pub struct Gate(oneshot::Sender<EngineResult<Bytes>>);

impl Gate {
    pub fn succeed(self, size: usize) {
        let _ = self.0.send(Ok(Bytes::from(vec![0x5a; size])));
    }

    pub fn fail(self, cause: &str) {
        let _ = self.0.send(Err(EngineError::Conversion(cause.to_string())));
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next conversion producing `output_name` waits for the returned gate.
    pub fn gate(&self, output_name: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script
            .responses
            .lock()
            .unwrap()
            .insert(output_name.to_string(), Response::Gated(rx));
        Gate(tx)
    }

    /// The next conversion producing `output_name` returns `size` bytes.
    pub fn respond(&self, output_name: &str, size: usize) {
        self.script.responses.lock().unwrap().insert(
            output_name.to_string(),
            Response::Immediate(Ok(Bytes::from(vec![0x5a; size]))),
        );
    }

    /// The next conversion producing `output_name` is rejected.
    pub fn reject(&self, output_name: &str, cause: &str) {
        self.script.responses.lock().unwrap().insert(
            output_name.to_string(),
            Response::Immediate(Err(EngineError::Conversion(cause.to_string()))),
        );
    }

    /// Fail the next `count` load attempts.
    pub fn fail_loads(&self, count: usize) {
        self.script.load_failures.store(count, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.script.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn as_engine(&self) -> Arc<dyn ConversionEngine> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ConversionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn load(&self) -> EngineResult<EngineHandle> {
        self.script.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let remaining = self.script.load_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.script
                .load_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::Initialization("engine assets missing".to_string()));
        }
        Ok(Arc::new(ScriptedTranscoder {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedTranscoder {
    script: Arc<Script>,
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn transcode(
        &self,
        _source_name: &str,
        data: Bytes,
        output_name: &str,
    ) -> EngineResult<Bytes> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.script.responses.lock().unwrap().remove(output_name);
        match response {
            None => Ok(data),
            Some(Response::Immediate(result)) => result,
            Some(Response::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(EngineError::Conversion("gate dropped".to_string()))),
        }
    }
}
