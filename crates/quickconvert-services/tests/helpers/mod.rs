#![allow(dead_code)]

pub mod engine;
pub mod fixtures;

use engine::ScriptedEngine;
use quickconvert_core::FileStatus;
use quickconvert_services::{ConverterSession, MemorySink, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;

pub const STATE_KEY: &str = "fileList";

/// Session over in-memory storage, a memory sink and a scripted engine
pub struct TestSession {
    pub session: ConverterSession,
    pub storage: MemoryStorage,
    pub sink: MemorySink,
    pub engine: ScriptedEngine,
}

impl TestSession {
    pub fn status(&self, index: usize) -> FileStatus {
        self.session.store().snapshot()[index].status()
    }

    /// A fresh session over the same storage, as after a restart
    pub fn reload(&self) -> TestSession {
        setup_session_with(self.storage.clone())
    }
}

pub fn setup_session() -> TestSession {
    setup_session_with(MemoryStorage::new())
}

pub fn setup_session_with(storage: MemoryStorage) -> TestSession {
    let sink = MemorySink::new();
    let engine = ScriptedEngine::new();
    let session = ConverterSession::new(
        Arc::new(storage.clone()),
        STATE_KEY,
        engine.as_engine(),
        Arc::new(sink.clone()),
        4,
    );

    TestSession {
        session,
        storage,
        sink,
        engine,
    }
}

/// Poll until `check` holds, failing the test after a few seconds.
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
