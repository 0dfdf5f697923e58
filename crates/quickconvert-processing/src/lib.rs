//! Quickconvert Processing Library
//!
//! This crate holds the conversion engine collaborator: the `ConversionEngine`
//! and `Transcoder` traits, the `EngineAdapter` that initializes one shared
//! engine lazily, and the engine implementations.

pub mod adapter;
pub mod engine;
pub mod factory;
pub mod format;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "image")]
pub mod raster;

// Re-export commonly used types
pub use adapter::EngineAdapter;
pub use engine::{
    ConversionEngine, ConvertedOutput, EngineError, EngineHandle, EngineResult, Transcoder,
};
pub use factory::create_engine;
pub use format::OutputFormat;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegEngine;
#[cfg(feature = "image")]
pub use raster::ImageEngine;
