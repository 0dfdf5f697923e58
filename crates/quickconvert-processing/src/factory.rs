#[cfg(feature = "ffmpeg")]
use crate::FfmpegEngine;
#[cfg(feature = "image")]
use crate::ImageEngine;
use crate::{ConversionEngine, EngineResult};
use quickconvert_core::{Config, EngineKind};
use std::sync::Arc;

/// Create the configured conversion engine. Nothing is loaded yet.
pub fn create_engine(config: &Config) -> EngineResult<Arc<dyn ConversionEngine>> {
    match config.engine {
        #[cfg(feature = "image")]
        EngineKind::Image => {
            tracing::info!("Using built-in image engine");
            Ok(Arc::new(ImageEngine::new()))
        }

        #[cfg(not(feature = "image"))]
        EngineKind::Image => Err(crate::EngineError::Initialization(
            "Image engine not available (image feature not enabled)".to_string(),
        )),

        #[cfg(feature = "ffmpeg")]
        EngineKind::Ffmpeg => {
            tracing::info!(
                path = %config.ffmpeg_path,
                timeout_secs = config.engine_timeout_secs,
                "Using ffmpeg engine"
            );
            Ok(Arc::new(FfmpegEngine::new(
                config.ffmpeg_path.clone(),
                config.engine_timeout_secs,
            )))
        }

        #[cfg(not(feature = "ffmpeg"))]
        EngineKind::Ffmpeg => Err(crate::EngineError::Initialization(
            "ffmpeg engine not available (ffmpeg feature not enabled)".to_string(),
        )),
    }
}
