//! Engine backed by an external ffmpeg binary
//!
//! Loading runs `ffmpeg -version` once to make sure the binary exists and
//! works. Each conversion writes the input to a private temp directory, lets
//! ffmpeg pick the muxer from the output extension, and reads the result back.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use crate::engine::{ConversionEngine, EngineError, EngineHandle, EngineResult, Transcoder};

/// Longest stderr excerpt kept in an error message
const STDERR_EXCERPT_CHARS: usize = 2048;

pub struct FfmpegEngine {
    ffmpeg_path: String,
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    /// `timeout_secs == 0` disables the per-conversion time limit.
    pub fn new(ffmpeg_path: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}

#[async_trait]
impl ConversionEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn load(&self) -> EngineResult<EngineHandle> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                EngineError::Initialization(format!(
                    "Failed to execute {}: {}",
                    self.ffmpeg_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(EngineError::Initialization(format!(
                "{} -version exited with {}",
                self.ffmpeg_path, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or("unknown version");
        tracing::info!(path = %self.ffmpeg_path, version = %version, "ffmpeg available");

        Ok(Arc::new(FfmpegTranscoder {
            ffmpeg_path: self.ffmpeg_path.clone(),
            timeout: self.timeout,
        }))
    }
}

struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    /// Input file name inside the temp dir. The original extension is kept
    /// because some demuxers rely on it.
    fn input_file_name(source_name: &str) -> String {
        match Path::new(source_name).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                format!("input.{}", ext)
            }
            _ => "input".to_string(),
        }
    }

    /// Input and output live in separate subdirectories, so no output name can
    /// point ffmpeg at its own input.
    fn staging_paths(dir: &Path, source_name: &str, output_name: &str) -> (PathBuf, PathBuf) {
        (
            dir.join("in").join(Self::input_file_name(source_name)),
            dir.join("out").join(output_name),
        )
    }

    fn validate_output_name(output_name: &str) -> EngineResult<()> {
        let path = Path::new(output_name);
        let single_component = path.file_name().map(|n| n == path.as_os_str()) == Some(true);
        if !single_component || path.extension().is_none() {
            return Err(EngineError::InvalidOutputName(output_name.to_string()));
        }
        Ok(())
    }

    async fn run(&self, input: &Path, output: &Path) -> EngineResult<()> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"])
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| EngineError::Timeout(limit.as_secs()))?,
            None => run.await,
        };

        let output = result
            .map_err(|e| EngineError::Conversion(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.chars().take(STDERR_EXCERPT_CHARS).collect();
            return Err(EngineError::Conversion(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                excerpt.trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        source_name: &str,
        data: Bytes,
        output_name: &str,
    ) -> EngineResult<Bytes> {
        Self::validate_output_name(output_name)?;

        let temp_dir = TempDir::new()
            .map_err(|e| EngineError::Conversion(format!("Failed to create temp dir: {}", e)))?;
        let (input_path, output_path) =
            Self::staging_paths(temp_dir.path(), source_name, output_name);
        for dir in [input_path.parent(), output_path.parent()].into_iter().flatten() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| EngineError::Conversion(format!("Failed to create temp dir: {}", e)))?;
        }

        tokio::fs::write(&input_path, &data)
            .await
            .map_err(|e| EngineError::Conversion(format!("Failed to stage input: {}", e)))?;

        tracing::debug!(
            source = %source_name,
            output = %output_name,
            input_bytes = data.len(),
            "Running ffmpeg"
        );
        self.run(&input_path, &output_path).await?;

        let converted = tokio::fs::read(&output_path)
            .await
            .map_err(|e| EngineError::Conversion(format!("ffmpeg produced no output: {}", e)))?;

        Ok(Bytes::from(converted))
    }
}
