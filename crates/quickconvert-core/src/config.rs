//! Configuration module
//!
//! Settings are read from the environment (and an optional `.env` file) with
//! named defaults, then checked by [`Config::validate`].

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::DEFAULT_STATE_KEY;
use crate::storage_types::StorageBackend;

const DEFAULT_STATE_DIR: &str = "./.quickconvert";
const DEFAULT_OUTPUT_DIR: &str = "./converted";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const ENGINE_TIMEOUT_SECS: u64 = 300;
const MAX_CONCURRENT_CONVERSIONS: usize = 4;

/// Conversion engine implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Pure-Rust image codecs
    Image,
    /// External ffmpeg binary
    Ffmpeg,
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(EngineKind::Image),
            "ffmpeg" => Ok(EngineKind::Ffmpeg),
            _ => Err(anyhow::anyhow!("Invalid engine: {}", s)),
        }
    }
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EngineKind::Image => write!(f, "image"),
            EngineKind::Ffmpeg => write!(f, "ffmpeg"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// Directory backing the local key-value store
    pub state_dir: PathBuf,
    /// Fixed namespace key the collection is persisted under
    pub state_key: String,
    /// Where delivered downloads are written
    pub output_dir: PathBuf,
    pub engine: EngineKind,
    pub ffmpeg_path: String,
    /// Upper bound for a single external engine run; 0 disables the limit
    pub engine_timeout_secs: u64,
    pub max_concurrent_conversions: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            state_key: DEFAULT_STATE_KEY.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            engine: EngineKind::Image,
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            engine_timeout_secs: ENGINE_TIMEOUT_SECS,
            max_concurrent_conversions: MAX_CONCURRENT_CONVERSIONS,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let storage_backend = match lookup("QUICKCONVERT_STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };

        let engine = match lookup("QUICKCONVERT_ENGINE") {
            Some(value) => value.parse()?,
            None => defaults.engine,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        let engine_timeout_secs = match lookup("QUICKCONVERT_ENGINE_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|e| {
                anyhow::anyhow!("QUICKCONVERT_ENGINE_TIMEOUT_SECS must be a number of seconds: {}", e)
            })?,
            None => ENGINE_TIMEOUT_SECS,
        };

        let max_concurrent_conversions = match lookup("QUICKCONVERT_MAX_CONCURRENT_CONVERSIONS") {
            Some(value) => value.trim().parse::<usize>().map_err(|e| {
                anyhow::anyhow!("QUICKCONVERT_MAX_CONCURRENT_CONVERSIONS must be a number: {}", e)
            })?,
            None => MAX_CONCURRENT_CONVERSIONS,
        };

        let config = Config {
            storage_backend,
            state_dir: lookup("QUICKCONVERT_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            state_key: lookup("QUICKCONVERT_STATE_KEY").unwrap_or(defaults.state_key),
            output_dir: lookup("QUICKCONVERT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            engine,
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            engine_timeout_secs,
            max_concurrent_conversions,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.state_key.trim().is_empty() {
            return Err(anyhow::anyhow!("QUICKCONVERT_STATE_KEY must not be empty"));
        }
        if self.max_concurrent_conversions == 0 {
            return Err(anyhow::anyhow!(
                "QUICKCONVERT_MAX_CONCURRENT_CONVERSIONS must be at least 1"
            ));
        }
        if self.engine == EngineKind::Ffmpeg && self.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "FFMPEG_PATH must be set when QUICKCONVERT_ENGINE=ffmpeg"
            ));
        }
        Ok(())
    }
}
