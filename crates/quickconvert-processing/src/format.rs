use anyhow::{anyhow, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::engine::EngineError;

/// Output formats the built-in image engine can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Ico,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Png,
        OutputFormat::Jpeg,
        OutputFormat::WebP,
        OutputFormat::Gif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
        OutputFormat::Ico,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "gif" => Ok(OutputFormat::Gif),
            "bmp" => Ok(OutputFormat::Bmp),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "ico" => Ok(OutputFormat::Ico),
            _ => Err(anyhow!("Invalid format: {}", s)),
        }
    }

    /// Format implied by a file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, EngineError> {
        let (stem, extension) = file_name
            .rsplit_once('.')
            .ok_or_else(|| EngineError::InvalidOutputName(file_name.to_string()))?;
        if stem.is_empty() || extension.is_empty() {
            return Err(EngineError::InvalidOutputName(file_name.to_string()));
        }
        Self::parse(extension).map_err(|_| EngineError::UnsupportedFormat(extension.to_string()))
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::WebP => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Ico => "ico",
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Bmp => "image/bmp",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Ico => "image/x-icon",
        }
    }

    #[cfg(feature = "image")]
    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::WebP => image::ImageFormat::WebP,
            OutputFormat::Gif => image::ImageFormat::Gif,
            OutputFormat::Bmp => image::ImageFormat::Bmp,
            OutputFormat::Tiff => image::ImageFormat::Tiff,
            OutputFormat::Ico => image::ImageFormat::Ico,
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.extension())
    }
}
