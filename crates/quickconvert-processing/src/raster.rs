//! Pure-Rust image engine built on the `image` crate
//!
//! Decodes any format `image` can guess from the content and re-encodes it in
//! the format named by the output extension.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;
use std::sync::Arc;

use crate::engine::{ConversionEngine, EngineError, EngineHandle, EngineResult, Transcoder};
use crate::format::OutputFormat;

/// ICO entries cannot exceed 256x256
const ICO_MAX_DIMENSION: u32 = 256;

pub struct ImageEngine;

impl ImageEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionEngine for ImageEngine {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn load(&self) -> EngineResult<EngineHandle> {
        tracing::debug!(
            formats = ?OutputFormat::ALL.map(OutputFormat::extension),
            "Image engine codecs available"
        );
        Ok(Arc::new(ImageTranscoder))
    }
}

struct ImageTranscoder;

#[async_trait]
impl Transcoder for ImageTranscoder {
    async fn transcode(
        &self,
        source_name: &str,
        data: Bytes,
        output_name: &str,
    ) -> EngineResult<Bytes> {
        let format = OutputFormat::from_file_name(output_name)?;
        let source_name = source_name.to_string();

        // Codec work is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || ImageTranscoder::encode(&source_name, &data, format))
            .await
            .map_err(|e| EngineError::Conversion(format!("Image worker failed: {}", e)))?
    }
}

impl ImageTranscoder {
    fn encode(source_name: &str, data: &[u8], format: OutputFormat) -> EngineResult<Bytes> {
        let img = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| EngineError::Conversion(format!("Failed to read {}: {}", source_name, e)))?
            .decode()
            .map_err(|e| {
                EngineError::Conversion(format!("Failed to decode {}: {}", source_name, e))
            })?;

        let img = Self::prepare_for(img, format);

        let (width, height) = img.dimensions();
        let mut buffer = Vec::with_capacity(width as usize * height as usize * 3);
        img.write_to(&mut Cursor::new(&mut buffer), format.to_image_format())
            .map_err(|e| {
                EngineError::Conversion(format!(
                    "Failed to encode {} as {}: {}",
                    source_name, format, e
                ))
            })?;

        tracing::debug!(
            source = %source_name,
            format = %format,
            width,
            height,
            output_bytes = buffer.len(),
            "Image encoded"
        );

        Ok(Bytes::from(buffer))
    }

    /// Adapt the pixel layout to what each encoder accepts.
    fn prepare_for(img: DynamicImage, format: OutputFormat) -> DynamicImage {
        match format {
            // No alpha channel in JPEG
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            // 8-bit only encoders
            OutputFormat::WebP | OutputFormat::Gif | OutputFormat::Bmp => {
                DynamicImage::ImageRgba8(img.to_rgba8())
            }
            OutputFormat::Ico => {
                let (width, height) = img.dimensions();
                let img = if width > ICO_MAX_DIMENSION || height > ICO_MAX_DIMENSION {
                    img.thumbnail(ICO_MAX_DIMENSION, ICO_MAX_DIMENSION)
                } else {
                    img
                };
                DynamicImage::ImageRgba8(img.to_rgba8())
            }
            OutputFormat::Png | OutputFormat::Tiff => img,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn sample_png(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 5) as u8, 128, if x % 2 == 0 { 255 } else { 96 }])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    async fn transcoder() -> EngineHandle {
        ImageEngine::new().load().await.unwrap()
    }

    #[tokio::test]
    async fn test_png_to_every_format() {
        let handle = transcoder().await;
        let source = sample_png(32, 24);

        for format in OutputFormat::ALL {
            let output_name = format!("photo.{}", format.extension());
            let output = handle
                .transcode("photo.png", source.clone(), &output_name)
                .await
                .unwrap_or_else(|e| panic!("{} failed: {}", format, e));

            let guessed = image::guess_format(&output).unwrap();
            assert_eq!(guessed, format.to_image_format(), "format {}", format);
        }
    }

    #[tokio::test]
    async fn test_jpeg_output_keeps_dimensions() {
        let handle = transcoder().await;
        let output = handle
            .transcode("photo.png", sample_png(40, 30), "photo.jpg")
            .await
            .unwrap();

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[tokio::test]
    async fn test_ico_output_is_downscaled() {
        let handle = transcoder().await;
        let output = handle
            .transcode("big.png", sample_png(300, 150), "big.ico")
            .await
            .unwrap();

        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Ico).unwrap();
        let (width, height) = decoded.dimensions();
        assert!(width <= ICO_MAX_DIMENSION && height <= ICO_MAX_DIMENSION);
    }

    #[tokio::test]
    async fn test_corrupt_input_is_conversion_error() {
        let handle = transcoder().await;
        let result = handle
            .transcode("broken.png", Bytes::from_static(b"not an image"), "broken.webp")
            .await;
        assert!(matches!(result, Err(EngineError::Conversion(_))));
    }

    #[tokio::test]
    async fn test_unsupported_output_format() {
        let handle = transcoder().await;
        let result = handle
            .transcode("photo.png", sample_png(4, 4), "photo.heic")
            .await;
        assert_eq!(result, Err(EngineError::UnsupportedFormat("heic".to_string())));
    }
}
