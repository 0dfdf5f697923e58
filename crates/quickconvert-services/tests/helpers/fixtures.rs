use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use quickconvert_core::IngestFile;
use std::io::Cursor;

/// A file of `size` filler bytes
pub fn blob(name: &str, mime_type: &str, size: usize) -> IngestFile {
    IngestFile::from_bytes(name, mime_type, Bytes::from(vec![0xa5; size]))
}

pub fn png_file(name: &str, width: u32, height: u32) -> IngestFile {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 200, 255])
    });
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    IngestFile::from_bytes(name, "image/png", buffer)
}
