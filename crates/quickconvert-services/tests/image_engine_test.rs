#[path = "helpers/mod.rs"]
mod helpers;

use helpers::fixtures::png_file;
use quickconvert_core::{Config, ConversionRequest, FileStatus, StorageBackend};
use quickconvert_services::ConverterSession;
use tempfile::tempdir;

#[tokio::test]
async fn test_png_to_webp_end_to_end() {
    let dir = tempdir().unwrap();
    let config = Config {
        state_dir: dir.path().join("state"),
        output_dir: dir.path().join("downloads"),
        ..Config::default()
    };

    let session = ConverterSession::open(&config).unwrap();
    session.ingest(vec![png_file("photo.png", 64, 48)]);

    let outcome = session
        .convert(0, &ConversionRequest::new("photo", "webp"))
        .unwrap()
        .wait()
        .await;
    assert!(outcome.is_converted(), "{:?}", outcome);

    let delivered = session.download(0).unwrap();
    let path = delivered.path.unwrap();
    assert_eq!(path, dir.path().join("downloads/photo.webp"));

    let saved = std::fs::read(&path).unwrap();
    assert_eq!(
        image::guess_format(&saved).unwrap(),
        image::ImageFormat::WebP
    );
    let decoded = image::load_from_memory(&saved).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    // Second session over the same state directory
    let reopened = ConverterSession::open(&config).unwrap();
    let record = &reopened.store().snapshot()[0];
    assert_eq!(record.status(), FileStatus::Downloaded);
    assert_eq!(record.output_full_name(), "photo.webp");
    assert!(record.is_stale());
}

#[tokio::test]
async fn test_unsupported_target_format_fails_cleanly() {
    let config = Config {
        storage_backend: StorageBackend::Memory,
        ..Config::default()
    };

    let session = ConverterSession::open(&config).unwrap();
    session.ingest(vec![png_file("photo.png", 8, 8)]);

    let outcome = session
        .convert(0, &ConversionRequest::new("photo", "heic"))
        .unwrap()
        .wait()
        .await;
    assert!(!outcome.is_converted());

    let record = &session.store().snapshot()[0];
    assert_eq!(record.status(), FileStatus::Error);
    assert!(record.last_error().unwrap().contains("heic"));
}
