use fixed_ngin::{
    RecordingDevice,
    data_structures::texture::{PixelLayout, SamplerState, TextureHandle},
    device::recording::Command,
    error::TextureError,
    resources::texture::{ImageCrateDecoder, ImageDecoder, Resolved, TextureCache},
};

use tempfile::TempDir;

use crate::common::test_utils::{CountingDecoder, init_logger, touch};

mod common;

fn cache_in(dir: &TempDir, decoder: &CountingDecoder) -> TextureCache {
    TextureCache::with_decoder(
        dir.path().join("media").join("textures"),
        Box::new(decoder.clone()),
    )
}

#[test]
fn second_load_hits_the_cache() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let brick = touch(dir.path(), "brick.png");
    let brick = brick.to_str().unwrap();
    let decoder = CountingDecoder::new(256, 256);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let first = cache.load(&mut device, brick).unwrap();
    let second = cache.load(&mut device, brick).unwrap();

    assert_eq!(first, second);
    assert_eq!(decoder.calls.get(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(device.live_textures(), 1);
    assert_eq!(cache.resolve(brick).unwrap(), Resolved::Cached(first));

    let texture = cache.texture(brick).unwrap();
    assert_eq!((texture.width, texture.height, texture.channels), (256, 256, 4));
    assert_eq!(texture.sampler, SamplerState::REPEAT_TRILINEAR);
}

#[test]
fn upload_sequence_generates_binds_uploads_then_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "stone.jpg");
    let decoder = CountingDecoder::new(4, 2);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let handle = cache.load(&mut device, path.to_str().unwrap()).unwrap();

    assert_eq!(
        device.commands(),
        &[
            Command::GenTexture(handle),
            Command::BindTexture(Some(handle)),
            Command::UploadMipmapped {
                texture: handle,
                width: 4,
                height: 2,
                channels: 3,
            },
            Command::Sampler(handle, SamplerState::REPEAT_TRILINEAR),
        ]
    );
}

#[test]
fn missing_file_falls_back_to_media_textures() {
    let dir = tempfile::tempdir().unwrap();
    let fallback = touch(dir.path(), "media/textures/brick.png");
    let decoder = CountingDecoder::new(8, 8);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let key = "C:\\old\\assets\\brick.png";
    assert_eq!(cache.resolve(key).unwrap(), Resolved::OnDisk(fallback.clone()));

    let handle = cache.load(&mut device, key).unwrap();
    assert_eq!(cache.get(key), Some(handle));
    assert_eq!(cache.texture(key).unwrap().source, fallback);
    // Only the original key is cached.
    assert_eq!(cache.keys().collect::<Vec<_>>(), vec![key]);
}

#[test]
fn missing_everywhere_is_not_found_and_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = CountingDecoder::new(8, 8);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let err = cache.load(&mut device, "textures/ghost.png").unwrap_err();
    match err {
        TextureError::NotFound { path, fallback } => {
            assert_eq!(path, "textures/ghost.png");
            assert!(fallback.ends_with("media/textures/ghost.png"));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(decoder.calls.get(), 0);
    assert!(device.commands().is_empty());
    assert!(cache.is_empty());
}

#[test]
fn unknown_extension_is_rejected_before_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "sky.tga");
    let decoder = CountingDecoder::new(8, 8);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let err = cache.load(&mut device, path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, TextureError::UnsupportedFormat(p) if p == path));
    assert_eq!(decoder.calls.get(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn extension_match_ignores_case() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "LOUD.JPEG");
    let decoder = CountingDecoder::new(2, 2);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    cache.load(&mut device, path.to_str().unwrap()).unwrap();
    assert_eq!(cache.texture(path.to_str().unwrap()).unwrap().channels, 3);
}

#[test]
fn rejected_upload_releases_the_texture_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch(dir.path(), "broken.png");
    let mut decoder = CountingDecoder::new(4, 4);
    decoder.truncate = 1;
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let err = cache.load(&mut device, path.to_str().unwrap()).unwrap_err();
    assert!(matches!(
        err,
        TextureError::InvalidPixelData {
            expected: 64,
            actual: 63,
            ..
        }
    ));
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.bound_texture(), None);
    assert!(cache.is_empty());
}

#[test]
fn batch_keeps_going_after_a_failure() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let a = touch(dir.path(), "a.png");
    let c = touch(dir.path(), "c.jpg");
    let decoder = CountingDecoder::new(16, 16);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();

    let paths = [
        a.to_str().unwrap().to_string(),
        "missing/b.png".to_string(),
        c.to_str().unwrap().to_string(),
    ];
    let report = cache.load_batch(&mut device, &paths);

    assert!(!report.all_loaded());
    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "missing/b.png");
    assert!(report.failed[0].1.is_not_found());
    assert_eq!(cache.len(), 2);
}

#[test]
fn release_all_deletes_each_handle_once() {
    let dir = tempfile::tempdir().unwrap();
    let a = touch(dir.path(), "a.png");
    let b = touch(dir.path(), "b.png");
    let decoder = CountingDecoder::new(2, 2);
    let mut cache = cache_in(&dir, &decoder);
    let mut device = RecordingDevice::new();
    cache.load(&mut device, a.to_str().unwrap()).unwrap();
    cache.load(&mut device, b.to_str().unwrap()).unwrap();
    device.take_commands();

    cache.release_all(&mut device);
    cache.release_all(&mut device);

    let mut deleted = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::DeleteTexture(h) => Some(*h),
            _ => None,
        })
        .collect::<Vec<_>>();
    deleted.sort();
    assert_eq!(deleted, vec![TextureHandle(1), TextureHandle(2)]);
    assert_eq!(device.live_textures(), 0);
    assert!(cache.is_empty());
}

#[test]
fn png_decodes_to_rgba_in_file_row_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.png");
    let mut img = image::RgbaImage::new(2, 2);
    for x in 0..2 {
        img.put_pixel(x, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(x, 1, image::Rgba([0, 0, 255, 128]));
    }
    img.save(&path).unwrap();

    let decoded = ImageCrateDecoder.decode_png(&path).unwrap();
    assert_eq!(decoded.layout, PixelLayout::Rgba8);
    assert_eq!((decoded.width, decoded.height), (2, 2));
    assert_eq!(&decoded.pixels[0..4], &[255, 0, 0, 255]);
    assert_eq!(&decoded.pixels[8..12], &[0, 0, 255, 128]);
}

#[test]
fn jpeg_decodes_to_rgb_bottom_row_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.jpg");
    let mut img = image::RgbImage::new(16, 16);
    for (_, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = if y < 8 {
            image::Rgb([255, 255, 255])
        } else {
            image::Rgb([0, 0, 0])
        };
    }
    img.save(&path).unwrap();

    let decoded = ImageCrateDecoder.decode_jpeg(&path).unwrap();
    assert_eq!(decoded.layout, PixelLayout::Rgb8);
    assert_eq!(decoded.pixels.len(), 16 * 16 * 3);
    // The file's top row is white, so the first row in memory is dark.
    assert!(decoded.pixels[0] < 64);
    let last_row = decoded.pixels.len() - 16 * 3;
    assert!(decoded.pixels[last_row] > 192);
}

#[test]
fn corrupt_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.png");
    std::fs::write(&path, b"not a png").unwrap();

    let err = ImageCrateDecoder.decode_png(&path).unwrap_err();
    assert!(matches!(err, TextureError::Decode { .. }));
}
