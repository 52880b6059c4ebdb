//! Tests for PNG encoding of rendered rasters.

use renderer::{create_png, render_index, Palette};
use raster_common::{IndexResult, IndexStats};

#[test]
fn test_png_signature_and_ihdr() {
    let pixels = vec![10u8; 3 * 5 * 4];
    let png = create_png(&pixels, 3, 5).unwrap();

    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!(&png[12..16], b"IHDR");
    assert_eq!(&png[16..20], &3u32.to_be_bytes());
    assert_eq!(&png[20..24], &5u32.to_be_bytes());
    assert_eq!(png[24], 8); // bit depth
    assert_eq!(png[25], 6); // RGBA
    assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
}

#[test]
fn test_uniform_image_compresses() {
    let pixels = vec![200u8; 512 * 512 * 4];
    let png = create_png(&pixels, 512, 512).unwrap();
    assert!(png.len() < pixels.len() / 50, "{} bytes", png.len());
}

#[test]
fn test_rendered_index_encodes() {
    let result = IndexResult {
        values: (0..64 * 64).map(|i| ((i % 64) as f32 / 32.0) - 1.0).collect(),
        width: 64,
        height: 64,
        stats: IndexStats::default(),
    };
    let raster = render_index(&result, Palette::RdYlGn);
    let png = raster.to_png().unwrap();
    assert!(png.len() > 8 + 25 + 12);
}

#[test]
fn test_mismatched_buffer_is_error() {
    let err = create_png(&[0u8; 10], 2, 2).unwrap_err();
    assert!(err.contains("expected 16"));
}
