//! Unit tests for pixel_format.rs

use super::*;

#[test]
fn test_all_formats_are_unique() {
    for (i, a) in PixelFormat::ALL.iter().enumerate() {
        for b in &PixelFormat::ALL[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_bytes_per_pixel() {
    assert_eq!(PixelFormat::A8_UNORM.bytes_per_pixel(), 1);
    assert_eq!(PixelFormat::R16_FLOAT.bytes_per_pixel(), 2);
    assert_eq!(PixelFormat::RG8_SNORM.bytes_per_pixel(), 2);
    assert_eq!(PixelFormat::RGBA8_UNORM.bytes_per_pixel(), 4);
    assert_eq!(PixelFormat::RGBA16_FLOAT.bytes_per_pixel(), 8);
    assert_eq!(PixelFormat::RGBA32_FLOAT.bytes_per_pixel(), 16);
    assert_eq!(PixelFormat::D32_FLOAT.bytes_per_pixel(), 4);
}

#[test]
fn test_bytes_per_pixel_matches_channels() {
    // Every non-depth format stores channels of equal width
    for format in PixelFormat::ALL.iter().filter(|f| !f.is_depth()) {
        assert_eq!(format.bytes_per_pixel() % format.channel_count(), 0, "{:?}", format);
    }
}

#[test]
fn test_numeric_kind() {
    assert_eq!(PixelFormat::R8_UNORM.numeric_kind(), NumericKind::Unorm);
    assert_eq!(PixelFormat::RGBA8_SNORM.numeric_kind(), NumericKind::Snorm);
    assert_eq!(PixelFormat::R32_UINT.numeric_kind(), NumericKind::Uint);
    assert_eq!(PixelFormat::RGBA16_SINT.numeric_kind(), NumericKind::Sint);
    assert_eq!(PixelFormat::RGBA32_FLOAT.numeric_kind(), NumericKind::Float);
}

#[test]
fn test_depth_formats() {
    let depth: Vec<_> = PixelFormat::ALL.iter().filter(|f| f.is_depth()).collect();
    assert_eq!(depth.len(), 3);
    assert!(!PixelFormat::RGBA8_UNORM.is_depth());
}

#[test]
fn test_byte_normalized_formats_are_one_byte_per_channel() {
    for format in PixelFormat::ALL.iter().filter(|f| f.is_byte_normalized()) {
        assert_eq!(format.bytes_per_pixel(), format.channel_count(), "{:?}", format);
        assert_eq!(format.numeric_kind(), NumericKind::Unorm);
    }
}

#[test]
fn test_row_pitch() {
    assert_eq!(PixelFormat::RGBA8_UNORM.row_pitch(16), 64);
    assert_eq!(PixelFormat::R8_UNORM.row_pitch(3), 3);
    assert_eq!(PixelFormat::RGBA32_FLOAT.row_pitch(2), 32);
}
