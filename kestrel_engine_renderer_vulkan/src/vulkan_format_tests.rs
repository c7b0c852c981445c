//! Unit tests for Vulkan format conversion functions
//!
//! Pure conversions, no GPU required.

use super::*;

// ============================================================================
// PIXEL FORMATS
// ============================================================================

#[test]
fn test_pixel_formats_map_to_distinct_vk_formats() {
    let mut seen = std::collections::HashSet::new();
    for format in PixelFormat::ALL {
        let vk_format = pixel_format_to_vk(format).unwrap();
        assert_ne!(vk_format, vk::Format::UNDEFINED, "{:?}", format);
        // A8 shares R8 storage with a swizzle
        if format != PixelFormat::A8_UNORM {
            assert!(seen.insert(vk_format), "{:?} maps to a duplicate format", format);
        }
    }
}

#[test]
fn test_common_pixel_formats() {
    assert_eq!(pixel_format_to_vk(PixelFormat::RGBA8_UNORM).unwrap(), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(pixel_format_to_vk(PixelFormat::RGBA8_UNORM_SRGB).unwrap(), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(pixel_format_to_vk(PixelFormat::RGBA16_FLOAT).unwrap(), vk::Format::R16G16B16A16_SFLOAT);
    assert_eq!(pixel_format_to_vk(PixelFormat::D32_FLOAT).unwrap(), vk::Format::D32_SFLOAT);
}

#[test]
fn test_format_support_requires_every_feature() {
    let sampled = required_format_features(PixelFormat::RGBA16_FLOAT, true, false);
    let properties = vk::FormatProperties {
        optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE
            | vk::FormatFeatureFlags::TRANSFER_SRC
            | vk::FormatFeatureFlags::TRANSFER_DST,
        ..Default::default()
    };
    assert!(check_format_support(PixelFormat::RGBA16_FLOAT, &properties, sampled).is_ok());

    let attachment = required_format_features(PixelFormat::RGBA16_FLOAT, true, true);
    let result = check_format_support(PixelFormat::RGBA16_FLOAT, &properties, attachment);
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));

    let result = check_format_support(PixelFormat::D24_UNORM_S8_UINT, &vk::FormatProperties::default(), sampled);
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));
}

#[test]
fn test_depth_attachments_need_depth_features() {
    let features = required_format_features(PixelFormat::D32_FLOAT, false, true);
    assert!(features.contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT));
    assert!(!features.contains(vk::FormatFeatureFlags::COLOR_ATTACHMENT));
    assert!(!features.contains(vk::FormatFeatureFlags::SAMPLED_IMAGE));
}

#[test]
fn test_alpha_format_swizzles_red_into_alpha() {
    let mapping = component_mapping(PixelFormat::A8_UNORM);
    assert_eq!(mapping.a, vk::ComponentSwizzle::R);
    assert_eq!(mapping.r, vk::ComponentSwizzle::ZERO);

    let mapping = component_mapping(PixelFormat::RGBA8_UNORM);
    assert_eq!(mapping.a, vk::ComponentSwizzle::IDENTITY);
}

#[test]
fn test_aspect_masks() {
    assert_eq!(aspect_mask(PixelFormat::RGBA8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(PixelFormat::D16_UNORM), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(PixelFormat::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

// ============================================================================
// SAMPLE COUNTS
// ============================================================================

#[test]
fn test_sample_count_conversion() {
    assert_eq!(sample_count_to_vk(1).unwrap(), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(4).unwrap(), vk::SampleCountFlags::TYPE_4);
    assert!(matches!(sample_count_to_vk(3), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_max_sample_count_from_flags() {
    let flags = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_8;
    assert_eq!(max_sample_count(flags), 8);
    assert_eq!(max_sample_count(vk::SampleCountFlags::TYPE_1), 1);
}

// ============================================================================
// SAMPLERS
// ============================================================================

#[test]
fn test_filter_modes() {
    assert_eq!(
        filter_to_vk(Filter::Point),
        (vk::Filter::NEAREST, vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST)
    );
    assert_eq!(
        filter_to_vk(Filter::Linear),
        (vk::Filter::LINEAR, vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST)
    );
    assert_eq!(
        filter_to_vk(Filter::Bilinear),
        (vk::Filter::LINEAR, vk::Filter::LINEAR, vk::SamplerMipmapMode::NEAREST)
    );
    assert_eq!(
        filter_to_vk(Filter::Trilinear),
        (vk::Filter::LINEAR, vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR)
    );
}

#[test]
fn test_address_modes() {
    assert_eq!(address_to_vk(Address::Clamp), vk::SamplerAddressMode::CLAMP_TO_EDGE);
    assert_eq!(address_to_vk(Address::Repeat), vk::SamplerAddressMode::REPEAT);
    assert_eq!(address_to_vk(Address::MirrorRepeat), vk::SamplerAddressMode::MIRRORED_REPEAT);
}

// ============================================================================
// RENDER STATES
// ============================================================================

#[test]
fn test_alpha_blend_state_conversion() {
    let state = blend_attachment_to_vk(&BlendStateDesc::alpha());

    assert_eq!(state.blend_enable, vk::TRUE);
    assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
    assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
}

#[test]
fn test_partial_color_mask() {
    assert_eq!(
        color_mask_to_vk(ColorMask::RED | ColorMask::ALPHA),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
    );
    assert_eq!(color_mask_to_vk(ColorMask::empty()), vk::ColorComponentFlags::empty());
}

#[test]
fn test_compare_and_index_formats() {
    assert_eq!(compare_function_to_vk(CompareFunction::LessEqual), vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(compare_function_to_vk(CompareFunction::Always), vk::CompareOp::ALWAYS);
    assert_eq!(index_format_to_vk(IndexFormat::U16), vk::IndexType::UINT16);
    assert_eq!(index_format_to_vk(IndexFormat::U32), vk::IndexType::UINT32);
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_vk_error_mapping() {
    assert_eq!(vk_error(vk::Result::ERROR_DEVICE_LOST, "submit"), Error::DeviceLost);
    assert_eq!(vk_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "alloc"), Error::OutOfMemory);
    assert!(matches!(
        vk_error(vk::Result::ERROR_INITIALIZATION_FAILED, "init"),
        Error::BackendError(msg) if msg.starts_with("init")
    ));
}
