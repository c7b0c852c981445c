/// Conversions from engine enums to Vulkan enums

use ash::vk;
use kestrel_engine::kestrel::render::{
    Address, BlendFactor, BlendOperation, BlendStateDesc, ColorMask, CompareFunction, Filter,
    IndexFormat, PixelFormat,
};
use kestrel_engine::kestrel::{Error, Result};

pub(crate) fn pixel_format_to_vk(format: PixelFormat) -> Result<vk::Format> {
    Ok(match format {
        PixelFormat::A8_UNORM => vk::Format::R8_UNORM,
        PixelFormat::R8_UNORM => vk::Format::R8_UNORM,
        PixelFormat::R8_SNORM => vk::Format::R8_SNORM,
        PixelFormat::R8_UINT => vk::Format::R8_UINT,
        PixelFormat::R8_SINT => vk::Format::R8_SINT,
        PixelFormat::R16_UNORM => vk::Format::R16_UNORM,
        PixelFormat::R16_SNORM => vk::Format::R16_SNORM,
        PixelFormat::R16_UINT => vk::Format::R16_UINT,
        PixelFormat::R16_SINT => vk::Format::R16_SINT,
        PixelFormat::R16_FLOAT => vk::Format::R16_SFLOAT,
        PixelFormat::R32_UINT => vk::Format::R32_UINT,
        PixelFormat::R32_SINT => vk::Format::R32_SINT,
        PixelFormat::R32_FLOAT => vk::Format::R32_SFLOAT,
        PixelFormat::RG8_UNORM => vk::Format::R8G8_UNORM,
        PixelFormat::RG8_SNORM => vk::Format::R8G8_SNORM,
        PixelFormat::RG8_UINT => vk::Format::R8G8_UINT,
        PixelFormat::RG8_SINT => vk::Format::R8G8_SINT,
        PixelFormat::RGBA8_UNORM => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::RGBA8_UNORM_SRGB => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::RGBA8_SNORM => vk::Format::R8G8B8A8_SNORM,
        PixelFormat::RGBA8_UINT => vk::Format::R8G8B8A8_UINT,
        PixelFormat::RGBA8_SINT => vk::Format::R8G8B8A8_SINT,
        PixelFormat::RGBA16_UNORM => vk::Format::R16G16B16A16_UNORM,
        PixelFormat::RGBA16_SNORM => vk::Format::R16G16B16A16_SNORM,
        PixelFormat::RGBA16_UINT => vk::Format::R16G16B16A16_UINT,
        PixelFormat::RGBA16_SINT => vk::Format::R16G16B16A16_SINT,
        PixelFormat::RGBA16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::RGBA32_UINT => vk::Format::R32G32B32A32_UINT,
        PixelFormat::RGBA32_SINT => vk::Format::R32G32B32A32_SINT,
        PixelFormat::RGBA32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,
        PixelFormat::D16_UNORM => vk::Format::D16_UNORM,
        PixelFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        PixelFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    })
}

/// Optimal-tiling features an image of `format` needs
pub(crate) fn required_format_features(format: PixelFormat, sampled: bool, attachment: bool) -> vk::FormatFeatureFlags {
    let mut features = vk::FormatFeatureFlags::TRANSFER_SRC | vk::FormatFeatureFlags::TRANSFER_DST;
    if sampled {
        features |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
    }
    if attachment {
        features |= if format.is_depth() {
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::FormatFeatureFlags::COLOR_ATTACHMENT
        };
    }
    features
}

/// Fail with `InvalidPixelFormat` when `properties` lack a required feature
pub(crate) fn check_format_support(
    format: PixelFormat,
    properties: &vk::FormatProperties,
    required: vk::FormatFeatureFlags,
) -> Result<()> {
    let missing = required & !properties.optimal_tiling_features;
    if !missing.is_empty() {
        return Err(Error::InvalidPixelFormat(format!(
            "{:?} is not supported by the device for {:?}",
            format, missing
        )));
    }
    Ok(())
}

/// Alpha-only formats read their single channel as alpha
pub(crate) fn component_mapping(format: PixelFormat) -> vk::ComponentMapping {
    match format {
        PixelFormat::A8_UNORM => vk::ComponentMapping {
            r: vk::ComponentSwizzle::ZERO,
            g: vk::ComponentSwizzle::ZERO,
            b: vk::ComponentSwizzle::ZERO,
            a: vk::ComponentSwizzle::R,
        },
        _ => vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        },
    }
}

pub(crate) fn aspect_mask(format: PixelFormat) -> vk::ImageAspectFlags {
    match format {
        PixelFormat::D24_UNORM_S8_UINT => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        format if format.is_depth() => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub(crate) fn sample_count_to_vk(count: u32) -> Result<vk::SampleCountFlags> {
    match count {
        1 => Ok(vk::SampleCountFlags::TYPE_1),
        2 => Ok(vk::SampleCountFlags::TYPE_2),
        4 => Ok(vk::SampleCountFlags::TYPE_4),
        8 => Ok(vk::SampleCountFlags::TYPE_8),
        16 => Ok(vk::SampleCountFlags::TYPE_16),
        32 => Ok(vk::SampleCountFlags::TYPE_32),
        64 => Ok(vk::SampleCountFlags::TYPE_64),
        other => Err(Error::InvalidArgument(format!("Unsupported sample count {}", other))),
    }
}

/// Highest power-of-two sample count set in `flags`
pub(crate) fn max_sample_count(flags: vk::SampleCountFlags) -> u32 {
    [64, 32, 16, 8, 4, 2]
        .into_iter()
        .find(|&count| sample_count_to_vk(count).is_ok_and(|flag| flags.contains(flag)))
        .unwrap_or(1)
}

/// (min filter, mag filter, mipmap mode)
pub(crate) fn filter_to_vk(filter: Filter) -> (vk::Filter, vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        Filter::Default | Filter::Point => (vk::Filter::NEAREST, vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::Linear => (vk::Filter::LINEAR, vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::Bilinear => (vk::Filter::LINEAR, vk::Filter::LINEAR, vk::SamplerMipmapMode::NEAREST),
        Filter::Trilinear => (vk::Filter::LINEAR, vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    }
}

pub(crate) fn address_to_vk(address: Address) -> vk::SamplerAddressMode {
    match address {
        Address::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        Address::Repeat => vk::SamplerAddressMode::REPEAT,
        Address::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DestAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::InvDestAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::DestColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::InvDestColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlphaSat => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendFactor::BlendFactor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::InvBlendFactor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

pub(crate) fn blend_op_to_vk(op: BlendOperation) -> vk::BlendOp {
    match op {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
        BlendOperation::RevSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn color_mask_to_vk(mask: ColorMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorMask::RED) {
        flags |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorMask::GREEN) {
        flags |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorMask::BLUE) {
        flags |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorMask::ALPHA) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

pub(crate) fn blend_attachment_to_vk(desc: &BlendStateDesc) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(desc.enabled)
        .src_color_blend_factor(blend_factor_to_vk(desc.color_src))
        .dst_color_blend_factor(blend_factor_to_vk(desc.color_dst))
        .color_blend_op(blend_op_to_vk(desc.color_op))
        .src_alpha_blend_factor(blend_factor_to_vk(desc.alpha_src))
        .dst_alpha_blend_factor(blend_factor_to_vk(desc.alpha_dst))
        .alpha_blend_op(blend_op_to_vk(desc.alpha_op))
        .color_write_mask(color_mask_to_vk(desc.color_mask))
}

pub(crate) fn compare_function_to_vk(function: CompareFunction) -> vk::CompareOp {
    match function {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn index_format_to_vk(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

/// Map a Vulkan error code to an engine error
pub(crate) fn vk_error(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        other => Error::BackendError(format!("{}: {:?}", context, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
