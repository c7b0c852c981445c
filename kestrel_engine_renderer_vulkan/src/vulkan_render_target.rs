/// VulkanRenderTarget - color and depth attachments of one render target
///
/// Bindable attachments are textures of their own and are only referenced
/// here by id; the other attachments are owned by the target.

use ash::vk;
use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::render::{
    ClearState, NativeHandle, NumericKind, PixelFormat, RenderTargetState, ResourceId,
};
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::engine_warn;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::{ImageDesc, VulkanTexture};

pub(crate) enum Attachment {
    Owned(VulkanTexture),
    /// Bindable attachment living in the device's texture map
    Shared(ResourceId),
}

impl Attachment {
    /// Resolve the texture behind the attachment
    pub(crate) fn texture<'a, F>(&'a self, lookup: F) -> Option<&'a VulkanTexture>
    where
        F: FnOnce(ResourceId) -> Option<&'a VulkanTexture>,
    {
        match self {
            Attachment::Owned(texture) => Some(texture),
            Attachment::Shared(id) => lookup(*id),
        }
    }
}

/// Size, format and samples an attachment shares with its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachmentShape {
    pub size: UVec2,
    pub format: PixelFormat,
    pub sample_count: u32,
}

/// A bindable attachment must exist and match the target exactly
pub(crate) fn check_shared(id: ResourceId, found: Option<AttachmentShape>, expected: AttachmentShape) -> Result<()> {
    let kind = if expected.format.is_depth() { "depth" } else { "color" };
    let found = found.ok_or_else(|| {
        Error::IncompleteFramebuffer(format!("{} attachment {:?} missing", kind, id))
    })?;
    if found != expected {
        return Err(Error::IncompleteFramebuffer(format!(
            "{} attachment {:?} is {}x{} {:?} x{}, target needs {}x{} {:?} x{}",
            kind,
            id,
            found.size.x,
            found.size.y,
            found.format,
            found.sample_count,
            expected.size.x,
            expected.size.y,
            expected.format,
            expected.sample_count
        )));
    }
    Ok(())
}

pub(crate) struct VulkanRenderTarget {
    pub(crate) handle: NativeHandle,
    pub(crate) size: UVec2,
    pub(crate) color: Option<Attachment>,
    pub(crate) depth: Option<Attachment>,
    pub(crate) clear: ClearState,
}

impl VulkanRenderTarget {
    /// Build the attachments of `state`
    ///
    /// `shared_shape` describes the native texture behind a bindable
    /// attachment; a missing or mismatched one leaves the framebuffer
    /// incomplete.
    pub fn new<F>(ctx: &Arc<GpuContext>, handle: NativeHandle, state: &RenderTargetState, shared_shape: F) -> Result<Self>
    where
        F: Fn(ResourceId) -> Option<AttachmentShape>,
    {
        let sample_count = if state.backbuffer && state.sample_count > 1 {
            engine_warn!(
                "kestrel::vulkan",
                "Multisampled backbuffer ({} samples) is not supported, using 1",
                state.sample_count
            );
            1
        } else {
            state.sample_count
        };

        let color = if state.has_color() {
            let expected = AttachmentShape {
                size: state.size,
                format: state.color_format,
                sample_count,
            };
            Some(Self::attachment(ctx, expected, state.color_texture, &shared_shape)?)
        } else {
            None
        };
        let depth = if state.has_depth() {
            let expected = AttachmentShape {
                size: state.size,
                format: state.depth_format,
                sample_count,
            };
            Some(Self::attachment(ctx, expected, state.depth_texture, &shared_shape)?)
        } else {
            None
        };

        Ok(Self {
            handle,
            size: state.size,
            color,
            depth,
            clear: state.clear,
        })
    }

    fn attachment<F>(
        ctx: &Arc<GpuContext>,
        expected: AttachmentShape,
        shared: Option<ResourceId>,
        shared_shape: &F,
    ) -> Result<Attachment>
    where
        F: Fn(ResourceId) -> Option<AttachmentShape>,
    {
        match shared {
            Some(id) => {
                check_shared(id, shared_shape(id), expected)?;
                Ok(Attachment::Shared(id))
            }
            None => {
                let texture = VulkanTexture::new(
                    Arc::clone(ctx),
                    &ImageDesc {
                        size: expected.size,
                        format: expected.format,
                        mip_count: 1,
                        sample_count: expected.sample_count,
                        attachment: true,
                    },
                )?;
                Ok(Attachment::Owned(texture))
            }
        }
    }

    /// True when the owned attachments can be kept for `state`
    pub(crate) fn matches(&self, state: &RenderTargetState) -> bool {
        self.size == state.size
            && self.color.is_some() == state.has_color()
            && self.depth.is_some() == state.has_depth()
    }
}

/// Clear value of a color attachment in the numeric domain of `format`
pub(crate) fn color_clear_value(format: PixelFormat, clear: &ClearState) -> vk::ClearColorValue {
    let color = clear.clear_color;
    match format.numeric_kind() {
        NumericKind::Uint => vk::ClearColorValue {
            uint32: [color.r as u32, color.g as u32, color.b as u32, color.a as u32],
        },
        NumericKind::Sint => vk::ClearColorValue {
            int32: [color.r as i32, color.g as i32, color.b as i32, color.a as i32],
        },
        _ => vk::ClearColorValue {
            float32: color.normalized().to_array(),
        },
    }
}

/// Record the clears requested by `clear` on the given attachments
pub(crate) fn record_clear(
    device: &ash::Device,
    cb: vk::CommandBuffer,
    clear: &ClearState,
    color: Option<&VulkanTexture>,
    depth: Option<&VulkanTexture>,
) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);

    unsafe {
        device.cmd_pipeline_barrier(
            cb,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
            &[],
        );

        if let (true, Some(texture)) = (clear.clear_color_buffer, color) {
            let range = vk::ImageSubresourceRange {
                aspect_mask: texture.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            };
            device.cmd_clear_color_image(
                cb,
                texture.image,
                texture.layout(),
                &color_clear_value(texture.format, clear),
                &[range],
            );
        }

        if let (true, Some(texture)) = (clear.clear_depth_buffer, depth) {
            let range = vk::ImageSubresourceRange {
                aspect_mask: texture.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            };
            device.cmd_clear_depth_stencil_image(
                cb,
                texture.image,
                texture.layout(),
                &vk::ClearDepthStencilValue {
                    depth: clear.clear_depth,
                    stencil: 0,
                },
                &[range],
            );
        }

        let barrier = vk::MemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
        device.cmd_pipeline_barrier(
            cb,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::DependencyFlags::empty(),
            &[barrier],
            &[],
            &[],
        );
    }
}

#[cfg(test)]
#[path = "vulkan_render_target_tests.rs"]
mod tests;
