/// VulkanTexture - image, view and memory of one texture or attachment

use ash::vk;
use gpu_allocator::vulkan::Allocation;
use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::render::{mipmap, PixelFormat, TextureFlags, TextureState};
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::engine_err;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_target::AttachmentShape;
use crate::vulkan_format::{aspect_mask, component_mapping, sample_count_to_vk, vk_error};

/// Creation parameters shared by textures and render target attachments
pub(crate) struct ImageDesc {
    pub size: UVec2,
    pub format: PixelFormat,
    pub mip_count: u32,
    pub sample_count: u32,
    pub attachment: bool,
}

impl ImageDesc {
    pub fn from_state(state: &TextureState) -> Self {
        Self {
            size: state.size,
            format: state.pixel_format,
            mip_count: state.mip_count(),
            sample_count: state.sample_count,
            attachment: state.flags.contains(TextureFlags::RENDER_TARGET),
        }
    }
}

pub(crate) struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    pub(crate) size: UVec2,
    pub(crate) format: PixelFormat,
    pub(crate) mip_count: u32,
    pub(crate) sample_count: u32,
    pub(crate) aspect: vk::ImageAspectFlags,
    /// Sampler chosen at the last SAMPLER upload
    pub(crate) sampler: vk::Sampler,
    attachment: bool,
}

impl VulkanTexture {
    /// Layout the image is kept in between commands
    ///
    /// Attachments stay in GENERAL so clears, blits and sampling need no
    /// per-command layout bookkeeping.
    pub(crate) fn layout(&self) -> vk::ImageLayout {
        if self.attachment {
            vk::ImageLayout::GENERAL
        } else {
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        }
    }

    pub fn new(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        let sampled = desc.sample_count == 1;
        let format = ctx.supported_format(desc.format, sampled, desc.attachment)?;
        let aspect = aspect_mask(desc.format);
        let samples = sample_count_to_vk(desc.sample_count)?;

        let mut usage = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC;
        if sampled {
            usage |= vk::ImageUsageFlags::SAMPLED;
        }
        if desc.attachment {
            usage |= if desc.format.is_depth() {
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::ImageUsageFlags::COLOR_ATTACHMENT
            };
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.size.x,
                height: desc.size.y,
                depth: 1,
            })
            .mip_levels(desc.mip_count)
            .array_layers(1)
            .samples(samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_info, None) }
            .map_err(|e| vk_error(e, "Failed to create image"))?;

        let allocation = match ctx.allocate_image(image, "texture") {
            Ok(allocation) => allocation,
            Err(error) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(error);
            }
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(component_mapping(desc.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: desc.mip_count,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = match unsafe { ctx.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                ctx.allocator().free(allocation).ok();
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(vk_error(e, "Failed to create image view"));
            }
        };

        let texture = Self {
            ctx,
            image,
            view,
            allocation: Some(allocation),
            size: desc.size,
            format: desc.format,
            mip_count: desc.mip_count,
            sample_count: desc.sample_count,
            aspect,
            sampler: vk::Sampler::null(),
            attachment: desc.attachment,
        };

        let layout = texture.layout();
        texture.ctx.one_shot(|cb| {
            texture.ctx.transition(cb, image, aspect, desc.mip_count, vk::ImageLayout::UNDEFINED, layout);
        })?;

        Ok(texture)
    }

    pub(crate) fn shape(&self) -> AttachmentShape {
        AttachmentShape {
            size: self.size,
            format: self.format,
            sample_count: self.sample_count,
        }
    }

    /// True when `desc` can reuse this image
    pub(crate) fn matches(&self, desc: &ImageDesc) -> bool {
        self.size == desc.size
            && self.format == desc.format
            && self.mip_count == desc.mip_count
            && self.sample_count == desc.sample_count
            && self.attachment == desc.attachment
    }

    /// Copy the levels selected by `mask` through one staging buffer
    pub(crate) fn write_levels(&self, state: &TextureState, mask: u64) -> Result<()> {
        let levels: Vec<(u32, &[u8])> = state
            .levels
            .iter()
            .enumerate()
            .filter(|(i, level)| mask & (1 << i) != 0 && !level.data.is_empty())
            .map(|(i, level)| (i as u32, level.data.as_slice()))
            .collect();

        if levels.is_empty() {
            return Ok(());
        }
        if levels.iter().any(|(i, _)| *i >= self.mip_count) {
            return Err(Error::InvalidMipLevels(format!(
                "Image has {} levels, upload needs more",
                self.mip_count
            )));
        }

        let total: usize = levels.iter().map(|(_, data)| data.len()).sum();
        let (staging, staging_allocation) =
            self.ctx
                .create_host_buffer(total as u64, vk::BufferUsageFlags::TRANSFER_SRC, "texture_staging_buffer")?;

        let result = self.copy_from_staging(staging, &staging_allocation, &levels);
        self.ctx.free_buffer(staging, staging_allocation);
        result
    }

    fn copy_from_staging(&self, staging: vk::Buffer, allocation: &Allocation, levels: &[(u32, &[u8])]) -> Result<()> {
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("kestrel::vulkan", "Staging buffer is not mapped"))?
            .as_ptr() as *mut u8;

        let mut regions = Vec::with_capacity(levels.len());
        let mut offset = 0usize;
        for (level, data) in levels {
            unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset), data.len()) };
            let extent = mipmap::level_size(self.size, *level);
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(offset as u64)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: self.aspect,
                        mip_level: *level,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D {
                        width: extent.x,
                        height: extent.y,
                        depth: 1,
                    }),
            );
            offset += data.len();
        }

        let layout = self.layout();
        self.ctx.one_shot(|cb| unsafe {
            self.ctx.transition(cb, self.image, self.aspect, self.mip_count, layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            self.ctx.device.cmd_copy_buffer_to_image(
                cb,
                staging,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );
            self.ctx.transition(cb, self.image, self.aspect, self.mip_count, vk::ImageLayout::TRANSFER_DST_OPTIMAL, layout);
        })
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
