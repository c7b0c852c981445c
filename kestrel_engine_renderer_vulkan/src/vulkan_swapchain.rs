/// Swapchain - presentation of the backbuffer to a window surface
///
/// The backbuffer is an offscreen image owned by the device; each frame it
/// is blitted into the acquired swapchain image right before presentation.
/// The window surface belongs to the device and outlives the swapchain.

use ash::vk;
use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::{engine_bail, engine_debug, engine_error};

use crate::vulkan_format::vk_error;

/// Frames that can be recorded while the GPU still works on earlier ones
pub(crate) const MAX_FRAMES_IN_FLIGHT: usize = 2;

pub(crate) struct Swapchain {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,

    present_queue: vk::Queue,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    /// One per frame in flight, signaled by acquire
    image_available_semaphores: Vec<vk::Semaphore>,
    /// One per swapchain image, signaled by the frame submit
    render_finished_semaphores: Vec<vk::Semaphore>,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        present_queue: vk::Queue,
        size: UVec2,
        vertical_sync: bool,
    ) -> Result<Self> {
        let surface_formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)
        }
        .map_err(|e| {
            engine_error!("kestrel::vulkan", "Failed to query surface formats: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
        })?;

        let format = surface_formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_UNORM || f.format == vk::Format::R8G8B8A8_UNORM)
            .or_else(|| surface_formats.first())
            .copied()
            .ok_or_else(|| {
                engine_error!("kestrel::vulkan", "Surface reports no formats");
                Error::InitializationFailed("Surface reports no formats".to_string())
            })?;

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
        }
        .map_err(|e| {
            engine_error!("kestrel::vulkan", "Failed to query present modes: {:?}", e);
            Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
        })?;
        let present_mode = choose_present_mode(&present_modes, vertical_sync);

        let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);

        let mut swapchain = Self {
            device,
            physical_device,
            present_queue,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            format,
            extent: vk::Extent2D::default(),
            present_mode,
            image_available_semaphores: Vec::new(),
            render_finished_semaphores: Vec::new(),
        };

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let semaphore = swapchain.create_semaphore()?;
            swapchain.image_available_semaphores.push(semaphore);
        }
        swapchain.recreate(size)?;

        engine_debug!(
            "kestrel::vulkan",
            "Swapchain created: {}x{} {:?} {:?}, {} images",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.format.format,
            swapchain.present_mode,
            swapchain.images.len()
        );

        Ok(swapchain)
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_error(e, "Failed to create semaphore"))
    }

    /// (wait, signal) semaphores of a frame that presents `image_index`
    pub(crate) fn sync_info(&self, frame_slot: usize, image_index: u32) -> (vk::Semaphore, vk::Semaphore) {
        (
            self.image_available_semaphores[frame_slot],
            self.render_finished_semaphores[image_index as usize],
        )
    }

    /// Acquire the next image, or `None` when the swapchain is out of date
    pub fn acquire(&mut self, frame_slot: usize) -> Result<Option<u32>> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available_semaphores[frame_slot],
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, _suboptimal)) => Ok(Some(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(vk_error(e, "Failed to acquire swapchain image")),
        }
    }

    /// Record the blit of `src` (GENERAL layout) into swapchain image `image_index`
    pub fn record_present_blit(
        &self,
        cb: vk::CommandBuffer,
        src: vk::Image,
        src_size: UVec2,
        image_index: u32,
    ) -> Result<()> {
        let Some(&dst) = self.images.get(image_index as usize) else {
            engine_bail!(
                "kestrel::vulkan",
                "record_present_blit: image_index {} out of range (count: {})",
                image_index,
                self.images.len()
            );
        };

        let color_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let color_layers = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };

        unsafe {
            let barriers = [
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::GENERAL)
                    .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(src)
                    .subresource_range(color_range)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                    .dst_access_mask(vk::AccessFlags::TRANSFER_READ),
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(dst)
                    .subresource_range(color_range)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE),
            ];
            self.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );

            let region = vk::ImageBlit {
                src_subresource: color_layers,
                src_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: src_size.x as i32,
                        y: src_size.y as i32,
                        z: 1,
                    },
                ],
                dst_subresource: color_layers,
                dst_offsets: [
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: self.extent.width as i32,
                        y: self.extent.height as i32,
                        z: 1,
                    },
                ],
            };
            self.device.cmd_blit_image(
                cb,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                vk::Filter::LINEAR,
            );

            let barriers = [
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .new_layout(vk::ImageLayout::GENERAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(src)
                    .subresource_range(color_range)
                    .src_access_mask(vk::AccessFlags::TRANSFER_READ)
                    .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE),
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(dst)
                    .subresource_range(color_range)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::empty()),
            ];
            self.device.cmd_pipeline_barrier(
                cb,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
        }

        Ok(())
    }

    /// Present `image_index`; returns false when the swapchain is out of date
    pub fn present(&mut self, image_index: u32) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished_semaphores[image_index as usize]];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &present_info) } {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(e) => Err(vk_error(e, "Failed to present swapchain image")),
        }
    }

    /// Rebuild the swapchain for `size` (clamped to the surface limits)
    pub fn recreate(&mut self, size: UVec2) -> Result<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| vk_error(e, "Failed to wait idle before swapchain recreate"))?;

            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("kestrel::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: size.x.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                    height: size.y.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
                }
            };

            let image_count = capabilities.min_image_count + 1;
            let image_count = if capabilities.max_image_count > 0 {
                image_count.min(capabilities.max_image_count)
            } else {
                image_count
            };

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(self.present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| vk_error(e, "Failed to create swapchain"))?;

            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| vk_error(e, "Failed to get swapchain images"))?;
        }

        // The image count can change between recreations
        while self.render_finished_semaphores.len() < self.images.len() {
            let semaphore = self.create_semaphore()?;
            self.render_finished_semaphores.push(semaphore);
        }

        Ok(())
    }
}

fn choose_present_mode(available: &[vk::PresentModeKHR], vertical_sync: bool) -> vk::PresentModeKHR {
    if vertical_sync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            for &semaphore in &self.image_available_semaphores {
                self.device.destroy_semaphore(semaphore, None);
            }
            for &semaphore in &self.render_finished_semaphores {
                self.device.destroy_semaphore(semaphore, None);
            }

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
