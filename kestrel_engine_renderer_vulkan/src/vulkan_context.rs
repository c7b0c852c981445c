/// GpuContext - Vulkan objects shared by every native resource
///
/// Textures, buffers and render targets each hold an `Arc<GpuContext>` so
/// they can free their memory on drop. Device and instance destruction is
/// done by `VulkanDevice::drop()` once every resource is gone.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use kestrel_engine::kestrel::render::PixelFormat;
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::engine_error;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::vulkan_format::{check_format_support, pixel_format_to_vk, required_format_features, vk_error};

pub struct GpuContext {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    /// Dropped by VulkanDevice before the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Pool for one-shot transfer command buffers
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: vk::CommandPool,
}

impl GpuContext {
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let upload_command_pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
            engine_error!("kestrel::vulkan", "Failed to create upload command pool: {:?}", e);
            Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
        })?;

        Ok(Self {
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_queue_family,
            upload_command_pool,
        })
    }

    /// Native format for `format`, checked against the device's tiling features
    pub(crate) fn supported_format(&self, format: PixelFormat, sampled: bool, attachment: bool) -> Result<vk::Format> {
        let native = pixel_format_to_vk(format)?;
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, native)
        };
        check_format_support(format, &properties, required_format_features(format, sampled, attachment))?;
        Ok(native)
    }

    pub(crate) fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate and bind memory for `image`
    pub(crate) fn allocate_image(&self, image: vk::Image, name: &str) -> Result<Allocation> {
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self
            .allocator()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("kestrel::vulkan", "Out of GPU memory for {} ({:.2} MB)", name, size_mb);
                Error::OutOfMemory
            })?;

        if let Err(e) = unsafe { self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            self.allocator().free(allocation).ok();
            return Err(vk_error(e, "Failed to bind image memory"));
        }

        Ok(allocation)
    }

    /// Create a host-visible buffer with bound memory
    pub(crate) fn create_host_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<(vk::Buffer, Allocation)> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&create_info, None) }
            .map_err(|e| vk_error(e, "Failed to create buffer"))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self
            .allocator()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_| {
                unsafe { self.device.destroy_buffer(buffer, None) };
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("kestrel::vulkan", "Out of GPU memory for {} ({:.2} MB)", name, size_mb);
                Error::OutOfMemory
            })?;

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            self.allocator().free(allocation).ok();
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(vk_error(e, "Failed to bind buffer memory"));
        }

        Ok((buffer, allocation))
    }

    pub(crate) fn free_buffer(&self, buffer: vk::Buffer, allocation: Allocation) {
        self.allocator().free(allocation).ok();
        unsafe { self.device.destroy_buffer(buffer, None) };
    }

    /// Record commands into a one-shot command buffer, submit and wait
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.upload_command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| vk_error(e, "Failed to allocate upload command buffer"))?[0];

            let result = self.submit_one_shot(command_buffer, record);
            self.device.free_command_buffers(self.upload_command_pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| vk_error(e, "Failed to begin upload command buffer"))?;

        record(command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| vk_error(e, "Failed to end upload command buffer"))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.device
            .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
            .map_err(|e| vk_error(e, "Failed to submit upload"))?;
        self.device
            .queue_wait_idle(self.graphics_queue)
            .map_err(|e| vk_error(e, "Failed to wait for upload"))
    }

    /// Record an image layout transition covering every level
    pub(crate) fn transition(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        level_count: u32,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);

        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}
