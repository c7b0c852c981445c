/// VulkanDevice - Vulkan implementation of the RenderDevice trait
///
/// Owns the instance, the logical device and every native object, keyed by
/// the `ResourceId` of the logical resource it mirrors. Objects replaced or
/// destroyed while a frame may still use them are retired with the serial of
/// the last submission and released once no earlier submission is pending.
/// A reset after device loss recreates the logical device and everything
/// built on it; the instance and window surface are kept.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::render::{
    resolve_sampler, BlendStateDesc, BufferState, DepthStencilStateDesc, DeviceInfo, DirtyFlags,
    DrawCommand, Driver, Frame, NativeHandle, RenderDevice, RenderTargetState, RendererSettings,
    ResourceId, ScissorRect, TextureState, WindowSurface,
};
use kestrel_engine::kestrel::{Error, Result};
use kestrel_engine::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_attachment_to_vk, compare_function_to_vk, index_format_to_vk, max_sample_count, vk_error,
};
use crate::vulkan_render_target::{record_clear, VulkanRenderTarget};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::{Swapchain, MAX_FRAMES_IN_FLIGHT};
use crate::vulkan_texture::{ImageDesc, VulkanTexture};

// ============================================================================
// Native objects
// ============================================================================

/// Depth/stencil configuration bound by `SetDepthStencilState`
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativeDepthStencil {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare_op: vk::CompareOp,
}

pub(crate) enum VulkanObject {
    Texture {
        handle: NativeHandle,
        texture: VulkanTexture,
    },
    Buffer {
        handle: NativeHandle,
        buffer: VulkanBuffer,
    },
    RenderTarget(VulkanRenderTarget),
    BlendState {
        handle: NativeHandle,
        attachment: vk::PipelineColorBlendAttachmentState,
    },
    DepthStencilState {
        handle: NativeHandle,
        state: NativeDepthStencil,
    },
}

fn texture_of(objects: &FxHashMap<ResourceId, VulkanObject>, id: ResourceId) -> Option<&VulkanTexture> {
    match objects.get(&id) {
        Some(VulkanObject::Texture { texture, .. }) => Some(texture),
        _ => None,
    }
}

// ============================================================================
// Per-frame synchronization
// ============================================================================

struct FrameSync {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    /// Signaled when the frame's submission has completed
    fence: vk::Fence,
    /// Serial of the last submission using this slot, 0 before the first
    serial: u64,
}

impl FrameSync {
    fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_error(e, "Failed to create frame command pool"))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.destroy_command_pool(command_pool, None);
                    return Err(vk_error(e, "Failed to allocate frame command buffer"));
                }
            };

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = match device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_command_pool(command_pool, None);
                    return Err(vk_error(e, "Failed to create frame fence"));
                }
            };

            Ok(Self {
                command_pool,
                command_buffer,
                fence,
                serial: 0,
            })
        }
    }

    /// Release the sync objects; the device must be idle
    fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

fn create_frames(device: &ash::Device, queue_family: u32) -> Result<Vec<FrameSync>> {
    let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
    for _ in 0..MAX_FRAMES_IN_FLIGHT {
        match FrameSync::new(device, queue_family) {
            Ok(frame) => frames.push(frame),
            Err(error) => {
                for frame in &mut frames {
                    frame.destroy(device);
                }
                return Err(error);
            }
        }
    }
    Ok(frames)
}

/// Objects kept alive until the submissions that may use them complete
pub(crate) struct RetireQueue<T> {
    /// (serial of the last submission when retired, object)
    entries: Vec<(u64, T)>,
}

impl<T> RetireQueue<T> {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn push(&mut self, serial: u64, object: T) {
        self.entries.push((serial, object));
    }

    /// Drop every entry retired before `oldest_pending`, the serial of the
    /// oldest submission still executing; `None` releases everything.
    /// Returns the number of entries released.
    pub(crate) fn release(&mut self, oldest_pending: Option<u64>) -> usize {
        let before = self.entries.len();
        match oldest_pending {
            Some(pending) => self.entries.retain(|(serial, _)| *serial >= pending),
            None => self.entries.clear(),
        }
        before - self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Logical device
// ============================================================================

/// Window surface shared by successive swapchains
struct PresentSurface {
    loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

/// Queue families chosen on the physical device
#[derive(Clone, Copy)]
struct Adapter {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    anisotropy_supported: bool,
}

/// Logical device with its allocator, context and frame sync objects
struct LogicalDevice {
    device: ash::Device,
    ctx: Arc<GpuContext>,
    present_queue: vk::Queue,
    frames: Vec<FrameSync>,
}

impl LogicalDevice {
    unsafe fn new(instance: &ash::Instance, adapter: Adapter, presenting: bool) -> Result<Self> {
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(adapter.graphics_family)
            .queue_priorities(&queue_priorities)];
        if adapter.present_family != adapter.graphics_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(adapter.present_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let device_extension_names = if presenting {
            vec![ash::khr::swapchain::NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let device_features =
            vk::PhysicalDeviceFeatures::default().sampler_anisotropy(adapter.anisotropy_supported);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = instance
            .create_device(adapter.physical_device, &device_create_info, None)
            .map_err(|e| {
                engine_error!("kestrel::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;

        let graphics_queue = device.get_device_queue(adapter.graphics_family, 0);
        let present_queue = device.get_device_queue(adapter.present_family, 0);

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device: adapter.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                device.destroy_device(None);
                engine_error!("kestrel::vulkan", "Failed to create GPU allocator: {:?}", e);
                return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
            }
        };

        let ctx = match GpuContext::new(
            instance.clone(),
            adapter.physical_device,
            device.clone(),
            allocator,
            graphics_queue,
            adapter.graphics_family,
        ) {
            Ok(ctx) => Arc::new(ctx),
            Err(error) => {
                device.destroy_device(None);
                return Err(error);
            }
        };

        let mut logical = Self {
            device,
            ctx,
            present_queue,
            frames: Vec::new(),
        };
        match create_frames(&logical.device, adapter.graphics_family) {
            Ok(frames) => logical.frames = frames,
            Err(error) => {
                logical.destroy();
                return Err(error);
            }
        }
        Ok(logical)
    }

    unsafe fn destroy(&mut self) {
        destroy_logical_device(&self.device, &mut self.ctx, &mut self.frames);
    }
}

/// Destroy frame sync objects, the upload pool, the allocator and the
/// device; every object created from them must already be gone
unsafe fn destroy_logical_device(device: &ash::Device, ctx: &mut Arc<GpuContext>, frames: &mut Vec<FrameSync>) {
    for frame in frames.iter_mut() {
        frame.destroy(device);
    }
    frames.clear();
    device.destroy_command_pool(ctx.upload_command_pool, None);

    // Allocator memory pages before the device
    match Arc::get_mut(ctx) {
        Some(ctx) => ManuallyDrop::drop(&mut ctx.allocator),
        None => engine_warn!("kestrel::vulkan", "GPU context still shared at teardown, leaking allocator"),
    }

    device.destroy_device(None);
}

/// Reset failures are reported as initialization failures
fn recreation_error(error: Error) -> Error {
    match error {
        Error::InitializationFailed(_) => error,
        other => {
            engine_error!("kestrel::vulkan", "Device recreation failed: {}", other);
            Error::InitializationFailed(format!("Device recreation failed: {}", other))
        }
    }
}

// ============================================================================
// Device
// ============================================================================

pub struct VulkanDevice {
    info: DeviceInfo,
    settings: RendererSettings,

    _entry: ash::Entry,
    instance: ash::Instance,
    adapter: Adapter,

    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    /// None when running headless
    surface: Option<PresentSurface>,

    device: ash::Device,
    ctx: Arc<GpuContext>,
    present_queue: vk::Queue,

    /// None when running headless
    swapchain: Option<Swapchain>,
    frames: Vec<FrameSync>,
    current_frame: usize,
    /// Swapchain image acquired by `execute`, presented by `present`
    acquired_image: Option<u32>,
    /// Serial of the last frame submission
    submitted: u64,
    retired: RetireQueue<VulkanObject>,

    samplers: SamplerCache,
    objects: FxHashMap<ResourceId, VulkanObject>,
    next_handle: u64,
    backbuffer: Option<ResourceId>,

    /// Draws dropped because no pipeline is bound
    skipped_draws: u64,
    lost: bool,
}

impl VulkanDevice {
    /// Create a device presenting to `surface`, or a headless one
    pub fn new(settings: &RendererSettings, surface: Option<&dyn WindowSurface>) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("kestrel::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(settings.app_name.as_str())
                .map_err(|_| Error::InvalidArgument("Application name contains a NUL byte".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Kestrel")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            let display_handle = match surface {
                Some(window) => Some(window.display_handle().map_err(|e| {
                    engine_error!("kestrel::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?),
                None => None,
            };

            let mut extension_names = match &display_handle {
                Some(display) => ash_window::enumerate_required_extensions(display.as_raw())
                    .map_err(|e| {
                        engine_error!("kestrel::vulkan", "Failed to get required extensions: {}", e);
                        Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                    })?
                    .to_vec(),
                None => Vec::new(),
            };

            let validation = Self::validation_enabled(settings);
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!("kestrel::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let messenger = debug_utils
                    .create_debug_utils_messenger(&crate::vulkan_debug::messenger_create_info(), None)
                    .map_err(|e| {
                        engine_error!("kestrel::vulkan", "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                    })?;
                Some((debug_utils, messenger))
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let vk_surface = match (surface, &display_handle) {
                (Some(window), Some(display)) => {
                    let window_handle = window.window_handle().map_err(|e| {
                        engine_error!("kestrel::vulkan", "Failed to get window handle: {}", e);
                        Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                    })?;
                    let vk_surface = ash_window::create_surface(
                        &entry,
                        &instance,
                        display.as_raw(),
                        window_handle.as_raw(),
                        None,
                    )
                    .map_err(|e| {
                        engine_error!("kestrel::vulkan", "Failed to create surface: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
                    })?;
                    Some(vk_surface)
                }
                _ => None,
            };

            let surface = vk_surface.map(|surface| PresentSurface {
                loader: surface_loader.clone(),
                surface,
            });

            let (physical_device, graphics_family, present_family) =
                Self::pick_physical_device(&instance, &surface_loader, vk_surface)?;

            let supported_features = instance.get_physical_device_features(physical_device);
            let adapter = Adapter {
                physical_device,
                graphics_family,
                present_family,
                anisotropy_supported: supported_features.sampler_anisotropy == vk::TRUE,
            };

            let logical = LogicalDevice::new(&instance, adapter, surface.is_some())?;
            let info = Self::device_info(&instance, physical_device, adapter.anisotropy_supported);
            let swapchain = Self::create_swapchain(
                &instance,
                &logical.device,
                adapter,
                surface.as_ref(),
                logical.present_queue,
                settings,
                settings.size,
            )?;

            engine_info!(
                "kestrel::vulkan",
                "Vulkan device '{}' (API {}.{}), {}",
                info.name,
                info.api_version.0,
                info.api_version.1,
                if swapchain.is_some() { "presenting to window" } else { "headless" }
            );

            let LogicalDevice {
                device,
                ctx,
                present_queue,
                frames,
            } = logical;

            Ok(Self {
                info,
                settings: settings.clone(),
                _entry: entry,
                instance,
                adapter,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
                surface,
                device: device.clone(),
                ctx,
                present_queue,
                swapchain,
                frames,
                current_frame: 0,
                acquired_image: None,
                submitted: 0,
                retired: RetireQueue::new(),
                samplers: SamplerCache::new(device, adapter.anisotropy_supported),
                objects: FxHashMap::default(),
                next_handle: 0,
                backbuffer: None,
                skipped_draws: 0,
                lost: false,
            })
        }
    }

    unsafe fn create_swapchain(
        instance: &ash::Instance,
        device: &ash::Device,
        adapter: Adapter,
        surface: Option<&PresentSurface>,
        present_queue: vk::Queue,
        settings: &RendererSettings,
        size: UVec2,
    ) -> Result<Option<Swapchain>> {
        match surface {
            Some(surface) => Ok(Some(Swapchain::new(
                instance,
                device.clone(),
                adapter.physical_device,
                surface.surface,
                surface.loader.clone(),
                present_queue,
                size,
                settings.vertical_sync,
            )?)),
            None => Ok(None),
        }
    }

    fn validation_enabled(settings: &RendererSettings) -> bool {
        if cfg!(feature = "vulkan-validation") {
            settings.debug_renderer
        } else {
            if settings.debug_renderer {
                engine_warn!(
                    "kestrel::vulkan",
                    "Debug renderer requested but validation support is not compiled in"
                );
            }
            false
        }
    }

    /// First device with a graphics queue (and presentation when a surface is given)
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: Option<vk::SurfaceKHR>,
    ) -> Result<(vk::PhysicalDevice, u32, u32)> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            engine_error!("kestrel::vulkan", "Failed to enumerate physical devices: {:?}", e);
            Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
        })?;

        for physical_device in physical_devices {
            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

            let Some(graphics_family) = queue_families
                .iter()
                .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32)
            else {
                continue;
            };

            let present_family = match surface {
                None => Some(graphics_family),
                Some(surface) => {
                    let supports = |family: u32| {
                        surface_loader
                            .get_physical_device_surface_support(physical_device, family, surface)
                            .unwrap_or(false)
                    };
                    if supports(graphics_family) {
                        Some(graphics_family)
                    } else {
                        (0..queue_families.len() as u32).find(|&family| supports(family))
                    }
                }
            };

            if let Some(present_family) = present_family {
                return Ok((physical_device, graphics_family, present_family));
            }
        }

        engine_error!("kestrel::vulkan", "No suitable Vulkan GPU found");
        Err(Error::InitializationFailed("No suitable Vulkan GPU found".to_string()))
    }

    unsafe fn device_info(instance: &ash::Instance, physical_device: vk::PhysicalDevice, anisotropy: bool) -> DeviceInfo {
        let properties = instance.get_physical_device_properties(physical_device);
        let limits = properties.limits;
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown".to_string());

        DeviceInfo {
            driver: Driver::Vulkan,
            name,
            api_version: (
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
            ),
            max_texture_size: limits.max_image_dimension2_d,
            max_anisotropy: if anisotropy { limits.max_sampler_anisotropy as u32 } else { 1 },
            max_sample_count: max_sample_count(
                limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts,
            ),
        }
    }

    /// Draws skipped since creation
    pub fn skipped_draws(&self) -> u64 {
        self.skipped_draws
    }

    /// Distinct samplers created since the last reset
    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_headless(&self) -> bool {
        self.swapchain.is_none()
    }

    fn allocate_handle(&mut self) -> NativeHandle {
        self.next_handle += 1;
        NativeHandle(self.next_handle)
    }

    /// Keep `object` alive until every submission made so far completes
    fn retire(&mut self, object: VulkanObject) {
        self.retired.push(self.submitted, object);
    }

    /// Serial of the oldest submission whose fence has not signaled
    fn oldest_pending(&self) -> Result<Option<u64>> {
        let mut oldest: Option<u64> = None;
        for frame in &self.frames {
            if frame.serial == 0 {
                continue;
            }
            let done = unsafe { self.device.get_fence_status(frame.fence) }
                .map_err(|e| vk_error(e, "Failed to query frame fence"))?;
            if !done {
                oldest = Some(oldest.map_or(frame.serial, |serial| serial.min(frame.serial)));
            }
        }
        Ok(oldest)
    }

    /// Objects retired and not yet released
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    fn insert(&mut self, id: ResourceId, object: VulkanObject) {
        if let Some(previous) = self.objects.insert(id, object) {
            self.retire(previous);
        }
    }

    fn check_lost(&self) -> Result<()> {
        if self.lost {
            return Err(Error::DeviceLost);
        }
        Ok(())
    }

    /// Remember device loss reported by a native call
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(Error::DeviceLost) = &result {
            if !self.lost {
                engine_warn!("kestrel::vulkan", "Vulkan device lost");
            }
            self.lost = true;
        }
        result
    }

    fn upload_texture_inner(&mut self, id: ResourceId, state: &TextureState, dirty: DirtyFlags) -> Result<NativeHandle> {
        let max = self.info.max_texture_size;
        if state.size.x > max || state.size.y > max {
            return Err(Error::BackendError(format!(
                "Texture size {}x{} exceeds {}",
                state.size.x, state.size.y, max
            )));
        }
        if state.sample_count > self.info.max_sample_count {
            return Err(Error::InvalidArgument(format!(
                "Sample count {} exceeds device maximum {}",
                state.sample_count, self.info.max_sample_count
            )));
        }

        let desc = ImageDesc::from_state(state);
        let resolved = resolve_sampler(&state.sampler, &self.settings, &self.info);

        if let Some(VulkanObject::Texture { handle, texture }) = self.objects.get_mut(&id) {
            if !dirty.contains(DirtyFlags::SIZE) && texture.matches(&desc) {
                if dirty.contains(DirtyFlags::DATA) {
                    texture.write_levels(state, state.pending_levels)?;
                }
                if dirty.contains(DirtyFlags::SAMPLER) {
                    texture.sampler = self.samplers.get(&resolved)?;
                }
                return Ok(*handle);
            }
        }

        let mut texture = VulkanTexture::new(Arc::clone(&self.ctx), &desc)?;
        texture.write_levels(state, u64::MAX)?;
        texture.sampler = self.samplers.get(&resolved)?;

        let handle = self.allocate_handle();
        self.insert(id, VulkanObject::Texture { handle, texture });
        engine_debug!(
            "kestrel::vulkan",
            "Texture {:?} created: {}x{} {:?}, {} levels",
            id,
            desc.size.x,
            desc.size.y,
            desc.format,
            desc.mip_count
        );
        Ok(handle)
    }

    fn upload_buffer_inner(&mut self, id: ResourceId, state: &BufferState, dirty: DirtyFlags) -> Result<NativeHandle> {
        let reusable = match self.objects.get(&id) {
            Some(VulkanObject::Buffer { handle, buffer })
                if !dirty.contains(DirtyFlags::SIZE) && buffer.fits(state.data.len()) =>
            {
                Some(*handle)
            }
            _ => None,
        };

        if let Some(handle) = reusable {
            if !dirty.contains(DirtyFlags::DATA) {
                return Ok(handle);
            }
            if self.oldest_pending()?.is_none() {
                if let Some(VulkanObject::Buffer { buffer, .. }) = self.objects.get(&id) {
                    buffer.write(&state.data)?;
                }
                return Ok(handle);
            }
            // A frame in flight may read the old contents: write a new
            // buffer under the same handle and retire the old one
            let buffer = VulkanBuffer::new(Arc::clone(&self.ctx), state)?;
            self.insert(id, VulkanObject::Buffer { handle, buffer });
            return Ok(handle);
        }

        let buffer = VulkanBuffer::new(Arc::clone(&self.ctx), state)?;
        let handle = self.allocate_handle();
        self.insert(id, VulkanObject::Buffer { handle, buffer });
        Ok(handle)
    }

    fn upload_render_target_inner(
        &mut self,
        id: ResourceId,
        state: &RenderTargetState,
        dirty: DirtyFlags,
    ) -> Result<NativeHandle> {
        let previous = match self.objects.get_mut(&id) {
            Some(VulkanObject::RenderTarget(target)) => {
                if !dirty.contains(DirtyFlags::SIZE) && target.matches(state) {
                    target.clear = state.clear;
                    return Ok(target.handle);
                }
                Some(target.handle)
            }
            _ => None,
        };

        // The backbuffer keeps its handle across recreation
        let handle = match previous {
            Some(handle) if state.backbuffer => handle,
            _ => self.allocate_handle(),
        };

        let objects = &self.objects;
        let target = VulkanRenderTarget::new(&self.ctx, handle, state, |attachment| {
            texture_of(objects, attachment).map(VulkanTexture::shape)
        })?;

        if state.backbuffer {
            if let Some(swapchain) = self.swapchain.as_mut() {
                if previous.is_some() {
                    swapchain.recreate(state.size)?;
                }
            }
            self.backbuffer = Some(id);
        }

        engine_debug!(
            "kestrel::vulkan",
            "Render target {:?} created: {}x{}{}",
            id,
            state.size.x,
            state.size.y,
            if state.backbuffer { " (backbuffer)" } else { "" }
        );
        self.insert(id, VulkanObject::RenderTarget(target));
        Ok(handle)
    }

    /// Wait for the current slot, release what no submission uses and start recording
    fn begin_frame(&mut self) -> Result<vk::CommandBuffer> {
        unsafe {
            self.device
                .wait_for_fences(&[self.frames[self.current_frame].fence], true, u64::MAX)
                .map_err(|e| vk_error(e, "Failed to wait for frame fence"))?;
        }
        let pending = self.oldest_pending()?;
        self.retired.release(pending);

        let slot = &self.frames[self.current_frame];
        unsafe {
            self.device
                .reset_command_pool(slot.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| vk_error(e, "Failed to reset frame command pool"))?;

            let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(slot.command_buffer, &begin_info)
                .map_err(|e| vk_error(e, "Failed to begin frame command buffer"))?;
        }
        Ok(slot.command_buffer)
    }

    fn acquire_image(&mut self) -> Result<Option<u32>> {
        let size = self.backbuffer_size();
        let Some(swapchain) = self.swapchain.as_mut() else {
            return Ok(None);
        };

        if let Some(index) = swapchain.acquire(self.current_frame)? {
            return Ok(Some(index));
        }
        engine_debug!("kestrel::vulkan", "Swapchain out of date, recreating");
        swapchain.recreate(size)?;
        swapchain.acquire(self.current_frame)
    }

    fn backbuffer_size(&self) -> UVec2 {
        match self.backbuffer.and_then(|id| self.objects.get(&id)) {
            Some(VulkanObject::RenderTarget(target)) => target.size,
            _ => self.settings.size,
        }
    }

    /// Target selected by `SetRenderTarget`; `None` is the backbuffer
    fn target_of(&self, target: Option<ResourceId>) -> Result<&VulkanRenderTarget> {
        let id = target.or(self.backbuffer).ok_or_else(|| {
            Error::NotInitialized("Backbuffer has not been uploaded".to_string())
        })?;
        match self.objects.get(&id) {
            Some(VulkanObject::RenderTarget(target)) => Ok(target),
            _ => Err(Error::InvalidResource(format!("{:?} has no native target", id))),
        }
    }

    fn buffer_of(&self, id: ResourceId) -> Result<vk::Buffer> {
        match self.objects.get(&id) {
            Some(VulkanObject::Buffer { buffer, .. }) => Ok(buffer.buffer),
            _ => Err(Error::InvalidResource(format!("{:?} has no native buffer", id))),
        }
    }

    fn record_frame(&mut self, cb: vk::CommandBuffer, frame: &Frame) -> Result<()> {
        let mut target: Option<ResourceId> = None;
        let mut skipped = 0u64;
        let mut blend: Option<vk::PipelineColorBlendAttachmentState> = None;
        let mut depth_stencil: Option<NativeDepthStencil> = None;
        let mut bound_textures = 0usize;

        for command in frame.commands() {
            match command {
                DrawCommand::SetRenderTarget(selected) => {
                    self.target_of(*selected)?;
                    target = *selected;
                }
                DrawCommand::Clear => {
                    let render_target = self.target_of(target)?;
                    let lookup = |id| texture_of(&self.objects, id);
                    let color = render_target.color.as_ref().and_then(|a| a.texture(lookup));
                    let depth = render_target.depth.as_ref().and_then(|a| a.texture(lookup));
                    record_clear(&self.device, cb, &render_target.clear, color, depth);
                }
                DrawCommand::SetViewport(viewport) => {
                    let viewport = vk::Viewport {
                        x: viewport.x,
                        y: viewport.y,
                        width: viewport.width,
                        height: viewport.height,
                        min_depth: 0.0,
                        max_depth: 1.0,
                    };
                    unsafe { self.device.cmd_set_viewport(cb, 0, &[viewport]) };
                }
                DrawCommand::SetScissor(scissor) => {
                    let size = self.target_of(target)?.size;
                    let rect = scissor_to_vk(*scissor, size);
                    unsafe { self.device.cmd_set_scissor(cb, 0, &[rect]) };
                }
                DrawCommand::SetBlendState(Some(id)) => match self.objects.get(id) {
                    Some(VulkanObject::BlendState { attachment, .. }) => blend = Some(*attachment),
                    _ => return Err(Error::InvalidResource(format!("{:?} has no native blend state", id))),
                },
                DrawCommand::SetDepthStencilState(Some(id)) => match self.objects.get(id) {
                    Some(VulkanObject::DepthStencilState { state, .. }) => depth_stencil = Some(*state),
                    _ => {
                        return Err(Error::InvalidResource(format!(
                            "{:?} has no native depth/stencil state",
                            id
                        )))
                    }
                },
                DrawCommand::SetBlendState(None) => blend = None,
                DrawCommand::SetDepthStencilState(None) => depth_stencil = None,
                DrawCommand::SetTextures(ids) => {
                    for id in ids {
                        let texture = texture_of(&self.objects, *id)
                            .ok_or_else(|| Error::InvalidResource(format!("{:?} has no native texture", id)))?;
                        if texture.sampler == vk::Sampler::null() {
                            return Err(Error::InvalidResource(format!("{:?} has no sampler", id)));
                        }
                    }
                    bound_textures = ids.len();
                }
                DrawCommand::SetVertexBuffer(id) => {
                    let buffer = self.buffer_of(*id)?;
                    unsafe { self.device.cmd_bind_vertex_buffers(cb, 0, &[buffer], &[0]) };
                }
                DrawCommand::SetIndexBuffer { buffer, format } => {
                    let buffer = self.buffer_of(*buffer)?;
                    unsafe { self.device.cmd_bind_index_buffer(cb, buffer, 0, index_format_to_vk(*format)) };
                }
                DrawCommand::DrawIndexed { index_count, .. } => {
                    skipped += 1;
                    engine_trace!(
                        "kestrel::vulkan",
                        "Draw of {} indices skipped: blend {}, depth test {} write {} {:?}, {} textures",
                        index_count,
                        blend.is_some_and(|b| b.blend_enable == vk::TRUE),
                        depth_stencil.is_some_and(|d| d.depth_test),
                        depth_stencil.is_some_and(|d| d.depth_write),
                        depth_stencil.map(|d| d.compare_op),
                        bound_textures
                    );
                }
            }
        }

        if skipped > 0 {
            if self.skipped_draws == 0 {
                engine_warn!(
                    "kestrel::vulkan",
                    "Draw calls are skipped: the Vulkan device has no pipelines"
                );
            }
            self.skipped_draws += skipped;
        }
        Ok(())
    }

    fn execute_inner(&mut self, frame: &Frame) -> Result<()> {
        let cb = self.begin_frame()?;
        self.record_frame(cb, frame)?;

        // Acquired last so a failed recording leaves no semaphore pending
        let image_index = self.acquire_image()?;

        if let (Some(index), Some(swapchain)) = (image_index, self.swapchain.as_ref()) {
            let backbuffer = self.target_of(None)?;
            let color = backbuffer
                .color
                .as_ref()
                .and_then(|a| a.texture(|id| texture_of(&self.objects, id)))
                .ok_or_else(|| Error::IncompleteFramebuffer("backbuffer has no color attachment".to_string()))?;
            swapchain.record_present_blit(cb, color.image, backbuffer.size, index)?;
        }

        let fence = self.frames[self.current_frame].fence;
        unsafe {
            self.device
                .end_command_buffer(cb)
                .map_err(|e| vk_error(e, "Failed to end frame command buffer"))?;

            let command_buffers = [cb];
            let wait_stages = [vk::PipelineStageFlags::TRANSFER];
            let (wait, signal) = match (image_index, self.swapchain.as_ref()) {
                (Some(index), Some(swapchain)) => {
                    let (wait, signal) = swapchain.sync_info(self.current_frame, index);
                    (vec![wait], vec![signal])
                }
                _ => (Vec::new(), Vec::new()),
            };

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait)
                .wait_dst_stage_mask(&wait_stages[..wait.len()])
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal);

            self.device
                .reset_fences(&[fence])
                .map_err(|e| vk_error(e, "Failed to reset frame fence"))?;
            self.device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(|e| vk_error(e, "Failed to submit frame"))?;
        }

        self.submitted += 1;
        self.frames[self.current_frame].serial = self.submitted;
        self.acquired_image = image_index;
        Ok(())
    }

    fn present_inner(&mut self) -> Result<()> {
        let image_index = self.acquired_image.take();
        let size = self.backbuffer_size();
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        if let (Some(index), Some(swapchain)) = (image_index, self.swapchain.as_mut()) {
            if !swapchain.present(index)? {
                engine_debug!("kestrel::vulkan", "Swapchain out of date after present, recreating");
                swapchain.recreate(size)?;
            }
        }
        Ok(())
    }

    /// Drop every native object and the per-frame state; the device must be idle
    fn release_objects(&mut self) {
        self.objects.clear();
        self.retired.clear();
        self.samplers.clear();
        self.backbuffer = None;
        self.acquired_image = None;
    }
}

fn scissor_to_vk(scissor: Option<ScissorRect>, target_size: UVec2) -> vk::Rect2D {
    match scissor {
        Some(rect) => vk::Rect2D {
            offset: vk::Offset2D { x: rect.x, y: rect.y },
            extent: vk::Extent2D {
                width: rect.width,
                height: rect.height,
            },
        },
        None => vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: target_size.x,
                height: target_size.y,
            },
        },
    }
}

impl RenderDevice for VulkanDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn upload_texture(&mut self, id: ResourceId, texture: &TextureState, dirty: DirtyFlags) -> Result<NativeHandle> {
        self.check_lost()?;
        let result = self.upload_texture_inner(id, texture, dirty);
        self.track(result)
    }

    fn upload_buffer(&mut self, id: ResourceId, buffer: &BufferState, dirty: DirtyFlags) -> Result<NativeHandle> {
        self.check_lost()?;
        let result = self.upload_buffer_inner(id, buffer, dirty);
        self.track(result)
    }

    fn upload_render_target(
        &mut self,
        id: ResourceId,
        target: &RenderTargetState,
        dirty: DirtyFlags,
    ) -> Result<NativeHandle> {
        self.check_lost()?;
        let result = self.upload_render_target_inner(id, target, dirty);
        self.track(result)
    }

    fn upload_blend_state(&mut self, id: ResourceId, desc: &BlendStateDesc) -> Result<NativeHandle> {
        self.check_lost()?;
        let handle = self.allocate_handle();
        self.insert(
            id,
            VulkanObject::BlendState {
                handle,
                attachment: blend_attachment_to_vk(desc),
            },
        );
        Ok(handle)
    }

    fn upload_depth_stencil_state(&mut self, id: ResourceId, desc: &DepthStencilStateDesc) -> Result<NativeHandle> {
        self.check_lost()?;
        let handle = self.allocate_handle();
        self.insert(
            id,
            VulkanObject::DepthStencilState {
                handle,
                state: NativeDepthStencil {
                    depth_test: desc.depth_test,
                    depth_write: desc.depth_write,
                    compare_op: compare_function_to_vk(desc.compare_function),
                },
            },
        );
        Ok(handle)
    }

    fn destroy(&mut self, id: ResourceId) {
        if let Some(object) = self.objects.remove(&id) {
            self.retire(object);
        }
        if self.backbuffer == Some(id) {
            self.backbuffer = None;
        }
    }

    fn native_object_count(&self) -> usize {
        self.objects.len()
    }

    fn execute(&mut self, frame: &Frame) -> Result<()> {
        self.check_lost()?;
        let result = self.execute_inner(frame);
        self.track(result)
    }

    fn present(&mut self) -> Result<()> {
        self.check_lost()?;
        let result = self.present_inner();
        self.track(result)
    }

    fn reset(&mut self) -> Result<()> {
        match unsafe { self.device.device_wait_idle() } {
            Ok(()) | Err(vk::Result::ERROR_DEVICE_LOST) => {}
            Err(e) => {
                engine_error!("kestrel::vulkan", "Failed to wait idle before reset: {:?}", e);
                return Err(Error::InitializationFailed(format!("Failed to wait idle before reset: {:?}", e)));
            }
        }

        // Frames fail until the reset completes
        self.lost = true;
        let size = self.backbuffer_size();

        let logical = unsafe { LogicalDevice::new(&self.instance, self.adapter, self.surface.is_some()) }
            .map_err(recreation_error)?;

        // Everything built on the old device goes before it
        self.release_objects();
        self.swapchain = None;

        let LogicalDevice {
            device,
            ctx,
            present_queue,
            frames,
        } = logical;
        self.samplers = SamplerCache::new(device.clone(), self.adapter.anisotropy_supported);
        let old_device = std::mem::replace(&mut self.device, device);
        let mut old_ctx = std::mem::replace(&mut self.ctx, ctx);
        let mut old_frames = std::mem::replace(&mut self.frames, frames);
        unsafe { destroy_logical_device(&old_device, &mut old_ctx, &mut old_frames) };

        self.present_queue = present_queue;
        self.current_frame = 0;
        self.submitted = 0;

        self.swapchain = unsafe {
            Self::create_swapchain(
                &self.instance,
                &self.device,
                self.adapter,
                self.surface.as_ref(),
                self.present_queue,
                &self.settings,
                size,
            )
        }
        .map_err(recreation_error)?;

        self.lost = false;
        engine_info!("kestrel::vulkan", "Vulkan device recreated");
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let result = unsafe { self.device.device_wait_idle() }.map_err(|e| vk_error(e, "Failed to wait idle"));
        self.track(result)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Native objects and samplers while device and allocator are alive
            self.release_objects();

            // 2. Presentation: swapchain and semaphores
            self.swapchain = None;

            // 3. Frame sync objects, upload pool, allocator and device
            destroy_logical_device(&self.device, &mut self.ctx, &mut self.frames);

            // 4. Debug messenger and surface before the instance
            #[cfg(feature = "vulkan-validation")]
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            if let Some(surface) = self.surface.take() {
                surface.loader.destroy_surface(surface.surface, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
