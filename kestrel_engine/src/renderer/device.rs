/// RenderDevice trait - the render-thread side of a native graphics API
///
/// Devices own every native object, keyed by `ResourceId`. The upload pass
/// hands them the logical state and the dirty bits to reconcile; nothing
/// else ever calls into the native API.

use std::sync::Mutex;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::renderer::buffer::BufferState;
use crate::renderer::dirty::DirtyFlags;
use crate::renderer::empty_device::EmptyDevice;
use crate::renderer::frame::Frame;
use crate::renderer::render_state::{BlendStateDesc, DepthStencilStateDesc};
use crate::renderer::render_target::RenderTargetState;
use crate::renderer::resource_table::{NativeHandle, ResourceId};
use crate::renderer::settings::{Driver, RendererSettings};
use crate::renderer::texture::TextureState;
use crate::renderer::types::{Address, Filter, SamplerDesc};

// ============================================================================
// Device info
// ============================================================================

/// Capabilities reported by a device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub driver: Driver,
    /// Adapter or implementation name
    pub name: String,
    /// Native API version (major, minor)
    pub api_version: (u32, u32),
    pub max_texture_size: u32,
    pub max_anisotropy: u32,
    pub max_sample_count: u32,
}

/// Sampler with device defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedSampler {
    pub filter: Filter,
    pub address_x: Address,
    pub address_y: Address,
    pub max_anisotropy: u32,
}

/// Replace `Filter::Default` and anisotropy 0 with the device-wide settings
pub fn resolve_sampler(sampler: &SamplerDesc, settings: &RendererSettings, info: &DeviceInfo) -> ResolvedSampler {
    let filter = match sampler.filter {
        Filter::Default => settings.texture_filter,
        other => other,
    };
    let max_anisotropy = match sampler.max_anisotropy {
        0 => settings.max_anisotropy,
        n => n,
    };
    ResolvedSampler {
        filter,
        address_x: sampler.address_x,
        address_y: sampler.address_y,
        max_anisotropy: max_anisotropy.clamp(1, info.max_anisotropy.max(1)),
    }
}

// ============================================================================
// RenderDevice trait
// ============================================================================

/// Render-thread device
///
/// Each `upload_*` call receives the dirty bits snapshotted by the upload
/// pass and returns the handle of the (possibly new) native object. On error
/// the device must leave any previous native object for `id` untouched.
pub trait RenderDevice: Send {
    fn info(&self) -> &DeviceInfo;

    fn upload_texture(&mut self, id: ResourceId, texture: &TextureState, dirty: DirtyFlags) -> Result<NativeHandle>;

    fn upload_buffer(&mut self, id: ResourceId, buffer: &BufferState, dirty: DirtyFlags) -> Result<NativeHandle>;

    /// Attachment textures referenced by `target` are uploaded first
    fn upload_render_target(
        &mut self,
        id: ResourceId,
        target: &RenderTargetState,
        dirty: DirtyFlags,
    ) -> Result<NativeHandle>;

    fn upload_blend_state(&mut self, id: ResourceId, desc: &BlendStateDesc) -> Result<NativeHandle>;

    fn upload_depth_stencil_state(&mut self, id: ResourceId, desc: &DepthStencilStateDesc) -> Result<NativeHandle>;

    /// Release the native object of `id`; unknown ids are ignored
    fn destroy(&mut self, id: ResourceId);

    /// Number of live native objects
    fn native_object_count(&self) -> usize;

    /// Record and submit the commands of one frame
    fn execute(&mut self, frame: &Frame) -> Result<()>;

    /// Present the backbuffer
    fn present(&mut self) -> Result<()>;

    /// Recover from device loss: drop every native object and recreate
    /// the device-level state. Resources are re-uploaded afterwards.
    fn reset(&mut self) -> Result<()>;

    /// Block until the device is idle
    fn wait_idle(&mut self) -> Result<()>;
}

// ============================================================================
// Device registry
// ============================================================================

/// Native window the device presents to
pub trait WindowSurface: HasDisplayHandle + HasWindowHandle {}

impl<T: HasDisplayHandle + HasWindowHandle + ?Sized> WindowSurface for T {}

/// Device factory function type
pub type DeviceFactory =
    Box<dyn Fn(&RendererSettings, Option<&dyn WindowSurface>) -> Result<Box<dyn RenderDevice>> + Send + Sync>;

/// Registry of device factories, one per driver
pub struct DeviceRegistry {
    factories: FxHashMap<Driver, DeviceFactory>,
}

impl DeviceRegistry {
    fn new() -> Self {
        let mut registry = Self {
            factories: FxHashMap::default(),
        };
        registry.register(Driver::Empty, |settings, _| {
            Ok(Box::new(EmptyDevice::new(settings)) as Box<dyn RenderDevice>)
        });
        registry
    }

    /// Register or replace the factory of `driver`
    pub fn register<F>(&mut self, driver: Driver, factory: F)
    where
        F: Fn(&RendererSettings, Option<&dyn WindowSurface>) -> Result<Box<dyn RenderDevice>> + Send + Sync + 'static,
    {
        self.factories.insert(driver, Box::new(factory));
    }

    pub fn is_registered(&self, driver: Driver) -> bool {
        self.factories.contains_key(&driver)
    }

    /// Concrete driver that `driver` maps to
    pub fn resolve(&self, driver: Driver) -> Driver {
        match driver {
            Driver::Default if self.is_registered(Driver::Vulkan) => Driver::Vulkan,
            Driver::Default => Driver::Empty,
            other => other,
        }
    }

    pub fn create_device(
        &self,
        settings: &RendererSettings,
        surface: Option<&dyn WindowSurface>,
    ) -> Result<Box<dyn RenderDevice>> {
        let driver = self.resolve(settings.driver);
        let factory = self.factories.get(&driver).ok_or_else(|| {
            Error::InitializationFailed(format!("Driver {:?} is not available", driver))
        })?;
        factory(settings, surface)
    }
}

static DEVICE_REGISTRY: Mutex<Option<DeviceRegistry>> = Mutex::new(None);

fn with_registry<R>(f: impl FnOnce(&mut DeviceRegistry) -> R) -> Result<R> {
    let mut guard = DEVICE_REGISTRY
        .lock()
        .map_err(|_| Error::InitializationFailed("Device registry lock poisoned".to_string()))?;
    let registry = guard.get_or_insert_with(DeviceRegistry::new);
    Ok(f(registry))
}

/// Register a device factory in the global registry
pub fn register_device_factory<F>(driver: Driver, factory: F) -> Result<()>
where
    F: Fn(&RendererSettings, Option<&dyn WindowSurface>) -> Result<Box<dyn RenderDevice>> + Send + Sync + 'static,
{
    with_registry(|registry| registry.register(driver, factory))
}

/// Create a device for `settings.driver` from the global registry
pub fn create_device(settings: &RendererSettings, surface: Option<&dyn WindowSurface>) -> Result<Box<dyn RenderDevice>> {
    with_registry(|registry| registry.create_device(settings, surface))?
}

/// Drivers with a registered factory
pub fn available_drivers() -> Result<Vec<Driver>> {
    with_registry(|registry| {
        [Driver::Empty, Driver::Vulkan, Driver::OpenGl, Driver::Direct3D11]
            .into_iter()
            .filter(|driver| registry.is_registered(*driver))
            .collect()
    })
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
