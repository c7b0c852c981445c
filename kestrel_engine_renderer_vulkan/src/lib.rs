/*!
# Kestrel Engine - Vulkan Device

Vulkan implementation of the Kestrel `RenderDevice` trait, built on ash for
the bindings and gpu-allocator for memory management.

The device can present to a window surface or run headless. It is made
available to `Renderer::with_driver` through `register()`.

```no_run
use kestrel_engine::kestrel::render::{Driver, Renderer, RendererSettings};

kestrel_engine_renderer_vulkan::register()?;
let settings = RendererSettings {
    driver: Driver::Vulkan,
    ..Default::default()
};
let renderer = Renderer::with_driver(settings, None)?;
# Ok::<(), kestrel_engine::kestrel::Error>(())
```
*/

mod vulkan_buffer;
mod vulkan_context;
mod vulkan_device;
mod vulkan_format;
mod vulkan_render_target;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_texture;

#[cfg(feature = "vulkan-validation")]
mod vulkan_debug;

pub use vulkan_device::VulkanDevice;

#[cfg(feature = "vulkan-validation")]
pub use vulkan_debug::{print_validation_stats_report, reset_validation_stats, validation_stats, ValidationStats};

use kestrel_engine::kestrel::render::{register_device_factory, Driver, RenderDevice};
use kestrel_engine::kestrel::Result;

/// Register the Vulkan device factory for `Driver::Vulkan`
///
/// Once registered, `Driver::Default` also resolves to Vulkan.
pub fn register() -> Result<()> {
    register_device_factory(Driver::Vulkan, |settings, surface| {
        Ok(Box::new(VulkanDevice::new(settings, surface)?) as Box<dyn RenderDevice>)
    })
}
