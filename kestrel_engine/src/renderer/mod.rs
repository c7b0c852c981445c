/// Render resource lifecycle: logical resources, command queue, upload pass

pub mod buffer;
pub mod command_queue;
pub mod device;
pub mod dirty;
pub mod empty_device;
pub mod frame;
pub mod mipmap;
pub mod pixel_format;
pub mod render_state;
pub mod render_target;
pub mod renderer;
pub mod resource_table;
pub mod settings;
pub mod texture;
pub mod types;
pub mod upload;

pub use buffer::{Buffer, BufferDesc, BufferState};
pub use command_queue::{Command, CommandQueue};
pub use device::{
    available_drivers, create_device, register_device_factory, resolve_sampler, DeviceInfo,
    RenderDevice, ResolvedSampler, WindowSurface,
};
pub use dirty::{DirtyFlags, ResourceState};
pub use empty_device::{EmptyDevice, EmptyDeviceCounters, EmptyDeviceProbe, EmptyObject};
pub use frame::{DrawCommand, Frame, ScissorRect, Viewport, MAX_TEXTURE_SLOTS};
pub use pixel_format::{NumericKind, PixelFormat};
pub use render_state::{
    BlendFactor, BlendOperation, BlendState, BlendStateDesc, ColorMask, CompareFunction,
    DepthStencilState, DepthStencilStateDesc,
};
pub use render_target::{RenderTarget, RenderTargetDesc, RenderTargetState};
pub use renderer::{ProcessReport, Renderer, RendererStats};
pub use resource_table::{NativeHandle, ResourceId, ResourceKind};
pub use settings::{Driver, RendererSettings};
pub use texture::{Level, Texture, TextureDesc, TextureState};
pub use types::{
    Address, BufferFlags, BufferUsage, ClearState, Color, Dimensions, Filter, IndexFormat,
    RenderTargetFlags, SamplerDesc, TextureFlags,
};
pub use upload::UploadReport;
