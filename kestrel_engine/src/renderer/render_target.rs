/// Render target facade and logical render target state
///
/// A render target owns up to two attachments. Bindable attachments are
/// regular texture resources that can also be sampled; the others live
/// entirely inside the device.

use std::sync::Arc;

use glam::UVec2;

use crate::error::{Error, Result};
use crate::renderer::dirty::{DirtyFlags, ResourceState};
use crate::renderer::pixel_format::PixelFormat;
use crate::renderer::resource_table::{
    NativeHandle, ResourceContext, ResourceDesc, ResourceHandle, ResourceId,
};
use crate::renderer::texture::{self, Texture, TextureDesc, TextureState};
use crate::renderer::types::{ClearState, Color, RenderTargetFlags, TextureFlags};

/// Descriptor for creating a render target
#[derive(Debug, Clone)]
pub struct RenderTargetDesc {
    pub size: UVec2,
    pub flags: RenderTargetFlags,
    pub sample_count: u32,
    pub color_format: PixelFormat,
    pub depth_format: PixelFormat,
    pub clear: ClearState,
}

impl Default for RenderTargetDesc {
    fn default() -> Self {
        Self {
            size: UVec2::ZERO,
            flags: RenderTargetFlags::COLOR_BUFFER,
            sample_count: 1,
            color_format: PixelFormat::RGBA8_UNORM,
            depth_format: PixelFormat::D32_FLOAT,
            clear: ClearState::default(),
        }
    }
}

/// Logical render target state, owned by the resource slot
#[derive(Debug, Clone)]
pub struct RenderTargetState {
    pub size: UVec2,
    pub flags: RenderTargetFlags,
    pub sample_count: u32,
    pub color_format: PixelFormat,
    pub depth_format: PixelFormat,
    /// Texture resource backing a bindable color attachment
    pub color_texture: Option<ResourceId>,
    /// Texture resource backing a bindable depth attachment
    pub depth_texture: Option<ResourceId>,
    pub clear: ClearState,
    /// Presentable target owned by the renderer
    pub backbuffer: bool,
}

impl RenderTargetState {
    pub fn has_color(&self) -> bool {
        self.flags.contains(RenderTargetFlags::COLOR_BUFFER)
    }

    pub fn has_depth(&self) -> bool {
        self.flags.contains(RenderTargetFlags::DEPTH_BUFFER)
    }

    fn resize(&mut self, size: UVec2) -> Result<()> {
        check_size(size)?;
        self.size = size;
        Ok(())
    }
}

fn check_size(size: UVec2) -> Result<()> {
    if size.x == 0 || size.y == 0 {
        return Err(Error::InvalidArgument("Render target size must be non-zero".to_string()));
    }
    Ok(())
}

fn validate_desc(desc: &RenderTargetDesc) -> Result<()> {
    check_size(desc.size)?;

    let flags = desc.flags;
    if !flags.intersects(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::DEPTH_BUFFER) {
        return Err(Error::IncompleteFramebuffer("no attachments requested".to_string()));
    }
    if flags.contains(RenderTargetFlags::BINDABLE_COLOR_BUFFER)
        && !flags.contains(RenderTargetFlags::COLOR_BUFFER)
    {
        return Err(Error::InvalidArgument(
            "Bindable color buffer requires a color buffer".to_string(),
        ));
    }
    if flags.contains(RenderTargetFlags::BINDABLE_DEPTH_BUFFER)
        && !flags.contains(RenderTargetFlags::DEPTH_BUFFER)
    {
        return Err(Error::InvalidArgument(
            "Bindable depth buffer requires a depth buffer".to_string(),
        ));
    }
    if desc.sample_count == 0 || !desc.sample_count.is_power_of_two() {
        return Err(Error::InvalidArgument(format!(
            "Invalid sample count {}",
            desc.sample_count
        )));
    }
    if desc.sample_count > 1
        && flags.intersects(
            RenderTargetFlags::BINDABLE_COLOR_BUFFER | RenderTargetFlags::BINDABLE_DEPTH_BUFFER,
        )
    {
        return Err(Error::InvalidArgument(
            "Bindable attachments must be single-sampled".to_string(),
        ));
    }
    if flags.contains(RenderTargetFlags::COLOR_BUFFER) && desc.color_format.is_depth() {
        return Err(Error::InvalidPixelFormat(format!(
            "{:?} is not a color format",
            desc.color_format
        )));
    }
    if flags.contains(RenderTargetFlags::DEPTH_BUFFER) && !desc.depth_format.is_depth() {
        return Err(Error::InvalidPixelFormat(format!(
            "{:?} is not a depth format",
            desc.depth_format
        )));
    }
    Ok(())
}

fn attachment_state(desc: &RenderTargetDesc, depth: bool) -> Result<TextureState> {
    let (flags, pixel_format) = if depth {
        (
            TextureFlags::RENDER_TARGET
                | TextureFlags::DEPTH_BUFFER
                | TextureFlags::BINDABLE_DEPTH_BUFFER,
            desc.depth_format,
        )
    } else {
        (
            TextureFlags::RENDER_TARGET | TextureFlags::BINDABLE_COLOR_BUFFER,
            desc.color_format,
        )
    };

    let mut state = TextureState::new(&TextureDesc {
        size: desc.size,
        flags,
        mip_levels: 1,
        sample_count: desc.sample_count,
        pixel_format,
        clear: desc.clear,
        ..Default::default()
    })?;
    state.attachment = true;
    Ok(state)
}

/// Game-thread handle to a render target
///
/// Field order matters: the target's destroy is queued before the
/// destroys of its attachments.
#[derive(Debug)]
pub struct RenderTarget {
    handle: ResourceHandle,
    color_texture: Option<Texture>,
    depth_texture: Option<Texture>,
}

impl RenderTarget {
    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.handle.native_handle()
    }

    pub fn resource_state(&self) -> ResourceState {
        self.handle.state()
    }

    fn read<R>(&self, f: impl FnOnce(&RenderTargetState) -> R) -> R {
        let slot = self.handle.lock();
        match slot.desc.as_render_target() {
            Some(target) => f(target),
            None => unreachable!("render target facade bound to a non-target slot"),
        }
    }

    fn write(&self, dirty: DirtyFlags, f: impl FnOnce(&mut RenderTargetState) -> Result<()>) -> Result<()> {
        self.handle.mutate(dirty, |desc| match desc.as_render_target_mut() {
            Some(target) => f(target),
            None => Err(Error::InvalidResource("Not a render target".to_string())),
        })
    }

    pub fn state(&self) -> RenderTargetState {
        self.read(RenderTargetState::clone)
    }

    pub fn size(&self) -> UVec2 {
        self.read(|t| t.size)
    }

    pub fn flags(&self) -> RenderTargetFlags {
        self.read(|t| t.flags)
    }

    pub fn sample_count(&self) -> u32 {
        self.read(|t| t.sample_count)
    }

    pub fn clear_state(&self) -> ClearState {
        self.read(|t| t.clear)
    }

    pub fn is_backbuffer(&self) -> bool {
        self.read(|t| t.backbuffer)
    }

    /// Sampleable color attachment, when created bindable
    pub fn color_texture(&self) -> Option<&Texture> {
        self.color_texture.as_ref()
    }

    /// Sampleable depth attachment, when created bindable
    pub fn depth_texture(&self) -> Option<&Texture> {
        self.depth_texture.as_ref()
    }

    pub fn set_clear_color_buffer(&self, clear: bool) -> Result<()> {
        self.write(DirtyFlags::CLEAR, |t| {
            t.clear.clear_color_buffer = clear;
            Ok(())
        })
    }

    pub fn set_clear_depth_buffer(&self, clear: bool) -> Result<()> {
        self.write(DirtyFlags::CLEAR, |t| {
            t.clear.clear_depth_buffer = clear;
            Ok(())
        })
    }

    pub fn set_clear_color(&self, color: Color) -> Result<()> {
        self.write(DirtyFlags::CLEAR, |t| {
            t.clear.clear_color = color;
            Ok(())
        })
    }

    pub fn set_clear_depth(&self, depth: f32) -> Result<()> {
        self.write(DirtyFlags::CLEAR, |t| {
            t.clear.clear_depth = depth;
            Ok(())
        })
    }

    /// Resize the target and its bindable attachments
    ///
    /// The backbuffer goes through `Reloading` until the device has
    /// recreated its presentable images.
    pub fn resize(&self, size: UVec2) -> Result<()> {
        check_size(size)?;

        for attachment in self.color_texture.iter().chain(self.depth_texture.iter()) {
            attachment.resize_attachment(size)?;
        }

        let dirty = DirtyFlags::SIZE;
        let apply = |desc: &mut ResourceDesc| match desc.as_render_target_mut() {
            Some(target) => target.resize(size),
            None => Err(Error::InvalidResource("Not a render target".to_string())),
        };

        if self.is_backbuffer() {
            self.handle.reload(dirty, apply)
        } else {
            self.handle.mutate(dirty, apply)
        }
    }
}

/// Validate, register bindable attachments, then the target itself
pub(crate) fn register(context: &Arc<ResourceContext>, desc: &RenderTargetDesc) -> Result<RenderTarget> {
    validate_desc(desc)?;

    let color_state = if desc.flags.contains(RenderTargetFlags::BINDABLE_COLOR_BUFFER) {
        Some(attachment_state(desc, false)?)
    } else {
        None
    };
    let depth_state = if desc.flags.contains(RenderTargetFlags::BINDABLE_DEPTH_BUFFER) {
        Some(attachment_state(desc, true)?)
    } else {
        None
    };

    let color_texture = color_state.map(|state| texture::register(context, state));
    let depth_texture = depth_state.map(|state| texture::register(context, state));

    let state = RenderTargetState {
        size: desc.size,
        flags: desc.flags,
        sample_count: desc.sample_count,
        color_format: desc.color_format,
        depth_format: desc.depth_format,
        color_texture: color_texture.as_ref().map(Texture::id),
        depth_texture: depth_texture.as_ref().map(Texture::id),
        clear: desc.clear,
        backbuffer: false,
    };

    Ok(RenderTarget {
        handle: context.register(ResourceDesc::RenderTarget(state)),
        color_texture,
        depth_texture,
    })
}

/// Register the presentable target; formats are chosen by the device
pub(crate) fn register_backbuffer(
    context: &Arc<ResourceContext>,
    size: UVec2,
    sample_count: u32,
    depth: bool,
) -> Result<RenderTarget> {
    let mut flags = RenderTargetFlags::COLOR_BUFFER;
    if depth {
        flags |= RenderTargetFlags::DEPTH_BUFFER;
    }
    let desc = RenderTargetDesc {
        size,
        flags,
        sample_count,
        clear: ClearState {
            clear_depth_buffer: depth,
            ..ClearState::default()
        },
        ..Default::default()
    };
    validate_desc(&desc)?;

    let state = RenderTargetState {
        size: desc.size,
        flags: desc.flags,
        sample_count: desc.sample_count,
        color_format: desc.color_format,
        depth_format: desc.depth_format,
        color_texture: None,
        depth_texture: None,
        clear: desc.clear,
        backbuffer: true,
    };

    Ok(RenderTarget {
        handle: context.register(ResourceDesc::RenderTarget(state)),
        color_texture: None,
        depth_texture: None,
    })
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
