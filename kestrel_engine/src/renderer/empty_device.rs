/// Empty device - a recording device with no native API behind it
///
/// Keeps a model of every native object it would have created and counts
/// each native call, so the upload pass can be checked without a GPU.
/// Failures and device loss can be injected through `EmptyDeviceProbe`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::UVec2;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::renderer::buffer::BufferState;
use crate::renderer::device::{resolve_sampler, DeviceInfo, RenderDevice, ResolvedSampler};
use crate::renderer::dirty::DirtyFlags;
use crate::renderer::frame::{DrawCommand, Frame};
use crate::renderer::pixel_format::PixelFormat;
use crate::renderer::render_state::{BlendStateDesc, DepthStencilStateDesc};
use crate::renderer::render_target::RenderTargetState;
use crate::renderer::resource_table::{NativeHandle, ResourceId};
use crate::renderer::settings::{Driver, RendererSettings};
use crate::renderer::texture::TextureState;
use crate::renderer::types::ClearState;
use crate::engine_debug;

// ============================================================================
// Native object model
// ============================================================================

/// Native-side view of one resource
#[derive(Debug, Clone, PartialEq)]
pub enum EmptyObject {
    Texture {
        handle: NativeHandle,
        size: UVec2,
        format: PixelFormat,
        mip_count: u32,
        sample_count: u32,
        sampler: ResolvedSampler,
        clear: ClearState,
        /// Bytes last written per level
        levels: Vec<Vec<u8>>,
    },
    Buffer {
        handle: NativeHandle,
        capacity: u32,
        contents: Vec<u8>,
    },
    RenderTarget {
        handle: NativeHandle,
        size: UVec2,
        color: Option<NativeHandle>,
        depth: Option<NativeHandle>,
        clear: ClearState,
        backbuffer: bool,
    },
    BlendState {
        handle: NativeHandle,
        desc: BlendStateDesc,
    },
    DepthStencilState {
        handle: NativeHandle,
        desc: DepthStencilStateDesc,
    },
}

impl EmptyObject {
    pub fn handle(&self) -> NativeHandle {
        match self {
            EmptyObject::Texture { handle, .. }
            | EmptyObject::Buffer { handle, .. }
            | EmptyObject::RenderTarget { handle, .. }
            | EmptyObject::BlendState { handle, .. }
            | EmptyObject::DepthStencilState { handle, .. } => *handle,
        }
    }
}

/// Native call counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmptyDeviceCounters {
    pub texture_creates: u32,
    /// One per mip level written
    pub texture_level_writes: u32,
    pub sampler_updates: u32,
    pub clear_updates: u32,
    pub buffer_creates: u32,
    /// Map-write of an existing buffer
    pub buffer_writes: u32,
    pub render_target_creates: u32,
    pub backbuffer_resizes: u32,
    pub state_creates: u32,
    pub destroys: u32,
    pub frames_executed: u32,
    pub clears: u32,
    pub draws: u32,
    pub presents: u32,
    pub resets: u32,
}

#[derive(Debug, Default)]
struct EmptyShared {
    objects: FxHashMap<ResourceId, EmptyObject>,
    counters: EmptyDeviceCounters,
    next_handle: u64,
    fail_next_upload: Option<Error>,
    lost: bool,
    bound_textures: Vec<NativeHandle>,
}

impl EmptyShared {
    fn allocate(&mut self) -> NativeHandle {
        self.next_handle += 1;
        NativeHandle(self.next_handle)
    }

    fn check_upload(&mut self) -> Result<()> {
        if self.lost {
            return Err(Error::DeviceLost);
        }
        if let Some(error) = self.fail_next_upload.take() {
            if error == Error::DeviceLost {
                self.lost = true;
            }
            return Err(error);
        }
        Ok(())
    }

    fn texture_handle(&self, id: ResourceId) -> Result<NativeHandle> {
        match self.objects.get(&id) {
            Some(EmptyObject::Texture { handle, .. }) => Ok(*handle),
            _ => Err(Error::InvalidResource(format!("{:?} has no native texture", id))),
        }
    }

    /// Resolve an attachment whose size, format and samples match `target`
    fn attachment_handle(
        &self,
        id: ResourceId,
        target: &RenderTargetState,
        expected_format: PixelFormat,
        kind: &str,
    ) -> Result<NativeHandle> {
        match self.objects.get(&id) {
            Some(EmptyObject::Texture {
                handle,
                size,
                format,
                sample_count,
                ..
            }) => {
                if *size != target.size {
                    return Err(Error::IncompleteFramebuffer(format!(
                        "{} attachment {:?} is {}x{}, target is {}x{}",
                        kind, id, size.x, size.y, target.size.x, target.size.y
                    )));
                }
                if *format != expected_format {
                    return Err(Error::IncompleteFramebuffer(format!(
                        "{} attachment {:?} is {:?}, target expects {:?}",
                        kind, id, format, expected_format
                    )));
                }
                if *sample_count != target.sample_count {
                    return Err(Error::IncompleteFramebuffer(format!(
                        "{} attachment {:?} has {} samples, target has {}",
                        kind, id, sample_count, target.sample_count
                    )));
                }
                Ok(*handle)
            }
            _ => Err(Error::IncompleteFramebuffer(format!("{} attachment {:?} missing", kind, id))),
        }
    }
}

fn lock(shared: &Mutex<EmptyShared>) -> MutexGuard<'_, EmptyShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Probe
// ============================================================================

/// Shared view into an `EmptyDevice`, usable after the device moved
/// into a renderer
#[derive(Debug, Clone)]
pub struct EmptyDeviceProbe {
    shared: Arc<Mutex<EmptyShared>>,
}

impl EmptyDeviceProbe {
    pub fn counters(&self) -> EmptyDeviceCounters {
        lock(&self.shared).counters
    }

    pub fn native_object_count(&self) -> usize {
        lock(&self.shared).objects.len()
    }

    pub fn object(&self, id: ResourceId) -> Option<EmptyObject> {
        lock(&self.shared).objects.get(&id).cloned()
    }

    /// Texture handles bound by the last `SetTextures` of the last frame
    pub fn bound_textures(&self) -> Vec<NativeHandle> {
        lock(&self.shared).bound_textures.clone()
    }

    /// Make the next upload fail with `error`
    ///
    /// `Error::DeviceLost` also puts the device in the lost state.
    pub fn fail_next_upload(&self, error: Error) {
        lock(&self.shared).fail_next_upload = Some(error);
    }

    /// Lose the device: every call fails until `reset`
    pub fn lose_device(&self) {
        lock(&self.shared).lost = true;
    }

    pub fn is_lost(&self) -> bool {
        lock(&self.shared).lost
    }
}

// ============================================================================
// Device
// ============================================================================

/// Recording device
pub struct EmptyDevice {
    info: DeviceInfo,
    settings: RendererSettings,
    shared: Arc<Mutex<EmptyShared>>,
}

impl EmptyDevice {
    pub fn new(settings: &RendererSettings) -> Self {
        engine_debug!("kestrel::empty", "Empty device created");
        Self {
            info: DeviceInfo {
                driver: Driver::Empty,
                name: "Empty".to_string(),
                api_version: (0, 0),
                max_texture_size: 16384,
                max_anisotropy: 16,
                max_sample_count: 8,
            },
            settings: settings.clone(),
            shared: Arc::new(Mutex::new(EmptyShared::default())),
        }
    }

    pub fn probe(&self) -> EmptyDeviceProbe {
        EmptyDeviceProbe {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl RenderDevice for EmptyDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn upload_texture(&mut self, id: ResourceId, texture: &TextureState, dirty: DirtyFlags) -> Result<NativeHandle> {
        let mut shared = lock(&self.shared);
        shared.check_upload()?;

        if texture.size.x > self.info.max_texture_size || texture.size.y > self.info.max_texture_size {
            return Err(Error::BackendError(format!(
                "Texture size {}x{} exceeds {}",
                texture.size.x, texture.size.y, self.info.max_texture_size
            )));
        }

        let sampler = resolve_sampler(&texture.sampler, &self.settings, &self.info);
        let existing = match shared.objects.get(&id) {
            Some(EmptyObject::Texture { size, format, mip_count, sample_count, .. })
                if !dirty.contains(DirtyFlags::SIZE)
                    && *size == texture.size
                    && *format == texture.pixel_format
                    && *mip_count == texture.mip_count()
                    && *sample_count == texture.sample_count =>
            {
                shared.objects.get(&id).cloned()
            }
            _ => None,
        };

        let object = match existing {
            Some(EmptyObject::Texture { handle, size, format, mip_count, sample_count, sampler: _, clear: old_clear, mut levels }) => {
                if dirty.contains(DirtyFlags::DATA) {
                    for (i, level) in texture.levels.iter().enumerate() {
                        if texture.pending_levels & (1 << i) != 0 {
                            levels[i] = level.data.clone();
                            shared.counters.texture_level_writes += 1;
                        }
                    }
                }
                if dirty.contains(DirtyFlags::SAMPLER) {
                    shared.counters.sampler_updates += 1;
                }
                let clear = if dirty.contains(DirtyFlags::CLEAR) {
                    shared.counters.clear_updates += 1;
                    texture.clear
                } else {
                    old_clear
                };
                EmptyObject::Texture { handle, size, format, mip_count, sample_count, sampler, clear, levels }
            }
            _ => {
                let handle = shared.allocate();
                let levels: Vec<Vec<u8>> = texture.levels.iter().map(|l| l.data.clone()).collect();
                let written = levels.iter().filter(|l| !l.is_empty()).count() as u32;
                shared.counters.texture_creates += 1;
                shared.counters.texture_level_writes += written;
                EmptyObject::Texture {
                    handle,
                    size: texture.size,
                    format: texture.pixel_format,
                    mip_count: texture.mip_count(),
                    sample_count: texture.sample_count,
                    sampler,
                    clear: texture.clear,
                    levels,
                }
            }
        };

        let handle = object.handle();
        shared.objects.insert(id, object);
        Ok(handle)
    }

    fn upload_buffer(&mut self, id: ResourceId, buffer: &BufferState, dirty: DirtyFlags) -> Result<NativeHandle> {
        let mut shared = lock(&self.shared);
        shared.check_upload()?;

        let reusable = match shared.objects.get(&id) {
            Some(EmptyObject::Buffer { handle, capacity, .. })
                if !dirty.contains(DirtyFlags::SIZE) && buffer.data.len() <= *capacity as usize =>
            {
                Some(*handle)
            }
            _ => None,
        };

        let handle = match reusable {
            Some(handle) => {
                if dirty.contains(DirtyFlags::DATA) {
                    shared.counters.buffer_writes += 1;
                }
                handle
            }
            None => {
                shared.counters.buffer_creates += 1;
                shared.allocate()
            }
        };

        shared.objects.insert(
            id,
            EmptyObject::Buffer {
                handle,
                capacity: buffer.size,
                contents: buffer.data.clone(),
            },
        );
        Ok(handle)
    }

    fn upload_render_target(
        &mut self,
        id: ResourceId,
        target: &RenderTargetState,
        dirty: DirtyFlags,
    ) -> Result<NativeHandle> {
        let mut shared = lock(&self.shared);
        shared.check_upload()?;

        let color = match target.color_texture {
            Some(texture) => {
                Some(shared.attachment_handle(texture, target, target.color_format, "color")?)
            }
            None => None,
        };
        let depth = match target.depth_texture {
            Some(texture) => {
                Some(shared.attachment_handle(texture, target, target.depth_format, "depth")?)
            }
            None => None,
        };

        let previous = match shared.objects.get(&id) {
            Some(EmptyObject::RenderTarget { handle, size, .. }) => Some((*handle, *size)),
            _ => None,
        };

        let handle = match previous {
            Some((handle, size)) if target.backbuffer => {
                if dirty.contains(DirtyFlags::SIZE) || size != target.size {
                    shared.counters.backbuffer_resizes += 1;
                }
                handle
            }
            Some((handle, size)) if !dirty.contains(DirtyFlags::SIZE) && size == target.size => {
                if dirty.contains(DirtyFlags::CLEAR) {
                    shared.counters.clear_updates += 1;
                }
                handle
            }
            _ => {
                shared.counters.render_target_creates += 1;
                shared.allocate()
            }
        };

        shared.objects.insert(
            id,
            EmptyObject::RenderTarget {
                handle,
                size: target.size,
                color,
                depth,
                clear: target.clear,
                backbuffer: target.backbuffer,
            },
        );
        Ok(handle)
    }

    fn upload_blend_state(&mut self, id: ResourceId, desc: &BlendStateDesc) -> Result<NativeHandle> {
        let mut shared = lock(&self.shared);
        shared.check_upload()?;
        let handle = shared.allocate();
        shared.counters.state_creates += 1;
        shared.objects.insert(id, EmptyObject::BlendState { handle, desc: *desc });
        Ok(handle)
    }

    fn upload_depth_stencil_state(&mut self, id: ResourceId, desc: &DepthStencilStateDesc) -> Result<NativeHandle> {
        let mut shared = lock(&self.shared);
        shared.check_upload()?;
        let handle = shared.allocate();
        shared.counters.state_creates += 1;
        shared.objects.insert(id, EmptyObject::DepthStencilState { handle, desc: *desc });
        Ok(handle)
    }

    fn destroy(&mut self, id: ResourceId) {
        let mut shared = lock(&self.shared);
        if shared.objects.remove(&id).is_some() {
            shared.counters.destroys += 1;
        }
    }

    fn native_object_count(&self) -> usize {
        lock(&self.shared).objects.len()
    }

    fn execute(&mut self, frame: &Frame) -> Result<()> {
        let mut shared = lock(&self.shared);
        if shared.lost {
            return Err(Error::DeviceLost);
        }

        for command in frame.commands() {
            match command {
                DrawCommand::SetRenderTarget(Some(id)) => {
                    if !shared.objects.contains_key(id) {
                        return Err(Error::InvalidResource(format!("{:?} has no native target", id)));
                    }
                }
                DrawCommand::Clear => shared.counters.clears += 1,
                DrawCommand::SetTextures(ids) => {
                    let handles = ids
                        .iter()
                        .map(|id| shared.texture_handle(*id))
                        .collect::<Result<Vec<_>>>()?;
                    shared.bound_textures = handles;
                }
                DrawCommand::DrawIndexed { .. } => shared.counters.draws += 1,
                _ => {}
            }
        }

        shared.counters.frames_executed += 1;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        if shared.lost {
            return Err(Error::DeviceLost);
        }
        shared.counters.presents += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let mut shared = lock(&self.shared);
        shared.objects.clear();
        shared.bound_textures.clear();
        shared.fail_next_upload = None;
        shared.lost = false;
        shared.counters.resets += 1;
        engine_debug!("kestrel::empty", "Empty device reset");
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "empty_device_tests.rs"]
mod tests;
