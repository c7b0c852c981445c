/// Renderer frontend
///
/// Shared between the game thread, which creates and mutates resources and
/// records frames, and the render thread, which calls `process()` once per
/// frame. Only `process()` and the device-level calls touch the device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::UVec2;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::renderer::buffer::{self, Buffer, BufferDesc, BufferState};
use crate::renderer::command_queue::Command;
use crate::renderer::device::{self, DeviceInfo, RenderDevice, WindowSurface};
use crate::renderer::frame::Frame;
use crate::renderer::render_state::{
    self, BlendState, BlendStateDesc, DepthStencilState, DepthStencilStateDesc,
};
use crate::renderer::render_target::{self, RenderTarget, RenderTargetDesc};
use crate::renderer::resource_table::{ResourceContext, ResourceDesc, ResourceId, ResourceKind};
use crate::renderer::settings::RendererSettings;
use crate::renderer::texture::{self, Level, Texture, TextureDesc, TextureState};
use crate::renderer::upload::{self, UploadReport};
use crate::renderer::dirty::ResourceState;
use crate::{engine_error, engine_info, engine_warn};

/// Frontend statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RendererStats {
    /// Frames executed and presented
    pub frames: u64,
    /// Frames abandoned because an upload or the device failed
    pub aborted_frames: u64,
    /// Recorded frames replaced by a newer one before being rendered
    pub dropped_frames: u64,
    pub uploads: u64,
    pub recreations: u64,
    pub destroys: u64,
    pub device_resets: u64,
}

/// Result of one `process()` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub uploads: UploadReport,
    /// True when a frame was executed and presented
    pub presented: bool,
}

/// Renderer frontend
pub struct Renderer {
    settings: RendererSettings,
    info: DeviceInfo,
    context: Arc<ResourceContext>,
    backbuffer: RenderTarget,
    device: Mutex<Box<dyn RenderDevice>>,
    pending_frame: Mutex<Option<Frame>>,
    frame_counter: AtomicU64,
    device_lost: AtomicBool,
    stats: Mutex<RendererStats>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Renderer {
    /// Create a renderer around an existing device
    pub fn new(settings: RendererSettings, device: Box<dyn RenderDevice>) -> Result<Self> {
        settings.validate()?;

        let info = device.info().clone();
        if settings.sample_count > info.max_sample_count {
            return Err(Error::InvalidArgument(format!(
                "Sample count {} exceeds device maximum {}",
                settings.sample_count, info.max_sample_count
            )));
        }

        let context = ResourceContext::new();
        let backbuffer = render_target::register_backbuffer(
            &context,
            settings.size,
            settings.sample_count,
            settings.depth,
        )?;

        engine_info!(
            "kestrel::renderer",
            "Renderer created: {:?} device '{}' API {}.{}, backbuffer {}x{}",
            info.driver,
            info.name,
            info.api_version.0,
            info.api_version.1,
            settings.size.x,
            settings.size.y
        );

        Ok(Self {
            settings,
            info,
            context,
            backbuffer,
            device: Mutex::new(device),
            pending_frame: Mutex::new(None),
            frame_counter: AtomicU64::new(0),
            device_lost: AtomicBool::new(false),
            stats: Mutex::new(RendererStats::default()),
        })
    }

    /// Create the device for `settings.driver` from the registry, then the renderer
    pub fn with_driver(settings: RendererSettings, surface: Option<&dyn WindowSurface>) -> Result<Self> {
        settings.validate()?;
        let device = device::create_device(&settings, surface)?;
        Self::new(settings, device)
    }

    // ===== ACCESSORS =====

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// The presentable render target
    pub fn backbuffer(&self) -> &RenderTarget {
        &self.backbuffer
    }

    pub fn stats(&self) -> RendererStats {
        *lock(&self.stats)
    }

    /// Live logical resources, the backbuffer included
    pub fn resource_count(&self) -> usize {
        self.context.table.len()
    }

    pub fn resource_count_of(&self, kind: ResourceKind) -> usize {
        self.context.table.count_of(kind)
    }

    /// Commands waiting for the next `process()`
    pub fn queued_commands(&self) -> usize {
        self.context.queue.len()
    }

    /// Live native objects held by the device
    pub fn native_object_count(&self) -> usize {
        lock(&self.device).native_object_count()
    }

    // ===== RESOURCE CREATION (any thread) =====

    fn check_texture_size(&self, size: UVec2) -> Result<()> {
        let max = self.info.max_texture_size;
        if size.x > max || size.y > max {
            return Err(Error::InvalidArgument(format!(
                "Texture size {}x{} exceeds device maximum {}",
                size.x, size.y, max
            )));
        }
        Ok(())
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Result<Texture> {
        self.check_texture_size(desc.size)?;
        let state = TextureState::new(desc)?;
        Ok(texture::register(&self.context, state))
    }

    /// Create a texture from level 0 bytes; lower levels are generated
    pub fn create_texture_with_data(&self, desc: &TextureDesc, data: Vec<u8>) -> Result<Texture> {
        self.check_texture_size(desc.size)?;
        let state = TextureState::with_data(desc, data)?;
        Ok(texture::register(&self.context, state))
    }

    /// Create a texture from explicit levels; the size comes from level 0
    pub fn create_texture_with_levels(&self, desc: &TextureDesc, levels: Vec<Level>) -> Result<Texture> {
        let state = TextureState::with_levels(desc, levels)?;
        self.check_texture_size(state.size)?;
        Ok(texture::register(&self.context, state))
    }

    pub fn create_buffer(&self, desc: BufferDesc) -> Result<Buffer> {
        let state = BufferState::new(desc)?;
        Ok(buffer::register(&self.context, state))
    }

    pub fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTarget> {
        self.check_texture_size(desc.size)?;
        if desc.sample_count > self.info.max_sample_count {
            return Err(Error::InvalidArgument(format!(
                "Sample count {} exceeds device maximum {}",
                desc.sample_count, self.info.max_sample_count
            )));
        }
        render_target::register(&self.context, desc)
    }

    pub fn create_blend_state(&self, desc: BlendStateDesc) -> BlendState {
        render_state::register_blend(&self.context, desc)
    }

    pub fn create_depth_stencil_state(&self, desc: DepthStencilStateDesc) -> DepthStencilState {
        render_state::register_depth_stencil(&self.context, desc)
    }

    // ===== FRAMES (game thread) =====

    /// Start recording a frame
    pub fn begin_frame(&self) -> Frame {
        Frame::new(self.frame_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Hand a recorded frame to the render thread
    ///
    /// A frame not yet rendered is replaced by the newer one.
    pub fn end_frame(&self, frame: Frame) {
        if lock(&self.pending_frame).replace(frame).is_some() {
            lock(&self.stats).dropped_frames += 1;
        }
    }

    /// Resize the backbuffer; the device recreates it on the next `process()`
    pub fn resize(&self, size: UVec2) -> Result<()> {
        self.backbuffer.resize(size)?;
        engine_info!("kestrel::renderer", "Backbuffer resized to {}x{}", size.x, size.y);
        Ok(())
    }

    // ===== RENDER THREAD =====

    /// Drain the queue, upload, execute the pending frame, then destroy
    ///
    /// Any upload or execution failure aborts the whole frame. Failed
    /// uploads stay queued with their dirty bits for the next call.
    pub fn process(&self) -> Result<ProcessReport> {
        let mut device = lock(&self.device);

        if self.device_lost.load(Ordering::Acquire) {
            self.recover(&mut **device)?;
        }

        // The frame lock is held through the drain: a resource dropped after
        // `end_frame` has its Destroy either in this drain with the frame, or
        // in a later one.
        let (frame, commands) = {
            let mut pending = lock(&self.pending_frame);
            let frame = pending.take();
            (frame, self.context.queue.drain())
        };
        let in_use = frame.as_ref().map(|frame| self.frame_resources(frame)).unwrap_or_default();

        let batch = upload::collect(commands, &self.context.table);
        let mut uploads = UploadReport::default();
        let upload_result = upload::upload_all(
            &self.context.table,
            &self.context.queue,
            &mut **device,
            &batch.uploads,
            &in_use,
            &mut uploads,
        );

        let frame_result = match (upload_result, frame) {
            (Err(error), _) => Err(error),
            (Ok(()), Some(frame)) => self.render(&mut **device, &frame).map(|_| true),
            (Ok(()), None) => Ok(false),
        };

        upload::destroy_all(&self.context.table, &mut **device, &batch.destroys, &mut uploads);
        upload::log_report(&uploads);

        let mut stats = lock(&self.stats);
        stats.uploads += uploads.uploaded as u64;
        stats.recreations += uploads.recreated as u64;
        stats.destroys += uploads.destroyed as u64;

        match frame_result {
            Ok(presented) => {
                if presented {
                    stats.frames += 1;
                }
                Ok(ProcessReport { uploads, presented })
            }
            Err(error) => {
                stats.aborted_frames += 1;
                drop(stats);
                self.abort_frame(&error);
                Err(error)
            }
        }
    }

    /// Ids used by `frame`, render target attachments included
    fn frame_resources(&self, frame: &Frame) -> FxHashSet<ResourceId> {
        let mut ids: FxHashSet<ResourceId> = frame.referenced_resources().collect();
        let attachments: Vec<ResourceId> = ids
            .iter()
            .filter_map(|id| self.context.table.get(*id))
            .filter_map(|entry| {
                let slot = entry.lock();
                let attachments = slot
                    .desc
                    .as_render_target()
                    .map(|target| [target.color_texture, target.depth_texture]);
                attachments
            })
            .flatten()
            .flatten()
            .collect();
        ids.extend(attachments);
        ids
    }

    fn render(&self, device: &mut dyn RenderDevice, frame: &Frame) -> Result<()> {
        self.validate_frame(frame)?;
        device.execute(frame)?;
        device.present()
    }

    /// Every referenced resource must exist and be ready
    fn validate_frame(&self, frame: &Frame) -> Result<()> {
        for id in frame.referenced_resources() {
            let entry = self.context.table.get(id).ok_or_else(|| {
                Error::InvalidResource(format!("{:?} referenced by frame {}", id, frame.number()))
            })?;
            let state = entry.lock().state;
            if !state.is_ready() {
                return Err(Error::NotInitialized(format!(
                    "{:?} {:?} is {:?} in frame {}",
                    entry.kind(),
                    id,
                    state,
                    frame.number()
                )));
            }
        }
        Ok(())
    }

    fn abort_frame(&self, error: &Error) {
        if *error == Error::DeviceLost {
            self.device_lost.store(true, Ordering::Release);
            engine_warn!("kestrel::renderer", "Device lost, resources will be recreated");
        } else {
            engine_error!("kestrel::renderer", "Frame aborted: {}", error);
        }
    }

    /// Reset the device and queue every live resource for recreation
    fn recover(&self, device: &mut dyn RenderDevice) -> Result<()> {
        device.reset()?;

        let mut requeued = 0usize;
        for entry in self.context.table.snapshot() {
            let mut slot = entry.lock();
            slot.handle = None;
            if slot.pending_destroy {
                continue;
            }
            if slot.state != ResourceState::Uninitialized {
                slot.state = ResourceState::Reloading;
            }
            let full = slot.desc.full_dirty();
            slot.dirty |= full;
            if let ResourceDesc::Texture(texture) = &mut slot.desc {
                texture.pending_levels = texture
                    .levels
                    .iter()
                    .enumerate()
                    .filter(|(_, level)| !level.data.is_empty())
                    .fold(0, |mask, (i, _)| mask | 1 << i);
            }
            drop(slot);
            self.context.queue.push(Command::Upload(entry.id()));
            requeued += 1;
        }

        self.device_lost.store(false, Ordering::Release);
        lock(&self.stats).device_resets += 1;
        engine_info!("kestrel::renderer", "Device reset, {} resources queued for recreation", requeued);
        Ok(())
    }

    /// Block until the device finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        lock(&self.device).wait_idle()
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
