/// Texture facade, texture descriptor, and logical texture state

use std::sync::Arc;

use glam::UVec2;

use crate::error::{Error, Result};
use crate::renderer::dirty::{DirtyFlags, ResourceState};
use crate::renderer::mipmap;
use crate::renderer::pixel_format::PixelFormat;
use crate::renderer::resource_table::{
    NativeHandle, ResourceContext, ResourceDesc, ResourceHandle, ResourceId,
};
use crate::renderer::types::{Address, ClearState, Color, Dimensions, Filter, SamplerDesc, TextureFlags};

// ===== LEVEL =====

/// One mip level: size, row pitch, and payload (empty = not provided)
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub size: UVec2,
    pub pitch: u32,
    pub data: Vec<u8>,
}

impl Level {
    /// Level with no payload
    pub fn empty(size: UVec2, format: PixelFormat) -> Self {
        Self {
            size,
            pitch: format.row_pitch(size.x),
            data: Vec::new(),
        }
    }

    /// Level with a payload
    pub fn with_data(size: UVec2, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            size,
            pitch: format.row_pitch(size.x),
            data,
        }
    }

    /// Exact payload size in bytes
    pub fn byte_len(&self) -> usize {
        self.pitch as usize * self.size.y as usize
    }
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub size: UVec2,
    pub flags: TextureFlags,
    /// Requested level count; 0 builds the full chain
    pub mip_levels: u32,
    pub sample_count: u32,
    pub pixel_format: PixelFormat,
    pub dimensions: Dimensions,
    pub sampler: SamplerDesc,
    pub clear: ClearState,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            size: UVec2::ZERO,
            flags: TextureFlags::empty(),
            mip_levels: 1,
            sample_count: 1,
            pixel_format: PixelFormat::RGBA8_UNORM,
            dimensions: Dimensions::Two,
            sampler: SamplerDesc::default(),
            clear: ClearState::default(),
        }
    }
}

// ===== TEXTURE STATE =====

/// Logical texture state, owned by the resource slot
#[derive(Debug, Clone)]
pub struct TextureState {
    pub dimensions: Dimensions,
    pub size: UVec2,
    pub flags: TextureFlags,
    pub levels: Vec<Level>,
    /// Level count as requested at creation (0 = full chain)
    pub requested_levels: u32,
    pub sample_count: u32,
    pub pixel_format: PixelFormat,
    pub sampler: SamplerDesc,
    pub clear: ClearState,
    /// Bit `i` set when level `i` holds bytes not yet written to the device
    pub pending_levels: u64,
    /// Owned by a render target, which alone may resize it
    pub attachment: bool,
}

impl TextureState {
    /// Validate a descriptor and build an empty level chain
    pub fn new(desc: &TextureDesc) -> Result<Self> {
        validate_desc(desc)?;

        let count = mipmap::resolve_level_count(desc.size, desc.mip_levels);
        let levels = (0..count)
            .map(|i| Level::empty(mipmap::level_size(desc.size, i), desc.pixel_format))
            .collect();

        Ok(Self {
            dimensions: desc.dimensions,
            size: desc.size,
            flags: desc.flags,
            levels,
            requested_levels: desc.mip_levels,
            sample_count: desc.sample_count,
            pixel_format: desc.pixel_format,
            sampler: desc.sampler,
            clear: desc.clear,
            pending_levels: 0,
            attachment: false,
        })
    }

    /// Build from level 0 bytes, generating the lower levels
    pub fn with_data(desc: &TextureDesc, data: Vec<u8>) -> Result<Self> {
        let mut state = Self::new(desc)?;
        if state.flags.contains(TextureFlags::RENDER_TARGET) {
            return Err(Error::InvalidArgument(
                "Render target textures cannot be created with data".to_string(),
            ));
        }
        state.fill_base_level(data)?;
        Ok(state)
    }

    /// Build from caller-supplied levels; the size is taken from level 0
    pub fn with_levels(desc: &TextureDesc, levels: Vec<Level>) -> Result<Self> {
        let base = levels.first().ok_or_else(|| {
            Error::InvalidArgument("At least one level is required".to_string())
        })?;

        let desc = TextureDesc {
            size: base.size,
            mip_levels: levels.len() as u32,
            ..desc.clone()
        };
        validate_desc(&desc)?;

        if desc.flags.contains(TextureFlags::RENDER_TARGET) {
            return Err(Error::InvalidArgument(
                "Render target textures cannot be created with data".to_string(),
            ));
        }

        let pending = check_levels(desc.size, desc.pixel_format, &levels)?;

        Ok(Self {
            dimensions: desc.dimensions,
            size: desc.size,
            flags: desc.flags,
            levels,
            requested_levels: desc.mip_levels,
            sample_count: desc.sample_count,
            pixel_format: desc.pixel_format,
            sampler: desc.sampler,
            clear: desc.clear,
            pending_levels: pending,
            attachment: false,
        })
    }

    pub fn is_render_target(&self) -> bool {
        self.flags.contains(TextureFlags::RENDER_TARGET)
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    fn check_writable(&self) -> Result<()> {
        if !self.flags.contains(TextureFlags::DYNAMIC) || self.is_render_target() {
            return Err(Error::NotDynamic);
        }
        Ok(())
    }

    fn fill_base_level(&mut self, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyData);
        }
        let expected = self.levels[0].byte_len();
        if data.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "Texture data holds {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        self.levels[0].data = data;
        mipmap::regenerate(&mut self.levels, self.pixel_format);
        self.pending_levels = self
            .levels
            .iter()
            .enumerate()
            .filter(|(_, level)| !level.data.is_empty())
            .fold(0, |mask, (i, _)| mask | 1 << i);
        Ok(())
    }

    /// Replace level 0 and regenerate the chain
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        self.check_writable()?;
        self.fill_base_level(data)
    }

    /// Replace one level without touching the others
    pub fn set_level_data(&mut self, level: u32, data: Vec<u8>) -> Result<()> {
        self.check_writable()?;
        if data.is_empty() {
            return Err(Error::EmptyData);
        }
        let target = self.levels.get_mut(level as usize).ok_or_else(|| {
            Error::InvalidMipLevels(format!("Level {} out of range", level))
        })?;
        if data.len() != target.byte_len() {
            return Err(Error::InvalidArgument(format!(
                "Level {} data holds {} bytes, expected {}",
                level,
                data.len(),
                target.byte_len()
            )));
        }
        target.data = data;
        self.pending_levels |= 1 << level;
        Ok(())
    }

    /// Replace the whole chain; the size follows level 0
    pub fn set_levels(&mut self, levels: Vec<Level>) -> Result<()> {
        self.check_writable()?;
        let size = levels
            .first()
            .map(|base| base.size)
            .ok_or_else(|| Error::InvalidArgument("At least one level is required".to_string()))?;
        if size.x == 0 || size.y == 0 {
            return Err(Error::InvalidArgument("Texture size must be non-zero".to_string()));
        }
        let pending = check_levels(size, self.pixel_format, &levels)?;
        if pending == 0 {
            return Err(Error::EmptyData);
        }

        self.size = size;
        self.requested_levels = levels.len() as u32;
        self.levels = levels;
        self.pending_levels = pending;
        Ok(())
    }

    /// Change the size, discarding every payload
    pub fn resize(&mut self, size: UVec2) -> Result<()> {
        if self.attachment {
            return Err(Error::InvalidArgument(
                "Render target attachments are resized through their render target".to_string(),
            ));
        }
        self.reshape(size)
    }

    pub(crate) fn reshape(&mut self, size: UVec2) -> Result<()> {
        if !self.flags.intersects(TextureFlags::DYNAMIC | TextureFlags::RENDER_TARGET) {
            return Err(Error::NotDynamic);
        }
        if size.x == 0 || size.y == 0 {
            return Err(Error::InvalidArgument("Texture size must be non-zero".to_string()));
        }
        let count = mipmap::resolve_level_count(size, self.requested_levels);
        self.levels = (0..count)
            .map(|i| Level::empty(mipmap::level_size(size, i), self.pixel_format))
            .collect();
        self.size = size;
        self.pending_levels = 0;
        Ok(())
    }
}

/// Check a caller-supplied chain against `size`; returns the mask of levels with bytes
fn check_levels(size: UVec2, format: PixelFormat, levels: &[Level]) -> Result<u64> {
    let full = mipmap::full_chain_length(size);
    if levels.len() as u32 > full {
        return Err(Error::InvalidMipLevels(format!(
            "{} levels supplied, chain has {}",
            levels.len(),
            full
        )));
    }

    let mut pending = 0u64;
    for (i, level) in levels.iter().enumerate() {
        let expected = mipmap::level_size(size, i as u32);
        if level.size != expected {
            return Err(Error::InvalidArgument(format!(
                "Level {} is {}x{}, expected {}x{}",
                i, level.size.x, level.size.y, expected.x, expected.y
            )));
        }
        if level.pitch != format.row_pitch(level.size.x) {
            return Err(Error::InvalidArgument(format!("Level {} has a wrong pitch", i)));
        }
        if !level.data.is_empty() {
            if level.data.len() != level.byte_len() {
                return Err(Error::InvalidArgument(format!(
                    "Level {} holds {} bytes, expected {}",
                    i,
                    level.data.len(),
                    level.byte_len()
                )));
            }
            pending |= 1 << i;
        }
    }
    Ok(pending)
}

fn validate_desc(desc: &TextureDesc) -> Result<()> {
    if desc.size.x == 0 || desc.size.y == 0 {
        return Err(Error::InvalidArgument("Texture size must be non-zero".to_string()));
    }
    match desc.dimensions {
        Dimensions::Two => {}
        Dimensions::One if desc.size.y == 1 => {}
        other => {
            return Err(Error::InvalidArgument(format!(
                "Unsupported dimensions {:?} for size {}x{}",
                other, desc.size.x, desc.size.y
            )));
        }
    }
    if desc.sample_count == 0 || !desc.sample_count.is_power_of_two() {
        return Err(Error::InvalidArgument(format!(
            "Invalid sample count {}",
            desc.sample_count
        )));
    }

    let render_target = desc.flags.contains(TextureFlags::RENDER_TARGET);
    if render_target && desc.mip_levels != 1 {
        return Err(Error::InvalidMipLevels(format!(
            "Render target textures need exactly one level, got {}",
            desc.mip_levels
        )));
    }
    if !render_target && desc.sample_count > 1 {
        return Err(Error::InvalidArgument(
            "Multisampling requires a render target texture".to_string(),
        ));
    }
    if desc.pixel_format.is_depth() && !render_target {
        return Err(Error::InvalidPixelFormat(format!(
            "{:?} is only valid for render targets",
            desc.pixel_format
        )));
    }
    if render_target && desc.flags.contains(TextureFlags::DEPTH_BUFFER) != desc.pixel_format.is_depth() {
        return Err(Error::InvalidPixelFormat(format!(
            "{:?} does not match the depth buffer flag",
            desc.pixel_format
        )));
    }
    Ok(())
}

// ===== TEXTURE FACADE =====

/// Game-thread handle to a texture
///
/// Mutators update the logical state and queue one upload. Dropping the
/// facade queues the deferred destroy.
#[derive(Debug)]
pub struct Texture {
    handle: ResourceHandle,
}

impl Texture {
    pub(crate) fn new(handle: ResourceHandle) -> Self {
        Self { handle }
    }

    pub fn id(&self) -> ResourceId {
        self.handle.id()
    }

    /// Native handle, present once the first upload succeeded
    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.handle.native_handle()
    }

    pub fn resource_state(&self) -> ResourceState {
        self.handle.state()
    }

    fn read<R>(&self, f: impl FnOnce(&TextureState) -> R) -> R {
        let slot = self.handle.lock();
        match slot.desc.as_texture() {
            Some(texture) => f(texture),
            None => unreachable!("texture facade bound to a non-texture slot"),
        }
    }

    fn write(&self, dirty: DirtyFlags, f: impl FnOnce(&mut TextureState) -> Result<()>) -> Result<()> {
        self.handle.mutate(dirty, |desc| match desc.as_texture_mut() {
            Some(texture) => f(texture),
            None => Err(Error::InvalidResource("Not a texture".to_string())),
        })
    }

    /// Copy of the logical state
    pub fn state(&self) -> TextureState {
        self.read(TextureState::clone)
    }

    pub fn size(&self) -> UVec2 {
        self.read(|t| t.size)
    }

    pub fn flags(&self) -> TextureFlags {
        self.read(|t| t.flags)
    }

    pub fn mip_count(&self) -> u32 {
        self.read(|t| t.mip_count())
    }

    pub fn sample_count(&self) -> u32 {
        self.read(|t| t.sample_count)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.read(|t| t.pixel_format)
    }

    pub fn dimensions(&self) -> Dimensions {
        self.read(|t| t.dimensions)
    }

    pub fn sampler(&self) -> SamplerDesc {
        self.read(|t| t.sampler)
    }

    pub fn filter(&self) -> Filter {
        self.read(|t| t.sampler.filter)
    }

    pub fn address_x(&self) -> Address {
        self.read(|t| t.sampler.address_x)
    }

    pub fn address_y(&self) -> Address {
        self.read(|t| t.sampler.address_y)
    }

    pub fn max_anisotropy(&self) -> u32 {
        self.read(|t| t.sampler.max_anisotropy)
    }

    pub fn clear_state(&self) -> ClearState {
        self.read(|t| t.clear)
    }

    /// Bytes of one level, empty when never provided
    pub fn level_data(&self, level: u32) -> Option<Vec<u8>> {
        self.read(|t| t.levels.get(level as usize).map(|l| l.data.clone()))
    }

    /// Replace level 0 and regenerate lower levels
    pub fn set_data(&self, data: Vec<u8>) -> Result<()> {
        self.write(DirtyFlags::DATA, |t| t.set_data(data))
    }

    /// Replace a single level
    pub fn set_level_data(&self, level: u32, data: Vec<u8>) -> Result<()> {
        self.write(DirtyFlags::DATA, |t| t.set_level_data(level, data))
    }

    /// Replace the whole level chain; a new size or level count recreates the native object
    pub fn set_levels(&self, levels: Vec<Level>) -> Result<()> {
        self.write(DirtyFlags::DATA, |t| t.set_levels(levels))
    }

    /// Change the size; the native object is recreated on the next upload
    pub fn resize(&self, size: UVec2) -> Result<()> {
        self.write(DirtyFlags::SIZE | DirtyFlags::DATA, |t| t.resize(size))
    }

    pub(crate) fn resize_attachment(&self, size: UVec2) -> Result<()> {
        self.write(DirtyFlags::SIZE | DirtyFlags::DATA, |t| t.reshape(size))
    }

    pub fn set_filter(&self, filter: Filter) -> Result<()> {
        self.write(DirtyFlags::SAMPLER, |t| {
            t.sampler.filter = filter;
            Ok(())
        })
    }

    pub fn set_address_x(&self, address: Address) -> Result<()> {
        self.write(DirtyFlags::SAMPLER, |t| {
            t.sampler.address_x = address;
            Ok(())
        })
    }

    pub fn set_address_y(&self, address: Address) -> Result<()> {
        self.write(DirtyFlags::SAMPLER, |t| {
            t.sampler.address_y = address;
            Ok(())
        })
    }

    /// 0 restores the device default
    pub fn set_max_anisotropy(&self, max_anisotropy: u32) -> Result<()> {
        self.write(DirtyFlags::SAMPLER, |t| {
            t.sampler.max_anisotropy = max_anisotropy;
            Ok(())
        })
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
}

/// Wrap a validated state into a table resource
pub(crate) fn register(context: &Arc<ResourceContext>, state: TextureState) -> Texture {
    Texture::new(context.register(ResourceDesc::Texture(state)))
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
