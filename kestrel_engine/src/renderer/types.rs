/// Shared resource vocabulary: flags, sampler enums, clear state

use bitflags::bitflags;
use glam::Vec4;

// ===== COLOR =====

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Build from a packed 0xRRGGBBAA value
    pub const fn from_rgba(value: u32) -> Self {
        Self {
            r: (value >> 24) as u8,
            g: (value >> 16) as u8,
            b: (value >> 8) as u8,
            a: value as u8,
        }
    }

    /// Channels as floats in [0, 1]
    pub fn normalized(&self) -> Vec4 {
        Vec4::new(self.r as f32, self.g as f32, self.b as f32, self.a as f32) / 255.0
    }
}

// ===== TEXTURE ENUMS =====

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimensions {
    One,
    #[default]
    Two,
    Three,
    Cube,
}

/// Texture filtering
///
/// `Default` defers to the device-wide filter chosen in `RendererSettings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    Default,
    Point,
    Linear,
    Bilinear,
    Trilinear,
}

/// Texture coordinate addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Address {
    #[default]
    Clamp,
    Repeat,
    MirrorRepeat,
}

bitflags! {
    /// Texture creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Data may be replaced after creation
        const DYNAMIC = 0x01;
        /// Texture is a render target attachment
        const RENDER_TARGET = 0x02;
        /// Render target carries a depth buffer
        const DEPTH_BUFFER = 0x04;
        /// Color attachment can be sampled
        const BINDABLE_COLOR_BUFFER = 0x08;
        /// Depth attachment can be sampled
        const BINDABLE_DEPTH_BUFFER = 0x10;
    }
}

/// Sampler state of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_x: Address,
    pub address_y: Address,
    /// 0 uses the device default
    pub max_anisotropy: u32,
}

/// Clear state of a texture or render target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearState {
    pub clear_color_buffer: bool,
    pub clear_depth_buffer: bool,
    pub clear_color: Color,
    pub clear_depth: f32,
}

impl Default for ClearState {
    fn default() -> Self {
        Self {
            clear_color_buffer: true,
            clear_depth_buffer: false,
            clear_color: Color::BLACK,
            clear_depth: 1.0,
        }
    }
}

// ===== BUFFER ENUMS =====

/// What a buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Index,
    Vertex,
}

bitflags! {
    /// Buffer creation flags (no flags = immutable)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// Data may be replaced after creation
        const DYNAMIC = 0x01;
    }
}

/// Index element width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

// ===== RENDER TARGET FLAGS =====

bitflags! {
    /// Render target creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderTargetFlags: u32 {
        const COLOR_BUFFER = 0x01;
        const DEPTH_BUFFER = 0x02;
        const BINDABLE_COLOR_BUFFER = 0x04;
        const BINDABLE_DEPTH_BUFFER = 0x08;
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
