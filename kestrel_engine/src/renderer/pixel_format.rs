/// Pixel formats shared by textures and render targets

/// Numeric interpretation of a pixel channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Unorm,
    Snorm,
    Uint,
    Sint,
    Float,
}

/// Pixel format (channel layout, channel width and numeric interpretation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum PixelFormat {
    // Alpha only
    A8_UNORM,

    // One channel
    R8_UNORM,
    R8_SNORM,
    R8_UINT,
    R8_SINT,
    R16_UNORM,
    R16_SNORM,
    R16_UINT,
    R16_SINT,
    R16_FLOAT,
    R32_UINT,
    R32_SINT,
    R32_FLOAT,

    // Two channels
    RG8_UNORM,
    RG8_SNORM,
    RG8_UINT,
    RG8_SINT,

    // Four channels
    RGBA8_UNORM,
    RGBA8_UNORM_SRGB,
    RGBA8_SNORM,
    RGBA8_UINT,
    RGBA8_SINT,
    RGBA16_UNORM,
    RGBA16_SNORM,
    RGBA16_UINT,
    RGBA16_SINT,
    RGBA16_FLOAT,
    RGBA32_UINT,
    RGBA32_SINT,
    RGBA32_FLOAT,

    // Depth
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl PixelFormat {
    /// Every format, in declaration order
    pub const ALL: [PixelFormat; 33] = [
        PixelFormat::A8_UNORM,
        PixelFormat::R8_UNORM,
        PixelFormat::R8_SNORM,
        PixelFormat::R8_UINT,
        PixelFormat::R8_SINT,
        PixelFormat::R16_UNORM,
        PixelFormat::R16_SNORM,
        PixelFormat::R16_UINT,
        PixelFormat::R16_SINT,
        PixelFormat::R16_FLOAT,
        PixelFormat::R32_UINT,
        PixelFormat::R32_SINT,
        PixelFormat::R32_FLOAT,
        PixelFormat::RG8_UNORM,
        PixelFormat::RG8_SNORM,
        PixelFormat::RG8_UINT,
        PixelFormat::RG8_SINT,
        PixelFormat::RGBA8_UNORM,
        PixelFormat::RGBA8_UNORM_SRGB,
        PixelFormat::RGBA8_SNORM,
        PixelFormat::RGBA8_UINT,
        PixelFormat::RGBA8_SINT,
        PixelFormat::RGBA16_UNORM,
        PixelFormat::RGBA16_SNORM,
        PixelFormat::RGBA16_UINT,
        PixelFormat::RGBA16_SINT,
        PixelFormat::RGBA16_FLOAT,
        PixelFormat::RGBA32_UINT,
        PixelFormat::RGBA32_SINT,
        PixelFormat::RGBA32_FLOAT,
        PixelFormat::D16_UNORM,
        PixelFormat::D32_FLOAT,
        PixelFormat::D24_UNORM_S8_UINT,
    ];

    /// Number of channels
    pub fn channel_count(self) -> u32 {
        use PixelFormat::*;
        match self {
            A8_UNORM => 1,
            R8_UNORM | R8_SNORM | R8_UINT | R8_SINT => 1,
            R16_UNORM | R16_SNORM | R16_UINT | R16_SINT | R16_FLOAT => 1,
            R32_UINT | R32_SINT | R32_FLOAT => 1,
            RG8_UNORM | RG8_SNORM | RG8_UINT | RG8_SINT => 2,
            RGBA8_UNORM | RGBA8_UNORM_SRGB | RGBA8_SNORM | RGBA8_UINT | RGBA8_SINT => 4,
            RGBA16_UNORM | RGBA16_SNORM | RGBA16_UINT | RGBA16_SINT | RGBA16_FLOAT => 4,
            RGBA32_UINT | RGBA32_SINT | RGBA32_FLOAT => 4,
            D16_UNORM | D32_FLOAT => 1,
            D24_UNORM_S8_UINT => 2,
        }
    }

    /// Size of one pixel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        use PixelFormat::*;
        match self {
            A8_UNORM | R8_UNORM | R8_SNORM | R8_UINT | R8_SINT => 1,
            R16_UNORM | R16_SNORM | R16_UINT | R16_SINT | R16_FLOAT => 2,
            RG8_UNORM | RG8_SNORM | RG8_UINT | RG8_SINT => 2,
            D16_UNORM => 2,
            R32_UINT | R32_SINT | R32_FLOAT => 4,
            RGBA8_UNORM | RGBA8_UNORM_SRGB | RGBA8_SNORM | RGBA8_UINT | RGBA8_SINT => 4,
            D32_FLOAT | D24_UNORM_S8_UINT => 4,
            RGBA16_UNORM | RGBA16_SNORM | RGBA16_UINT | RGBA16_SINT | RGBA16_FLOAT => 8,
            RGBA32_UINT | RGBA32_SINT | RGBA32_FLOAT => 16,
        }
    }

    /// Numeric interpretation of the (first) channel
    pub fn numeric_kind(self) -> NumericKind {
        use PixelFormat::*;
        match self {
            A8_UNORM | R8_UNORM | R16_UNORM | RG8_UNORM | RGBA8_UNORM | RGBA8_UNORM_SRGB
            | RGBA16_UNORM | D16_UNORM | D24_UNORM_S8_UINT => NumericKind::Unorm,
            R8_SNORM | R16_SNORM | RG8_SNORM | RGBA8_SNORM | RGBA16_SNORM => NumericKind::Snorm,
            R8_UINT | R16_UINT | R32_UINT | RG8_UINT | RGBA8_UINT | RGBA16_UINT
            | RGBA32_UINT => NumericKind::Uint,
            R8_SINT | R16_SINT | R32_SINT | RG8_SINT | RGBA8_SINT | RGBA16_SINT
            | RGBA32_SINT => NumericKind::Sint,
            R16_FLOAT | R32_FLOAT | RGBA16_FLOAT | RGBA32_FLOAT | D32_FLOAT => NumericKind::Float,
        }
    }

    /// True for depth (and depth/stencil) formats
    pub fn is_depth(self) -> bool {
        matches!(self, PixelFormat::D16_UNORM | PixelFormat::D32_FLOAT | PixelFormat::D24_UNORM_S8_UINT)
    }

    /// True for formats whose lower mip levels can be generated by averaging bytes
    pub fn is_byte_normalized(self) -> bool {
        use PixelFormat::*;
        matches!(self, A8_UNORM | R8_UNORM | RG8_UNORM | RGBA8_UNORM | RGBA8_UNORM_SRGB)
    }

    /// Bytes in one row of `width` pixels (tightly packed)
    pub fn row_pitch(self, width: u32) -> u32 {
        width * self.bytes_per_pixel()
    }
}

#[cfg(test)]
#[path = "pixel_format_tests.rs"]
mod tests;
