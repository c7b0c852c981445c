/// Mip chain helpers
///
/// Lower levels of byte-normalized formats are produced with a 2x2 box
/// filter. Odd edges reuse the last row/column.

use glam::UVec2;

use crate::renderer::pixel_format::PixelFormat;
use crate::renderer::texture::Level;

/// Number of levels in a full chain down to 1x1
pub fn full_chain_length(size: UVec2) -> u32 {
    let largest = size.x.max(size.y).max(1);
    32 - largest.leading_zeros()
}

/// Size of mip level `level` for a base size
pub fn level_size(base: UVec2, level: u32) -> UVec2 {
    UVec2::new((base.x >> level).max(1), (base.y >> level).max(1))
}

/// Resolve a requested level count (0 = full chain) against the base size
pub fn resolve_level_count(base: UVec2, requested: u32) -> u32 {
    let full = full_chain_length(base);
    if requested == 0 {
        full
    } else {
        requested.min(full)
    }
}

/// Downsample `source` into the next level
///
/// Returns `None` for formats whose channels cannot be averaged bytewise.
pub fn downsample(source: &Level, format: PixelFormat) -> Option<Level> {
    if !format.is_byte_normalized() || source.data.is_empty() {
        return None;
    }

    let channels = format.channel_count() as usize;
    let src_w = source.size.x as usize;
    let src_h = source.size.y as usize;
    let size = UVec2::new((source.size.x / 2).max(1), (source.size.y / 2).max(1));
    let dst_w = size.x as usize;
    let dst_h = size.y as usize;
    let pitch = format.row_pitch(size.x);
    let src_pitch = source.pitch as usize;

    let mut data = vec![0u8; pitch as usize * dst_h];

    for y in 0..dst_h {
        let y0 = (y * 2).min(src_h - 1);
        let y1 = (y * 2 + 1).min(src_h - 1);
        for x in 0..dst_w {
            let x0 = (x * 2).min(src_w - 1);
            let x1 = (x * 2 + 1).min(src_w - 1);
            for c in 0..channels {
                let sum = source.data[y0 * src_pitch + x0 * channels + c] as u32
                    + source.data[y0 * src_pitch + x1 * channels + c] as u32
                    + source.data[y1 * src_pitch + x0 * channels + c] as u32
                    + source.data[y1 * src_pitch + x1 * channels + c] as u32;
                data[y * pitch as usize + x * channels + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    Some(Level { size, pitch, data })
}

/// Regenerate levels 1.. from level 0 in place
///
/// Levels that cannot be generated are left with empty payloads.
pub fn regenerate(levels: &mut [Level], format: PixelFormat) {
    for i in 1..levels.len() {
        let (head, tail) = levels.split_at_mut(i);
        match downsample(&head[i - 1], format) {
            Some(level) => tail[0] = level,
            None => tail[0].data.clear(),
        }
    }
}

#[cfg(test)]
#[path = "mipmap_tests.rs"]
mod tests;
