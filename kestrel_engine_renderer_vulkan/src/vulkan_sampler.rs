/// SamplerCache - VkSampler objects shared between textures
///
/// Samplers are keyed by their resolved description. A handful of distinct
/// combinations covers a typical frame, so they are never evicted before
/// `clear()`.

use ash::vk;
use kestrel_engine::kestrel::render::ResolvedSampler;
use kestrel_engine::kestrel::Result;
use rustc_hash::FxHashMap;

use crate::vulkan_format::{address_to_vk, filter_to_vk, vk_error};

pub(crate) struct SamplerCache {
    device: ash::Device,
    cache: FxHashMap<ResolvedSampler, vk::Sampler>,
    /// Anisotropy is only enabled when the device feature is on
    anisotropy_supported: bool,
}

impl SamplerCache {
    pub(crate) fn new(device: ash::Device, anisotropy_supported: bool) -> Self {
        Self {
            device,
            cache: FxHashMap::default(),
            anisotropy_supported,
        }
    }

    /// Get or create the VkSampler for `sampler`
    pub(crate) fn get(&mut self, sampler: &ResolvedSampler) -> Result<vk::Sampler> {
        if let Some(&native) = self.cache.get(sampler) {
            return Ok(native);
        }

        let native = self.create(sampler)?;
        self.cache.insert(*sampler, native);
        Ok(native)
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    /// Destroy every cached sampler
    pub(crate) fn clear(&mut self) {
        for (_, sampler) in self.cache.drain() {
            unsafe { self.device.destroy_sampler(sampler, None) };
        }
    }

    fn create(&self, sampler: &ResolvedSampler) -> Result<vk::Sampler> {
        let (min, mag, mipmap) = filter_to_vk(sampler.filter);
        let anisotropy = self.anisotropy_supported && sampler.max_anisotropy > 1;

        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(mag)
            .min_filter(min)
            .mipmap_mode(mipmap)
            .address_mode_u(address_to_vk(sampler.address_x))
            .address_mode_v(address_to_vk(sampler.address_y))
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { sampler.max_anisotropy as f32 } else { 1.0 })
            .unnormalized_coordinates(false);

        unsafe { self.device.create_sampler(&create_info, None) }
            .map_err(|e| vk_error(e, "Failed to create sampler"))
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        self.clear();
    }
}
