/// Renderer configuration

use glam::UVec2;

use crate::error::{Error, Result};
use crate::renderer::types::Filter;

/// Native API selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Driver {
    /// Best registered driver: Vulkan when available, otherwise Empty
    #[default]
    Default,
    /// Recording device with no native API behind it
    Empty,
    Vulkan,
    OpenGl,
    Direct3D11,
}

/// Settings used to create a renderer and its device
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub driver: Driver,
    /// Initial backbuffer size in pixels
    pub size: UVec2,
    /// Backbuffer sample count
    pub sample_count: u32,
    /// Filter used by textures whose filter is `Filter::Default`
    pub texture_filter: Filter,
    /// Anisotropy used by textures whose max anisotropy is 0
    pub max_anisotropy: u32,
    pub vertical_sync: bool,
    /// Give the backbuffer a depth attachment
    pub depth: bool,
    /// Enable native validation where the driver supports it
    pub debug_renderer: bool,
    pub app_name: String,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            driver: Driver::Default,
            size: UVec2::new(800, 600),
            sample_count: 1,
            texture_filter: Filter::Point,
            max_anisotropy: 1,
            vertical_sync: true,
            depth: false,
            debug_renderer: false,
            app_name: "Kestrel Application".to_string(),
        }
    }
}

impl RendererSettings {
    /// Check values before any device is created
    pub fn validate(&self) -> Result<()> {
        if self.size.x == 0 || self.size.y == 0 {
            return Err(Error::InvalidArgument(format!(
                "Backbuffer size {}x{} is empty",
                self.size.x, self.size.y
            )));
        }
        if self.sample_count == 0 || !self.sample_count.is_power_of_two() {
            return Err(Error::InvalidArgument(format!(
                "Invalid sample count {}",
                self.sample_count
            )));
        }
        if self.max_anisotropy == 0 {
            return Err(Error::InvalidArgument(
                "Max anisotropy must be at least 1".to_string(),
            ));
        }
        if self.texture_filter == Filter::Default {
            return Err(Error::InvalidArgument(
                "Device texture filter cannot itself be Default".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(RendererSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let zero = RendererSettings { size: UVec2::new(0, 600), ..Default::default() };
        assert!(zero.validate().unwrap_err().is_configuration());

        let samples = RendererSettings { sample_count: 3, ..Default::default() };
        assert!(samples.validate().is_err());

        let anisotropy = RendererSettings { max_anisotropy: 0, ..Default::default() };
        assert!(anisotropy.validate().is_err());

        let filter = RendererSettings { texture_filter: Filter::Default, ..Default::default() };
        assert!(filter.validate().is_err());
    }
}
