use serde::{Deserialize, Serialize};

use crate::error::TextureError;

/// Tunable thresholds for the texture pipeline.
///
/// The defaults are calibrated together: the background tolerances assume a
/// single reference sample taken from the top-left pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    /// RGB distance below which a pixel matches the reference color (default: 40)
    pub bg_color_tolerance: f32,
    /// Alpha below which a pixel is background when the reference is transparent (default: 20)
    pub bg_alpha_cutoff: u8,
    /// Per-channel quantization step for color buckets (default: 24)
    pub bucket_step: u8,
    /// Palette size ceiling (default: 4)
    pub max_colors: usize,
    /// Minimum RGB distance between greedily admitted palette colors (default: 45)
    pub min_color_distance: f32,
    /// Margin added around the larger content dimension, in percent (default: 20)
    pub margin_percent: u32,
    /// Largest canvas, in pixels, the pipeline is willing to allocate (default: 64 Mpx)
    pub max_surface_pixels: u64,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            bg_color_tolerance: 40.0,
            bg_alpha_cutoff: 20,
            bucket_step: 24,
            max_colors: 4,
            min_color_distance: 45.0,
            margin_percent: 20,
            max_surface_pixels: 64 * 1024 * 1024,
        }
    }
}

impl TextureSettings {
    /// Parse settings from JSON; missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self, TextureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub(crate) fn bucket_step(&self) -> u16 {
        u16::from(self.bucket_step.max(1))
    }

    pub(crate) fn max_colors(&self) -> usize {
        self.max_colors.max(1)
    }

    /// Side of the square canvas for content of the given dimensions.
    ///
    /// Integer arithmetic keeps `ceil(side * 1.2)` exact for the default margin.
    pub fn square_side(&self, content_width: u32, content_height: u32) -> u64 {
        let larger = u64::from(content_width.max(content_height));
        let scale = 100 + u64::from(self.margin_percent);
        (larger * scale).div_ceil(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_side_default_margin() {
        let settings = TextureSettings::default();
        assert_eq!(settings.square_side(4, 4), 5);
        assert_eq!(settings.square_side(5, 3), 6);
        assert_eq!(settings.square_side(3, 25), 30);
        assert_eq!(settings.square_side(1, 1), 2);
    }

    #[test]
    fn test_square_side_zero_margin() {
        let settings = TextureSettings { margin_percent: 0, ..Default::default() };
        assert_eq!(settings.square_side(7, 3), 7);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = TextureSettings::from_json(r#"{"max_colors": 2}"#).unwrap();
        assert_eq!(settings.max_colors, 2);
        assert_eq!(settings.bucket_step, 24);
        assert_eq!(settings.bg_alpha_cutoff, 20);
    }

    #[test]
    fn test_invalid_json_is_settings_error() {
        let err = TextureSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, TextureError::Settings(_)));
    }

    #[test]
    fn test_degenerate_values_are_clamped() {
        let settings = TextureSettings { bucket_step: 0, max_colors: 0, ..Default::default() };
        assert_eq!(settings.bucket_step(), 1);
        assert_eq!(settings.max_colors(), 1);
    }
}
