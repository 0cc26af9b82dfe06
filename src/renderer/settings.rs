//! Renderer Settings
//!
//! Configuration for the light cache and the cascaded shadow splitter.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lantern::renderer::settings::{RendererSettings, ShadowSettings};
//!
//! // Defaults: 8 Hz light consolidation, 3 cascades at 2048² updated at 30 Hz
//! let settings = RendererSettings::default();
//!
//! // Two cascades, leaning towards a logarithmic split
//! let settings = RendererSettings {
//!     shadow: ShadowSettings {
//!         cascade_count: 2,
//!         split_lambda: 0.9,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! // Or from JSON, missing fields keep their defaults
//! let settings = RendererSettings::from_json_str(r#"{ "shadow": { "resolution": 4096 } }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LanternError, Result};

/// Upper bound of shadow cascades per directional light.
pub const MAX_SHADOW_CASCADES: usize = 4;

// ---------------------------------------------------------------------------
// LightSettings
// ---------------------------------------------------------------------------

/// Configuration of the [`LightStack`](crate::renderer::LightStack).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// Consolidation ticks per second, independent of the frame rate.
    pub update_rate_hz: f32,
    /// Size in bytes of the arena backing cached render data.
    ///
    /// Exhausting the arena is fatal. Size it for the worst case scene.
    pub arena_size: usize,
    /// Edge length of the BRDF integration lookup texture.
    pub brdf_lut_size: u32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            update_rate_hz: 8.0,
            arena_size: 512 * 1024,
            brdf_lut_size: 256,
        }
    }
}

impl LightSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.update_rate_hz.is_finite() && self.update_rate_hz > 0.0) {
            return Err(LanternError::InvalidSettings(format!(
                "light update rate must be positive, got {}",
                self.update_rate_hz
            )));
        }
        if self.arena_size == 0 {
            return Err(LanternError::InvalidSettings(
                "light arena size must not be 0".to_string(),
            ));
        }
        if self.brdf_lut_size == 0 || self.brdf_lut_size % 8 != 0 {
            return Err(LanternError::InvalidSettings(format!(
                "BRDF LUT size must be a non-zero multiple of 8, got {}",
                self.brdf_lut_size
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ShadowSettings
// ---------------------------------------------------------------------------

/// Configuration of the [`CascadeSplitter`](crate::renderer::shadow::CascadeSplitter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Edge length of each cascade's shadow map. Must be even.
    pub resolution: u32,
    /// Number of cascades, `1..=4`.
    pub cascade_count: u32,
    /// Blend between uniform (`0`) and logarithmic (`1`) splits, exclusive.
    pub split_lambda: f32,
    /// Extra distance the light-space eye is pulled back by.
    pub offset: f32,
    /// World-space overlap between neighbouring cascades.
    pub interpolation_range: f32,
    /// Maximum penumbra width in texels, exclusive range `(1, 32)`.
    pub max_penumbra: f32,
    /// Cascade recomputations per second.
    pub update_rate_hz: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            resolution: 2048,
            cascade_count: 3,
            split_lambda: 0.65,
            offset: 0.0,
            interpolation_range: 0.5,
            max_penumbra: 3.0,
            update_rate_hz: 30.0,
        }
    }
}

impl ShadowSettings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(LanternError::InvalidSettings(msg));

        if self.resolution == 0 || self.resolution % 2 != 0 {
            return invalid(format!(
                "shadow resolution must be even and non-zero, got {}",
                self.resolution
            ));
        }
        if !(1..=MAX_SHADOW_CASCADES as u32).contains(&self.cascade_count) {
            return invalid(format!(
                "cascade count must be in 1..={MAX_SHADOW_CASCADES}, got {}",
                self.cascade_count
            ));
        }
        if !(self.split_lambda > 0.0 && self.split_lambda < 1.0) {
            return invalid(format!(
                "split lambda must be in (0, 1), got {}",
                self.split_lambda
            ));
        }
        if !(self.max_penumbra > 1.0 && self.max_penumbra < 32.0) {
            return invalid(format!(
                "max penumbra must be in (1, 32), got {}",
                self.max_penumbra
            ));
        }
        if !(self.interpolation_range >= 0.0 && self.interpolation_range.is_finite()) {
            return invalid(format!(
                "cascade interpolation range must be >= 0, got {}",
                self.interpolation_range
            ));
        }
        if !self.offset.is_finite() {
            return invalid(format!("shadow offset must be finite, got {}", self.offset));
        }
        if !(self.update_rate_hz.is_finite() && self.update_rate_hz > 0.0) {
            return invalid(format!(
                "shadow update rate must be positive, got {}",
                self.update_rate_hz
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RendererSettings
// ---------------------------------------------------------------------------

/// Top-level renderer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub light: LightSettings,
    pub shadow: ShadowSettings,
}

impl RendererSettings {
    /// Parses settings from JSON and validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.light.validate()?;
        self.shadow.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        RendererSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            RendererSettings::from_json_str(r#"{ "shadow": { "cascade_count": 2 } }"#).unwrap();
        assert_eq!(settings.shadow.cascade_count, 2);
        assert_eq!(settings.shadow.resolution, 2048);
        assert_eq!(settings.light, LightSettings::default());
    }

    #[test]
    fn test_json_round_trip() {
        let settings = RendererSettings::default();
        let json = settings.to_json_string().unwrap();
        assert_eq!(RendererSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let odd = ShadowSettings {
            resolution: 1023,
            ..Default::default()
        };
        assert!(odd.validate().is_err());

        let five = ShadowSettings {
            cascade_count: 5,
            ..Default::default()
        };
        assert!(five.validate().is_err());

        let lambda = ShadowSettings {
            split_lambda: 1.0,
            ..Default::default()
        };
        assert!(lambda.validate().is_err());

        let err = RendererSettings::from_json_str(r#"{ "shadow": { "max_penumbra": 40.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, LanternError::InvalidSettings(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = RendererSettings::from_json_str("{ shadow").unwrap_err();
        assert!(matches!(err, LanternError::JsonError(_)));
    }
}
