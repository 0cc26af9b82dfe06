//! Light descriptors.
//!
//! Lights are plain values. The scene owns them and submits copies to the
//! [`LightStack`](crate::renderer::LightStack) every frame. Each kind knows
//! which of its fields feed expensive derived data and hashes only those.

use glam::{Vec2, Vec3};

use crate::renderer::device::TextureId;
use crate::utils::{Checksum, ChecksumBuilder};

/// Default directional intensity in lux.
pub const DEFAULT_DIRECTIONAL_INTENSITY: f32 = 110_000.0;
/// Default skylight intensity in cd/m².
pub const DEFAULT_SKYLIGHT_INTENSITY: f32 = 30_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction from a surface point towards the light.
    pub direction: Vec3,
    pub color: Vec3,
    /// Illuminance in lux.
    pub intensity: f32,
    pub cast_shadows: bool,
    /// Drives the sun of an atmosphere light when one is present.
    pub contribute_to_atmosphere: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::Y,
            color: Vec3::ONE,
            intensity: DEFAULT_DIRECTIONAL_INTENSITY,
            cast_shadows: false,
            contribute_to_atmosphere: false,
        }
    }
}

impl DirectionalLight {
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        ChecksumBuilder::new(b"directional")
            .pod(b"direction", &self.direction)
            .pod(b"color", &self.color)
            .f32(b"intensity", self.intensity)
            .bool(b"cast_shadows", self.cast_shadows)
            .bool(b"contribute_to_atmosphere", self.contribute_to_atmosphere)
            .finish()
    }
}

/// Image based environment light.
#[derive(Debug, Clone, PartialEq)]
pub struct Skylight {
    /// Equirectangular HDR source, used when `use_texture` is set.
    pub hdr_texture: Option<TextureId>,
    /// Luminance in cd/m². Only scales the final lookup.
    pub intensity: f32,
    /// Build from `hdr_texture` instead of capturing the atmosphere.
    pub use_texture: bool,
    /// Recapture on every consolidation tick.
    pub dynamic: bool,
    /// Local skylights never become the global one.
    pub local: bool,
}

impl Default for Skylight {
    fn default() -> Self {
        Self {
            hdr_texture: None,
            intensity: DEFAULT_SKYLIGHT_INTENSITY,
            use_texture: false,
            dynamic: false,
            local: false,
        }
    }
}

impl Skylight {
    /// Intensity is left out, changing it does not touch the cubemaps.
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        ChecksumBuilder::new(b"skylight")
            .u32(b"hdr_texture", self.hdr_texture.unwrap_or_default().raw())
            .bool(b"use_texture", self.use_texture)
            .bool(b"dynamic", self.dynamic)
            .bool(b"local", self.local)
            .finish()
    }
}

/// Physically based sky from Rayleigh and Mie scattering.
#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphereLight {
    pub intensity_multiplier: f32,
    /// Samples along the view ray.
    pub scatter_points: u32,
    /// Samples along each light ray.
    pub scatter_points_second_ray: u32,
    pub rayleigh_scattering_coefficients: Vec3,
    pub mie_scattering_coefficient: f32,
    /// Scale heights for Rayleigh (x) and Mie (y) density.
    pub density_multiplier: Vec2,
    pub ground_radius: f32,
    pub atmosphere_radius: f32,
    pub view_height: f32,
    pub mie_preferred_scattering_dir: f32,
}

impl Default for AtmosphereLight {
    fn default() -> Self {
        Self {
            intensity_multiplier: 1.0,
            scatter_points: 32,
            scatter_points_second_ray: 8,
            rayleigh_scattering_coefficients: Vec3::new(5.8e-6, 13.5e-6, 33.1e-6),
            mie_scattering_coefficient: 21e-6,
            density_multiplier: Vec2::new(8e3, 1.2e3),
            ground_radius: 6360e3,
            atmosphere_radius: 6420e3,
            view_height: 1e3,
            mie_preferred_scattering_dir: 0.758,
        }
    }
}

impl AtmosphereLight {
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        ChecksumBuilder::new(b"atmosphere")
            .f32(b"intensity_multiplier", self.intensity_multiplier)
            .u32(b"scatter_points", self.scatter_points)
            .u32(b"scatter_points_second_ray", self.scatter_points_second_ray)
            .pod(b"rayleigh", &self.rayleigh_scattering_coefficients)
            .f32(b"mie", self.mie_scattering_coefficient)
            .pod(b"density_multiplier", &self.density_multiplier)
            .f32(b"ground_radius", self.ground_radius)
            .f32(b"atmosphere_radius", self.atmosphere_radius)
            .f32(b"view_height", self.view_height)
            .f32(b"mie_dir", self.mie_preferred_scattering_dir)
            .finish()
    }
}

/// Light kinds as submitted to the light stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    Directional(DirectionalLight),
    Skylight(Skylight),
    Atmosphere(AtmosphereLight),
}

impl Light {
    #[must_use]
    pub fn new_directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self::Directional(DirectionalLight {
            direction,
            color,
            intensity,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn new_skylight(intensity: f32) -> Self {
        Self::Skylight(Skylight {
            intensity,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn new_skylight_from_texture(hdr_texture: TextureId, intensity: f32) -> Self {
        Self::Skylight(Skylight {
            hdr_texture: hdr_texture.non_null(),
            intensity,
            use_texture: true,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn new_atmosphere() -> Self {
        Self::Atmosphere(AtmosphereLight::default())
    }

    #[must_use]
    pub fn checksum(&self) -> Checksum {
        match self {
            Self::Directional(l) => l.checksum(),
            Self::Skylight(l) => l.checksum(),
            Self::Atmosphere(l) => l.checksum(),
        }
    }

    #[must_use]
    pub fn as_directional(&self) -> Option<&DirectionalLight> {
        match self {
            Self::Directional(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_directional_mut(&mut self) -> Option<&mut DirectionalLight> {
        match self {
            Self::Directional(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_skylight(&self) -> Option<&Skylight> {
        match self {
            Self::Skylight(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_skylight_mut(&mut self) -> Option<&mut Skylight> {
        match self {
            Self::Skylight(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_atmosphere(&self) -> Option<&AtmosphereLight> {
        match self {
            Self::Atmosphere(l) => Some(l),
            _ => None,
        }
    }
}

impl From<DirectionalLight> for Light {
    fn from(light: DirectionalLight) -> Self {
        Self::Directional(light)
    }
}

impl From<Skylight> for Light {
    fn from(light: Skylight) -> Self {
        Self::Skylight(light)
    }
}

impl From<AtmosphereLight> for Light {
    fn from(light: AtmosphereLight) -> Self {
        Self::Atmosphere(light)
    }
}
