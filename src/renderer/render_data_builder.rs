//! Render Data Builders
//!
//! Builders turn a light descriptor into GPU-ready render data. They run only
//! when the [`LightStack`](super::LightStack) misses its cache or when
//! [`RenderDataBuilder::needs_rebuild`] reports a dependency change that the
//! descriptor checksum cannot see.
//!
//! Payloads are `Pod` so they can live in the light stack's byte arena. They
//! reference GPU resources by [`TextureId`]; [`TextureId::NULL`] means absent.
//!
//! ```text
//! DirectionalLight ──► DirectionalBuilder ──► DirectionalRenderData
//!        │ sun
//!        ▼
//! AtmosphereLight ───► AtmosphereBuilder ───► AtmosphereRenderData (sky cubemap)
//!        │ cubemap influence
//!        ▼
//! Skylight ──────────► SkylightBuilder ─────► SkylightRenderData (IBL cubemaps)
//! ```

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::device::{
    ComputeDispatch, ComputeKernel, ComputeProgramDesc, GraphicsDevice, MemoryBarrier, ProgramId,
    TextureDesc, TextureId, calculate_mip_count,
};
use crate::scene::light::{AtmosphereLight, DirectionalLight, Skylight};
use crate::utils::Checksum;

/// Edge length of the sky cubemap produced by the atmosphere builder.
pub const ATMOSPHERE_CUBEMAP_SIZE: u32 = 256;
/// Edge length of a skylight's base cubemap.
pub const GLOBAL_CUBEMAP_SIZE: u32 = 1024;
/// Edge length of the diffuse irradiance cubemap.
pub const IRRADIANCE_MAP_SIZE: u32 = 64;
/// Edge length of mip 0 of the specular prefilter cubemap.
pub const SPECULAR_CONVOLUTION_MAP_SIZE: u32 = 1024;

/// Local workgroup edge of the cubemap kernels.
const CUBEMAP_GROUP_SIZE: u32 = 32;
/// Local workgroup edge of the atmosphere kernel.
const ATMOSPHERE_GROUP_SIZE: u32 = 8;

/// Builds render data of type [`RenderDataBuilder::Data`] from a light of
/// type [`RenderDataBuilder::Light`].
pub trait RenderDataBuilder {
    type Light;
    type Data: bytemuck::Pod;

    /// Creates the programs the builder dispatches.
    fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<()>;

    /// `true` when a dependency outside the light's checksum changed since the
    /// last build.
    fn needs_rebuild(&self) -> bool;

    /// Fills `data`. Resources already referenced by `data` are released
    /// first, so `build` can be called again on the same payload.
    fn build(&mut self, device: &mut dyn GraphicsDevice, light: &Self::Light, data: &mut Self::Data);

    /// Releases every resource referenced by `data` and clears it.
    fn release(&mut self, device: &mut dyn GraphicsDevice, data: &mut Self::Data);
}

fn dispatch_groups(size: u32, group: u32) -> u32 {
    (size / group).max(1)
}

// ============================================================================
// Directional
// ============================================================================

/// Cached data of a directional light.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalRenderData {
    /// Normalized direction towards the light.
    pub direction: Vec3,
    pub flags: u32,
    /// `color * intensity`.
    pub radiance: Vec3,
    pub intensity: f32,
}

impl DirectionalRenderData {
    pub const CAST_SHADOWS: u32 = 1;
    pub const CONTRIBUTES_TO_ATMOSPHERE: u32 = 1 << 1;

    #[must_use]
    pub fn cast_shadows(&self) -> bool {
        self.flags & Self::CAST_SHADOWS != 0
    }
}

/// Derives the cheap per-light values of a directional light.
#[derive(Default)]
pub struct DirectionalBuilder;

impl RenderDataBuilder for DirectionalBuilder {
    type Light = DirectionalLight;
    type Data = DirectionalRenderData;

    fn init(&mut self, _device: &mut dyn GraphicsDevice) -> Result<()> {
        Ok(())
    }

    fn needs_rebuild(&self) -> bool {
        false
    }

    fn build(&mut self, _device: &mut dyn GraphicsDevice, light: &DirectionalLight, data: &mut DirectionalRenderData) {
        let mut flags = 0;
        if light.cast_shadows {
            flags |= DirectionalRenderData::CAST_SHADOWS;
        }
        if light.contribute_to_atmosphere {
            flags |= DirectionalRenderData::CONTRIBUTES_TO_ATMOSPHERE;
        }
        *data = DirectionalRenderData {
            direction: light.direction.normalize_or(Vec3::Y),
            flags,
            radiance: light.color * light.intensity,
            intensity: light.intensity,
        };
    }

    fn release(&mut self, _device: &mut dyn GraphicsDevice, data: &mut DirectionalRenderData) {
        *data = DirectionalRenderData::default();
    }
}

// ============================================================================
// Atmosphere
// ============================================================================

/// Cached data of an atmosphere light.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AtmosphereRenderData {
    pub cubemap: TextureId,
    pub sun_valid: u32,
    /// Build counter of the producing builder, `0` before the first build.
    pub revision: u32,
    _pad: u32,
    pub sun_direction: Vec3,
    pub sun_intensity: f32,
}

/// The directional light feeding an atmosphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunInfluence {
    pub direction: Vec3,
    pub intensity: f32,
}

impl From<&DirectionalLight> for SunInfluence {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            direction: light.direction.normalize_or(Vec3::Y),
            intensity: light.intensity,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AtmosphereUniforms {
    sun_direction: Vec3,
    sun_intensity: f32,
    rayleigh_scattering_coefficients: Vec3,
    mie_scattering_coefficient: f32,
    density_multiplier: Vec2,
    ground_radius: f32,
    atmosphere_radius: f32,
    view_height: f32,
    mie_preferred_scattering_dir: f32,
    intensity_multiplier: f32,
    scatter_points: u32,
    scatter_points_second_ray: u32,
    out_size: f32,
    _pad: [u32; 2],
}

/// Renders a sky cubemap from scattering parameters and the current sun.
#[derive(Default)]
pub struct AtmosphereBuilder {
    program: ProgramId,
    sun: Option<SunInfluence>,
    built_sun: Option<SunInfluence>,
    revision: u32,
}

impl AtmosphereBuilder {
    /// Sets the sun used by the next build. `None` renders a sunless sky.
    pub fn set_sun(&mut self, sun: Option<SunInfluence>) {
        self.sun = sun;
    }
}

impl RenderDataBuilder for AtmosphereBuilder {
    type Light = AtmosphereLight;
    type Data = AtmosphereRenderData;

    fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.program = device.create_compute_program(&ComputeProgramDesc {
            label: "atmospheric_scattering_cubemap",
            kernel: ComputeKernel::AtmosphericScattering,
        })?;
        Ok(())
    }

    fn needs_rebuild(&self) -> bool {
        self.sun != self.built_sun
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, light: &AtmosphereLight, data: &mut AtmosphereRenderData) {
        self.release(device, data);
        self.built_sun = self.sun;

        let desc = TextureDesc::cubemap("atmosphere_cubemap", ATMOSPHERE_CUBEMAP_SIZE, 1);
        let cubemap = match device.create_texture(&desc) {
            Ok(texture) => texture,
            Err(e) => {
                log::error!("Atmosphere cubemap creation failed: {e}");
                return;
            }
        };

        let sun = self.sun.unwrap_or(SunInfluence {
            direction: Vec3::Y,
            intensity: 0.0,
        });
        let uniforms = AtmosphereUniforms {
            sun_direction: sun.direction,
            sun_intensity: sun.intensity,
            rayleigh_scattering_coefficients: light.rayleigh_scattering_coefficients,
            mie_scattering_coefficient: light.mie_scattering_coefficient,
            density_multiplier: light.density_multiplier,
            ground_radius: light.ground_radius,
            atmosphere_radius: light.atmosphere_radius,
            view_height: light.view_height,
            mie_preferred_scattering_dir: light.mie_preferred_scattering_dir,
            intensity_multiplier: light.intensity_multiplier,
            scatter_points: light.scatter_points,
            scatter_points_second_ray: light.scatter_points_second_ray,
            out_size: ATMOSPHERE_CUBEMAP_SIZE as f32,
            _pad: [0; 2],
        };

        let groups = dispatch_groups(ATMOSPHERE_CUBEMAP_SIZE, ATMOSPHERE_GROUP_SIZE);
        device.dispatch(
            &ComputeDispatch::new(self.program, [groups, groups, 6])
                .with_image(0, cubemap, 0, wgpu::StorageTextureAccess::WriteOnly)
                .with_uniforms(&uniforms),
        );
        device.barrier(MemoryBarrier::TextureFetch);

        // skips 0 on wrap
        self.revision = self.revision.wrapping_add(1).max(1);
        *data = AtmosphereRenderData {
            cubemap,
            sun_valid: u32::from(self.sun.is_some()),
            revision: self.revision,
            _pad: 0,
            sun_direction: sun.direction,
            sun_intensity: sun.intensity,
        };
        log::debug!("Atmosphere cubemap built (sun: {:?})", self.sun);
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice, data: &mut AtmosphereRenderData) {
        device.release_texture(data.cubemap);
        *data = AtmosphereRenderData::default();
    }
}

// ============================================================================
// Skylight
// ============================================================================

/// Cached image based lighting maps of a skylight.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkylightRenderData {
    pub cubemap: TextureId,
    pub irradiance_cubemap: TextureId,
    pub specular_prefiltered_cubemap: TextureId,
    _pad: u32,
}

impl SkylightRenderData {
    /// All three maps exist.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cubemap.is_null()
            && !self.irradiance_cubemap.is_null()
            && !self.specular_prefiltered_cubemap.is_null()
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CubemapUniforms {
    out_size: Vec2,
    roughness: f32,
    _pad: f32,
}

impl CubemapUniforms {
    fn new(size: u32, roughness: f32) -> Self {
        Self {
            out_size: Vec2::splat(size as f32),
            roughness,
            _pad: 0.0,
        }
    }
}

/// One atmosphere a captured skylight samples.
///
/// Texture ids can be reused by the device once released, so the cubemap
/// alone does not tell two builds apart. The checksum and the build
/// revision do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtmosphereInfluence {
    pub checksum: Checksum,
    pub revision: u32,
    pub cubemap: TextureId,
}

impl AtmosphereInfluence {
    #[must_use]
    pub fn new(checksum: Checksum, data: &AtmosphereRenderData) -> Self {
        Self {
            checksum,
            revision: data.revision,
            cubemap: data.cubemap,
        }
    }
}

/// Builds the environment cubemap of a skylight and its IBL convolutions.
///
/// The source is either an equirectangular HDR texture or the sky cubemap of
/// the authoritative atmosphere, registered each tick with
/// [`SkylightBuilder::add_atmosphere_influence`].
#[derive(Default)]
pub struct SkylightBuilder {
    equi_to_cubemap: ProgramId,
    capture_cubemap: ProgramId,
    build_irradiance_map: ProgramId,
    build_specular_prefiltered_map: ProgramId,
    old_dependencies: SmallVec<[AtmosphereInfluence; 1]>,
    new_dependencies: SmallVec<[AtmosphereInfluence; 1]>,
}

impl SkylightBuilder {
    /// Forgets the influences registered for the previous tick.
    pub fn begin_tick(&mut self) {
        self.new_dependencies.clear();
    }

    /// Registers an atmosphere the next capture samples. Atmospheres without
    /// a cubemap are ignored.
    pub fn add_atmosphere_influence(&mut self, influence: AtmosphereInfluence) {
        if !influence.cubemap.is_null() {
            self.new_dependencies.push(influence);
        }
    }

    fn create_cubemap(device: &mut dyn GraphicsDevice, label: &'static str, size: u32, mips: u32) -> Option<TextureId> {
        match device.create_texture(&TextureDesc::cubemap(label, size, mips)) {
            Ok(texture) => Some(texture),
            Err(e) => {
                log::error!("Skylight texture creation failed: {e}");
                None
            }
        }
    }

    fn load_from_hdr(&self, device: &mut dyn GraphicsDevice, hdr_texture: TextureId) -> Option<TextureId> {
        let mips = calculate_mip_count(GLOBAL_CUBEMAP_SIZE, GLOBAL_CUBEMAP_SIZE);
        let cubemap = Self::create_cubemap(device, "environment_cubemap", GLOBAL_CUBEMAP_SIZE, mips)?;

        let groups = dispatch_groups(GLOBAL_CUBEMAP_SIZE, CUBEMAP_GROUP_SIZE);
        device.dispatch(
            &ComputeDispatch::new(self.equi_to_cubemap, [groups, groups, 6])
                .with_texture(0, hdr_texture)
                .with_image(1, cubemap, 0, wgpu::StorageTextureAccess::WriteOnly)
                .with_uniforms(&CubemapUniforms::new(GLOBAL_CUBEMAP_SIZE, 0.0)),
        );
        device.generate_mipmaps(cubemap);
        device.barrier(MemoryBarrier::ShaderImageAccess);
        Some(cubemap)
    }

    fn capture(&self, device: &mut dyn GraphicsDevice, source: TextureId) -> Option<TextureId> {
        let mips = calculate_mip_count(GLOBAL_CUBEMAP_SIZE, GLOBAL_CUBEMAP_SIZE);
        let cubemap = Self::create_cubemap(device, "environment_cubemap", GLOBAL_CUBEMAP_SIZE, mips)?;

        let groups = dispatch_groups(GLOBAL_CUBEMAP_SIZE, CUBEMAP_GROUP_SIZE);
        device.dispatch(
            &ComputeDispatch::new(self.capture_cubemap, [groups, groups, 6])
                .with_texture(0, source)
                .with_image(1, cubemap, 0, wgpu::StorageTextureAccess::WriteOnly)
                .with_uniforms(&CubemapUniforms::new(GLOBAL_CUBEMAP_SIZE, 0.0)),
        );
        device.generate_mipmaps(cubemap);
        device.barrier(MemoryBarrier::ShaderImageAccess);
        Some(cubemap)
    }

    fn calculate_ibl_maps(&self, device: &mut dyn GraphicsDevice, data: &mut SkylightRenderData) -> Option<()> {
        let irradiance = Self::create_cubemap(device, "irradiance_cubemap", IRRADIANCE_MAP_SIZE, 1)?;
        data.irradiance_cubemap = irradiance;

        let spec_mips = calculate_mip_count(SPECULAR_CONVOLUTION_MAP_SIZE, SPECULAR_CONVOLUTION_MAP_SIZE);
        let specular = Self::create_cubemap(
            device,
            "specular_prefiltered_cubemap",
            SPECULAR_CONVOLUTION_MAP_SIZE,
            spec_mips,
        )?;
        data.specular_prefiltered_cubemap = specular;

        let groups = dispatch_groups(IRRADIANCE_MAP_SIZE, CUBEMAP_GROUP_SIZE);
        device.dispatch(
            &ComputeDispatch::new(self.build_irradiance_map, [groups, groups, 6])
                .with_texture(0, data.cubemap)
                .with_image(1, irradiance, 0, wgpu::StorageTextureAccess::WriteOnly)
                .with_uniforms(&CubemapUniforms::new(IRRADIANCE_MAP_SIZE, 0.0)),
        );
        device.barrier(MemoryBarrier::ShaderImageAccess);

        for mip in 0..spec_mips {
            let size = SPECULAR_CONVOLUTION_MAP_SIZE >> mip;
            let roughness = mip as f32 / (spec_mips - 1).max(1) as f32;
            let groups = dispatch_groups(size, CUBEMAP_GROUP_SIZE);
            device.dispatch(
                &ComputeDispatch::new(self.build_specular_prefiltered_map, [groups, groups, 6])
                    .with_texture(0, data.cubemap)
                    .with_image(1, specular, mip, wgpu::StorageTextureAccess::WriteOnly)
                    .with_uniforms(&CubemapUniforms::new(size, roughness)),
            );
        }
        device.barrier(MemoryBarrier::TextureFetch);
        Some(())
    }
}

impl RenderDataBuilder for SkylightBuilder {
    type Light = Skylight;
    type Data = SkylightRenderData;

    fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.equi_to_cubemap = device.create_compute_program(&ComputeProgramDesc {
            label: "equi_to_cubemap",
            kernel: ComputeKernel::EquirectToCubemap,
        })?;
        self.capture_cubemap = device.create_compute_program(&ComputeProgramDesc {
            label: "capture_cubemap",
            kernel: ComputeKernel::CubemapCapture,
        })?;
        self.build_irradiance_map = device.create_compute_program(&ComputeProgramDesc {
            label: "irradiance_map",
            kernel: ComputeKernel::IrradianceMap,
        })?;
        self.build_specular_prefiltered_map = device.create_compute_program(&ComputeProgramDesc {
            label: "prefilter_specular_map",
            kernel: ComputeKernel::SpecularPrefilter,
        })?;
        Ok(())
    }

    fn needs_rebuild(&self) -> bool {
        // order matters
        self.old_dependencies != self.new_dependencies
    }

    fn build(&mut self, device: &mut dyn GraphicsDevice, light: &Skylight, data: &mut SkylightRenderData) {
        self.release(device, data);
        self.old_dependencies.clone_from(&self.new_dependencies);

        let cubemap = if light.use_texture {
            let Some(hdr_texture) = light.hdr_texture.filter(|t| !t.is_null()) else {
                log::debug!("Skylight uses a texture but has none, cleared");
                return;
            };
            self.load_from_hdr(device, hdr_texture)
        } else {
            let Some(source) = self.new_dependencies.last().map(|i| i.cubemap) else {
                log::warn!("Skylight capture without an atmosphere, cleared");
                return;
            };
            self.capture(device, source)
        };

        let Some(cubemap) = cubemap else {
            return;
        };
        data.cubemap = cubemap;

        if self.calculate_ibl_maps(device, data).is_none() {
            self.release(device, data);
            return;
        }
        log::debug!("Skylight IBL maps built ({cubemap:?})");
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice, data: &mut SkylightRenderData) {
        device.release_texture(data.cubemap);
        device.release_texture(data.irradiance_cubemap);
        device.release_texture(data.specular_prefiltered_cubemap);
        *data = SkylightRenderData::default();
    }
}
