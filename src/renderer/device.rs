//! Graphics Device Interface
//!
//! The light cache and its builders talk to the GPU through the
//! [`GraphicsDevice`] trait only. Textures, programs and buffers are referred
//! to by small `Copy` ids so they can live inside plain-old-data cache
//! payloads.
//!
//! [`HeadlessDevice`] implements the trait without a GPU. It tracks resource
//! lifetimes and records every command, which is what the tests inspect.

use smallvec::SmallVec;

use crate::core::{FreelistId, PackedFreelist};
use crate::errors::{LanternError, Result};

// ─── Resource Ids ─────────────────────────────────────────────────────────────

macro_rules! device_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
        pub struct $name(u32);

        impl $name {
            /// Id that never names a live resource.
            pub const NULL: Self = Self(0);

            #[inline]
            #[must_use]
            pub fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            #[must_use]
            pub fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            /// `None` for [`Self::NULL`].
            #[inline]
            #[must_use]
            pub fn non_null(self) -> Option<Self> {
                (!self.is_null()).then_some(self)
            }
        }
    };
}

device_id!(
    /// Handle of a device texture.
    TextureId
);
device_id!(
    /// Handle of a compiled compute program.
    ProgramId
);
device_id!(
    /// Handle of a device buffer.
    BufferId
);

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// Number of mip levels of a full chain down to 1×1.
#[must_use]
pub fn calculate_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Descriptor for a texture created through [`GraphicsDevice::create_texture`].
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// 6 for cubemaps.
    pub layers: u32,
    pub mip_level_count: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub dimension: wgpu::TextureViewDimension,
}

impl TextureDesc {
    /// Square cubemap usable as storage image and sampled texture.
    #[must_use]
    pub fn cubemap(label: &'static str, size: u32, mip_level_count: u32) -> Self {
        Self {
            label,
            width: size,
            height: size,
            layers: 6,
            mip_level_count,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            dimension: wgpu::TextureViewDimension::Cube,
        }
    }

    /// Single-level 2D texture.
    #[must_use]
    pub fn texture_2d(label: &'static str, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            width,
            height,
            layers: 1,
            mip_level_count: 1,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            dimension: wgpu::TextureViewDimension::D2,
        }
    }

    #[must_use]
    pub fn is_cubemap(&self) -> bool {
        self.dimension == wgpu::TextureViewDimension::Cube
    }
}

/// The compute kernels the light builders dispatch.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ComputeKernel {
    /// Equirectangular HDR image to cubemap.
    EquirectToCubemap,
    /// Sky cubemap from atmospheric scattering parameters.
    AtmosphericScattering,
    /// Resamples a source cubemap into a skylight cubemap.
    CubemapCapture,
    /// Diffuse irradiance convolution.
    IrradianceMap,
    /// Specular prefilter, one dispatch per roughness mip.
    SpecularPrefilter,
    /// Split-sum BRDF integration lookup table.
    BrdfIntegration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputeProgramDesc {
    pub label: &'static str,
    pub kernel: ComputeKernel,
}

/// A storage image bound for writing or reading in a dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBinding {
    pub binding: u32,
    pub texture: TextureId,
    pub mip_level: u32,
    pub access: wgpu::StorageTextureAccess,
}

/// One compute dispatch with everything bound to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputeDispatch {
    pub program: ProgramId,
    /// Sampled textures as `(binding, texture)`.
    pub textures: SmallVec<[(u32, TextureId); 2]>,
    pub images: SmallVec<[ImageBinding; 2]>,
    /// Raw uniform bytes, laid out by the caller.
    pub uniforms: Vec<u8>,
    pub workgroups: [u32; 3],
}

impl ComputeDispatch {
    #[must_use]
    pub fn new(program: ProgramId, workgroups: [u32; 3]) -> Self {
        Self {
            program,
            textures: SmallVec::new(),
            images: SmallVec::new(),
            uniforms: Vec::new(),
            workgroups,
        }
    }

    #[must_use]
    pub fn with_texture(mut self, binding: u32, texture: TextureId) -> Self {
        self.textures.push((binding, texture));
        self
    }

    #[must_use]
    pub fn with_image(
        mut self,
        binding: u32,
        texture: TextureId,
        mip_level: u32,
        access: wgpu::StorageTextureAccess,
    ) -> Self {
        self.images.push(ImageBinding {
            binding,
            texture,
            mip_level,
            access,
        });
        self
    }

    #[must_use]
    pub fn with_uniforms<T: bytemuck::Pod>(mut self, value: &T) -> Self {
        self.uniforms.extend_from_slice(bytemuck::bytes_of(value));
        self
    }
}

/// Synchronisation point between dependent GPU work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryBarrier {
    /// Storage image writes become visible to later image accesses.
    ShaderImageAccess,
    /// Storage image writes become visible to texture fetches.
    TextureFetch,
}

// ─── Device Trait ─────────────────────────────────────────────────────────────

/// Minimal device surface used by the light cache.
///
/// Calls look synchronous. The device guarantees GPU work enqueued before a
/// [`MemoryBarrier`] completes before dependent work after it.
pub trait GraphicsDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    /// Releases a texture. Releasing [`TextureId::NULL`] is a no-op.
    fn release_texture(&mut self, texture: TextureId);

    fn create_compute_program(&mut self, desc: &ComputeProgramDesc) -> Result<ProgramId>;

    fn create_buffer(&mut self, label: &'static str, size: u64, usage: wgpu::BufferUsages) -> Result<BufferId>;

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    fn dispatch(&mut self, dispatch: &ComputeDispatch);

    fn generate_mipmaps(&mut self, texture: TextureId);

    fn barrier(&mut self, barrier: MemoryBarrier);
}

// ─── Headless Device ──────────────────────────────────────────────────────────

/// Command recorded by [`HeadlessDevice`].
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateTexture { texture: TextureId, label: &'static str },
    ReleaseTexture(TextureId),
    CreateProgram { program: ProgramId, kernel: ComputeKernel },
    CreateBuffer { buffer: BufferId, label: &'static str },
    WriteBuffer { buffer: BufferId, offset: u64, len: usize },
    Dispatch(ComputeDispatch),
    GenerateMipmaps(TextureId),
    Barrier(MemoryBarrier),
}

struct HeadlessBuffer {
    label: &'static str,
    data: Vec<u8>,
}

/// [`GraphicsDevice`] without a GPU.
pub struct HeadlessDevice {
    textures: PackedFreelist<TextureDesc>,
    programs: Vec<ComputeProgramDesc>,
    buffers: Vec<HeadlessBuffer>,
    commands: Vec<DeviceCommand>,
    fail_textures: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl HeadlessDevice {
    /// Creates a device that can hold `max_textures` live textures.
    #[must_use]
    pub fn new(max_textures: usize) -> Self {
        Self {
            textures: PackedFreelist::new(max_textures),
            programs: Vec::new(),
            buffers: Vec::new(),
            commands: Vec::new(),
            fail_textures: false,
        }
    }

    /// Makes every following texture creation fail.
    pub fn set_fail_textures(&mut self, fail: bool) {
        self.fail_textures = fail;
    }

    /// Everything recorded since creation or the last [`Self::clear_commands`].
    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    #[must_use]
    pub fn texture(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(FreelistId::from_bits(texture.raw()))
    }

    #[must_use]
    pub fn is_texture_alive(&self, texture: TextureId) -> bool {
        self.texture(texture).is_some()
    }

    #[must_use]
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Recorded dispatches of `kernel`.
    #[must_use]
    pub fn dispatch_count(&self, kernel: ComputeKernel) -> usize {
        self.commands
            .iter()
            .filter(|cmd| match cmd {
                DeviceCommand::Dispatch(d) => self.kernel_of(d.program) == Some(kernel),
                _ => false,
            })
            .count()
    }

    #[must_use]
    pub fn kernel_of(&self, program: ProgramId) -> Option<ComputeKernel> {
        let index = program.raw().checked_sub(1)? as usize;
        self.programs.get(index).map(|desc| desc.kernel)
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        let index = buffer.raw().checked_sub(1)? as usize;
        self.buffers.get(index).map(|b| b.data.as_slice())
    }

    #[must_use]
    pub fn buffer_label(&self, buffer: BufferId) -> Option<&'static str> {
        let index = buffer.raw().checked_sub(1)? as usize;
        self.buffers.get(index).map(|b| b.label)
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId> {
        if self.fail_textures {
            return Err(LanternError::TextureCreateFailed {
                label: desc.label.to_string(),
                reason: "texture creation disabled".to_string(),
            });
        }
        if desc.width == 0 || desc.height == 0 || desc.mip_level_count == 0 {
            return Err(LanternError::TextureCreateFailed {
                label: desc.label.to_string(),
                reason: format!(
                    "invalid extent {}x{} with {} mips",
                    desc.width, desc.height, desc.mip_level_count
                ),
            });
        }
        if desc.mip_level_count > calculate_mip_count(desc.width, desc.height) {
            return Err(LanternError::TextureCreateFailed {
                label: desc.label.to_string(),
                reason: format!("{} mips exceed the full chain", desc.mip_level_count),
            });
        }
        if self.textures.len() == self.textures.capacity() {
            return Err(LanternError::DeviceCapacityExceeded("textures"));
        }

        let texture = TextureId::from_raw(self.textures.insert(desc.clone()).to_bits());
        self.commands.push(DeviceCommand::CreateTexture {
            texture,
            label: desc.label,
        });
        Ok(texture)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if texture.is_null() {
            return;
        }
        let id = FreelistId::from_bits(texture.raw());
        if self.textures.contains(id) {
            self.textures.erase(id);
            self.commands.push(DeviceCommand::ReleaseTexture(texture));
        } else {
            log::warn!("Releasing unknown texture {texture:?}");
        }
    }

    fn create_compute_program(&mut self, desc: &ComputeProgramDesc) -> Result<ProgramId> {
        self.programs.push(desc.clone());
        let program = ProgramId::from_raw(self.programs.len() as u32);
        self.commands.push(DeviceCommand::CreateProgram {
            program,
            kernel: desc.kernel,
        });
        Ok(program)
    }

    fn create_buffer(&mut self, label: &'static str, size: u64, usage: wgpu::BufferUsages) -> Result<BufferId> {
        if size == 0 || usage.is_empty() {
            return Err(LanternError::BufferCreateFailed {
                label: label.to_string(),
                reason: format!("size {size} with usage {usage:?}"),
            });
        }
        self.buffers.push(HeadlessBuffer {
            label,
            data: vec![0; size as usize],
        });
        let buffer = BufferId::from_raw(self.buffers.len() as u32);
        self.commands.push(DeviceCommand::CreateBuffer { buffer, label });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(index) = buffer.raw().checked_sub(1) else {
            log::warn!("Write to null buffer ignored");
            return;
        };
        let Some(target) = self.buffers.get_mut(index as usize) else {
            log::warn!("Write to unknown buffer {buffer:?} ignored");
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= target.data.len(),
            "Buffer '{}' write out of bounds: {end} > {}",
            target.label,
            target.data.len()
        );
        target.data[start..end].copy_from_slice(data);
        self.commands.push(DeviceCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch) {
        self.commands.push(DeviceCommand::Dispatch(dispatch.clone()));
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.commands.push(DeviceCommand::GenerateMipmaps(texture));
    }

    fn barrier(&mut self, barrier: MemoryBarrier) {
        self.commands.push(DeviceCommand::Barrier(barrier));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_count() {
        assert_eq!(calculate_mip_count(1, 1), 1);
        assert_eq!(calculate_mip_count(256, 256), 9);
        assert_eq!(calculate_mip_count(1024, 512), 11);
        assert_eq!(calculate_mip_count(0, 0), 1);
    }

    #[test]
    fn test_released_texture_is_dead() {
        let mut device = HeadlessDevice::new(4);
        let tex = device
            .create_texture(&TextureDesc::cubemap("sky", 64, 1))
            .unwrap();
        assert!(!tex.is_null());
        assert!(device.is_texture_alive(tex));

        device.release_texture(tex);
        assert!(!device.is_texture_alive(tex));
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_texture_capacity_is_an_error() {
        let mut device = HeadlessDevice::new(1);
        let desc = TextureDesc::texture_2d("lut", 8, 8, wgpu::TextureFormat::Rgba16Float);
        device.create_texture(&desc).unwrap();
        assert!(matches!(
            device.create_texture(&desc),
            Err(LanternError::DeviceCapacityExceeded("textures"))
        ));
    }
}
