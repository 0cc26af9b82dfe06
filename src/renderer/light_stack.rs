//! Light Stack
//!
//! Consolidates the lights submitted each frame into one GPU light buffer
//! and caches the expensive render data derived from them.
//!
//! # Frame protocol
//!
//! 1. The scene calls [`LightStack::push`] for every light, every frame.
//!    Submissions are not sticky.
//! 2. [`LightStack::update`] runs once per frame. A [`FixedRateGate`] lets
//!    consolidation through at `LightSettings::update_rate_hz`. Frames that
//!    do not pass the gate only drop their submissions.
//! 3. A consolidation tick marks every cache entry expired, walks the
//!    submissions in the order directional, atmosphere, skylight, unmarks
//!    (or builds) the entry of every light it meets, then sweeps whatever is
//!    still expired back into the arena.
//!
//! Cache entries are keyed by the light's [`Checksum`], so two lights with
//! equal relevant fields share one entry.
//!
//! # Authority
//!
//! Only one light per kind drives the output:
//! - the **last** pushed directional light,
//! - the **last** pushed atmosphere,
//! - the **first** pushed non-local skylight (the global skylight).

use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::allocator::{ArenaBlock, FreeListAllocator};
use crate::renderer::device::{
    BufferId, ComputeDispatch, ComputeKernel, ComputeProgramDesc, GraphicsDevice, MemoryBarrier,
    ProgramId, TextureDesc, TextureId,
};
use crate::renderer::render_data_builder::{
    AtmosphereBuilder, AtmosphereInfluence, AtmosphereRenderData, DirectionalBuilder,
    DirectionalRenderData, RenderDataBuilder, SkylightBuilder, SkylightRenderData, SunInfluence,
};
use crate::renderer::settings::LightSettings;
use crate::scene::light::{AtmosphereLight, DirectionalLight, Light, Skylight};
use crate::utils::{Checksum, FixedRateGate};

// ─── GPU Data ─────────────────────────────────────────────────────────────────

/// The authoritative directional light, std140 layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightData {
    /// Direction towards the light.
    pub direction: Vec3,
    pub intensity: f32,
    pub color: Vec3,
    pub cast_shadows: u32,
    pub valid: u32,
    _pad: [u32; 3],
}

impl DirectionalLightData {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    #[must_use]
    pub fn casts_shadows(&self) -> bool {
        self.cast_shadows != 0
    }
}

/// The global skylight, std140 layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkylightData {
    pub intensity: f32,
    /// Set only when all IBL maps exist.
    pub valid: u32,
    _pad: [u32; 2],
}

impl SkylightData {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }
}

/// Consolidated light data uploaded once per consolidation tick.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightBufferData {
    pub directional_light: DirectionalLightData,
    pub skylight: SkylightData,
}

// ─── Cache ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Atmosphere,
    Skylight,
}

#[derive(Debug)]
struct CacheEntry {
    kind: LightKind,
    block: ArenaBlock,
    expired: bool,
}

/// Counters since creation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LightStackStats {
    /// Ticks that passed the gate.
    pub consolidations: u64,
    pub directional_builds: u64,
    pub atmosphere_builds: u64,
    pub skylight_builds: u64,
    /// Cache entries swept.
    pub evictions: u64,
}

/// Looks up `checksum`, building the entry on a miss or when `force` is set.
///
/// An entry already touched this tick is never rebuilt twice. Returns the
/// payload and whether it was (re)built.
fn touch_or_build<B: RenderDataBuilder>(
    cache: &mut FxHashMap<Checksum, CacheEntry>,
    allocator: &mut FreeListAllocator,
    builder: &mut B,
    device: &mut dyn GraphicsDevice,
    kind: LightKind,
    checksum: Checksum,
    light: &B::Light,
    force: bool,
) -> (B::Data, bool) {
    if let Some(entry) = cache.get_mut(&checksum) {
        let mut data: B::Data = allocator.read(entry.block);
        let rebuild = force && entry.expired;
        entry.expired = false;
        if rebuild {
            builder.build(device, light, &mut data);
            allocator.write(entry.block, &data);
        }
        return (data, rebuild);
    }

    let Some(block) = allocator.allocate(std::mem::size_of::<B::Data>()) else {
        panic!(
            "Light stack out of memory ({} of {} arena bytes in use)",
            allocator.used(),
            allocator.capacity()
        );
    };

    let mut data: B::Data = bytemuck::Zeroable::zeroed();
    builder.build(device, light, &mut data);
    allocator.write(block, &data);
    cache.insert(
        checksum,
        CacheEntry {
            kind,
            block,
            expired: false,
        },
    );
    log::debug!("Light cache miss: built {kind:?} {checksum:?}");
    (data, true)
}

// ─── Light Stack ──────────────────────────────────────────────────────────────

/// Per-frame light consolidation with a checksum keyed render data cache.
pub struct LightStack {
    settings: LightSettings,
    gate: FixedRateGate,

    directional_stack: Vec<DirectionalLight>,
    atmosphere_stack: Vec<AtmosphereLight>,
    skylight_stack: Vec<Skylight>,

    allocator: FreeListAllocator,
    cache: FxHashMap<Checksum, CacheEntry>,

    directional_builder: DirectionalBuilder,
    atmosphere_builder: AtmosphereBuilder,
    skylight_builder: SkylightBuilder,

    brdf_program: ProgramId,
    brdf_integration_lut: TextureId,
    light_buffer: BufferId,
    light_data: LightBufferData,

    shadow_casters: SmallVec<[DirectionalLight; 1]>,
    atmosphere: Option<Checksum>,
    global_skylight: Option<Checksum>,
    last_skylight: Option<Checksum>,
    lighting_dirty: bool,

    initialized: bool,
    stats: LightStackStats,
}

impl LightStack {
    /// Validates `settings` and reserves the cache arena.
    pub fn new(settings: LightSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            gate: FixedRateGate::new(settings.update_rate_hz),
            allocator: FreeListAllocator::new(settings.arena_size),
            settings,

            directional_stack: Vec::new(),
            atmosphere_stack: Vec::new(),
            skylight_stack: Vec::new(),

            cache: FxHashMap::default(),

            directional_builder: DirectionalBuilder,
            atmosphere_builder: AtmosphereBuilder::default(),
            skylight_builder: SkylightBuilder::default(),

            brdf_program: ProgramId::NULL,
            brdf_integration_lut: TextureId::NULL,
            light_buffer: BufferId::NULL,
            light_data: LightBufferData::default(),

            shadow_casters: SmallVec::new(),
            atmosphere: None,
            global_skylight: None,
            last_skylight: None,
            lighting_dirty: false,

            initialized: false,
            stats: LightStackStats::default(),
        })
    }

    /// Creates the builders' programs, the light buffer and the BRDF lookup.
    pub fn init(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.directional_builder.init(device)?;
        self.atmosphere_builder.init(device)?;
        self.skylight_builder.init(device)?;

        self.light_buffer = device.create_buffer(
            "light_data",
            std::mem::size_of::<LightBufferData>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;

        self.create_brdf_lookup(device)?;
        self.initialized = true;
        log::info!(
            "Light stack ready ({} KiB arena, {} Hz)",
            self.allocator.capacity() / 1024,
            self.settings.update_rate_hz
        );
        Ok(())
    }

    fn create_brdf_lookup(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        let size = self.settings.brdf_lut_size;
        self.brdf_integration_lut = device.create_texture(&TextureDesc::texture_2d(
            "brdf_integration_lut",
            size,
            size,
            wgpu::TextureFormat::Rgba16Float,
        ))?;
        self.brdf_program = device.create_compute_program(&ComputeProgramDesc {
            label: "brdf_integration",
            kernel: ComputeKernel::BrdfIntegration,
        })?;

        device.dispatch(
            &ComputeDispatch::new(self.brdf_program, [size / 8, size / 8, 1])
                .with_image(
                    0,
                    self.brdf_integration_lut,
                    0,
                    wgpu::StorageTextureAccess::WriteOnly,
                )
                .with_uniforms(&Vec2::splat(size as f32)),
        );
        device.barrier(MemoryBarrier::ShaderImageAccess);
        log::info!("BRDF integration LUT generated ({size}x{size})");
        Ok(())
    }

    /// Submits a light for the current frame.
    pub fn push(&mut self, light: &Light) {
        match light {
            Light::Directional(l) => self.directional_stack.push(l.clone()),
            Light::Atmosphere(l) => self.atmosphere_stack.push(l.clone()),
            Light::Skylight(l) => self.skylight_stack.push(l.clone()),
        }
    }

    /// Advances by `dt` seconds. Returns `true` if this call consolidated.
    ///
    /// Submissions are cleared in every case.
    ///
    /// # Panics
    ///
    /// Panics before [`Self::init`] and when the arena is exhausted.
    pub fn update(&mut self, dt: f32, device: &mut dyn GraphicsDevice) -> bool {
        assert!(self.initialized, "LightStack::update called before init");

        let consolidate = self.gate.tick(dt);
        if consolidate {
            self.consolidate(device);
        } else {
            log::trace!("Light stack gate closed, {} lights dropped", self.submitted());
        }

        self.directional_stack.clear();
        self.atmosphere_stack.clear();
        self.skylight_stack.clear();
        consolidate
    }

    fn submitted(&self) -> usize {
        self.directional_stack.len() + self.atmosphere_stack.len() + self.skylight_stack.len()
    }

    fn consolidate(&mut self, device: &mut dyn GraphicsDevice) {
        self.stats.consolidations += 1;

        // mark
        for entry in self.cache.values_mut() {
            entry.expired = true;
        }
        self.shadow_casters.clear();
        self.light_data = LightBufferData::default();
        self.atmosphere = None;
        self.global_skylight = None;
        self.skylight_builder.begin_tick();

        // order is important: every kind depends on the one before
        self.update_directional_lights(device);
        self.update_atmosphere_lights(device);
        let skylight_rebuilt = self.update_skylights(device);

        self.lighting_dirty = self.global_skylight != self.last_skylight || skylight_rebuilt;
        self.last_skylight = self.global_skylight;

        self.sweep(device);

        if !self.light_buffer.is_null() {
            device.write_buffer(self.light_buffer, 0, bytemuck::bytes_of(&self.light_data));
        }
    }

    fn update_directional_lights(&mut self, device: &mut dyn GraphicsDevice) {
        for light in &self.directional_stack {
            let (_, built) = touch_or_build(
                &mut self.cache,
                &mut self.allocator,
                &mut self.directional_builder,
                device,
                LightKind::Directional,
                light.checksum(),
                light,
                false,
            );
            if built {
                self.stats.directional_builds += 1;
            }
        }

        let Some(light) = self.directional_stack.last() else {
            self.atmosphere_builder.set_sun(None);
            return;
        };
        let data: DirectionalRenderData = self.read_entry(light.checksum());

        self.light_data.directional_light = DirectionalLightData {
            direction: data.direction,
            intensity: light.intensity,
            color: light.color,
            cast_shadows: u32::from(data.cast_shadows()),
            valid: 1,
            _pad: [0; 3],
        };
        if light.cast_shadows {
            self.shadow_casters.push(light.clone());
        }
        self.atmosphere_builder
            .set_sun(light.contribute_to_atmosphere.then(|| SunInfluence::from(light)));
    }

    fn update_atmosphere_lights(&mut self, device: &mut dyn GraphicsDevice) {
        let sun_changed = self.atmosphere_builder.needs_rebuild();

        let mut authoritative = None;
        for light in &self.atmosphere_stack {
            let checksum = light.checksum();
            let (data, built): (AtmosphereRenderData, bool) = touch_or_build(
                &mut self.cache,
                &mut self.allocator,
                &mut self.atmosphere_builder,
                device,
                LightKind::Atmosphere,
                checksum,
                light,
                sun_changed,
            );
            if built {
                self.stats.atmosphere_builds += 1;
            }
            authoritative = Some((checksum, data));
        }

        if let Some((checksum, data)) = authoritative {
            self.atmosphere = Some(checksum);
            self.skylight_builder
                .add_atmosphere_influence(AtmosphereInfluence::new(checksum, &data));
        }
    }

    /// Returns `true` if the global skylight was (re)built.
    fn update_skylights(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        let influence_changed = self.skylight_builder.needs_rebuild();

        let mut global_rebuilt = false;
        for light in &self.skylight_stack {
            let checksum = light.checksum();
            let captured = !light.use_texture;
            let force = captured && (influence_changed || light.dynamic);

            let (data, built): (SkylightRenderData, bool) = touch_or_build(
                &mut self.cache,
                &mut self.allocator,
                &mut self.skylight_builder,
                device,
                LightKind::Skylight,
                checksum,
                light,
                force,
            );
            if built {
                self.stats.skylight_builds += 1;
            }

            if !light.local && self.global_skylight.is_none() {
                self.global_skylight = Some(checksum);
                global_rebuilt = built;
                self.light_data.skylight = SkylightData {
                    intensity: light.intensity,
                    valid: u32::from(data.is_complete()),
                    _pad: [0; 2],
                };
            }
        }
        global_rebuilt
    }

    fn sweep(&mut self, device: &mut dyn GraphicsDevice) {
        let expired: SmallVec<[Checksum; 8]> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.expired)
            .map(|(checksum, _)| *checksum)
            .collect();

        for checksum in expired {
            if let Some(entry) = self.cache.remove(&checksum) {
                log::debug!("Light cache evicted {:?} {checksum:?}", entry.kind);
                self.release_entry(device, &entry);
                self.stats.evictions += 1;
            }
        }
    }

    fn release_entry(&mut self, device: &mut dyn GraphicsDevice, entry: &CacheEntry) {
        match entry.kind {
            LightKind::Directional => {
                let mut data: DirectionalRenderData = self.allocator.read(entry.block);
                self.directional_builder.release(device, &mut data);
            }
            LightKind::Atmosphere => {
                let mut data: AtmosphereRenderData = self.allocator.read(entry.block);
                self.atmosphere_builder.release(device, &mut data);
            }
            LightKind::Skylight => {
                let mut data: SkylightRenderData = self.allocator.read(entry.block);
                self.skylight_builder.release(device, &mut data);
            }
        }
        self.allocator.free(entry.block);
    }

    fn read_entry<T: bytemuck::Pod>(&self, checksum: Checksum) -> T {
        self.cache
            .get(&checksum)
            .map_or_else(T::zeroed, |entry| self.allocator.read(entry.block))
    }

    /// Releases every cached resource and the BRDF lookup, and resets the arena.
    pub fn teardown(&mut self, device: &mut dyn GraphicsDevice) {
        let entries: Vec<CacheEntry> = self.cache.drain().map(|(_, entry)| entry).collect();
        for entry in &entries {
            self.release_entry(device, entry);
        }
        self.allocator.reset();

        device.release_texture(self.brdf_integration_lut);
        self.brdf_integration_lut = TextureId::NULL;

        self.directional_stack.clear();
        self.atmosphere_stack.clear();
        self.skylight_stack.clear();
        self.shadow_casters.clear();
        self.light_data = LightBufferData::default();
        self.atmosphere = None;
        self.global_skylight = None;
        self.last_skylight = None;
        self.lighting_dirty = false;
        self.gate.reset();
        self.initialized = false;
        log::info!("Light stack torn down");
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    /// Light data of the last consolidation tick.
    #[must_use]
    pub fn light_data(&self) -> &LightBufferData {
        &self.light_data
    }

    /// Directional lights casting shadows, at most one.
    #[must_use]
    pub fn shadow_casters(&self) -> &[DirectionalLight] {
        &self.shadow_casters
    }

    /// `true` when the global skylight changed or was rebuilt on the last tick.
    #[must_use]
    pub fn lighting_dirty(&self) -> bool {
        self.lighting_dirty
    }

    #[must_use]
    pub fn skylight_brdf_lookup(&self) -> Option<TextureId> {
        self.brdf_integration_lut.non_null()
    }

    fn global_skylight_data(&self) -> Option<SkylightRenderData> {
        self.global_skylight.map(|checksum| self.read_entry(checksum))
    }

    #[must_use]
    pub fn skylight_cubemap(&self) -> Option<TextureId> {
        self.global_skylight_data()?.cubemap.non_null()
    }

    #[must_use]
    pub fn skylight_irradiance_map(&self) -> Option<TextureId> {
        self.global_skylight_data()?.irradiance_cubemap.non_null()
    }

    #[must_use]
    pub fn skylight_specular_prefilter_map(&self) -> Option<TextureId> {
        self.global_skylight_data()?
            .specular_prefiltered_cubemap
            .non_null()
    }

    /// Sky cubemap of the authoritative atmosphere.
    #[must_use]
    pub fn atmosphere_cubemap(&self) -> Option<TextureId> {
        let checksum = self.atmosphere?;
        self.read_entry::<AtmosphereRenderData>(checksum)
            .cubemap
            .non_null()
    }

    #[must_use]
    pub fn light_buffer(&self) -> BufferId {
        self.light_buffer
    }

    #[must_use]
    pub fn is_cached(&self, checksum: Checksum) -> bool {
        self.cache.contains_key(&checksum)
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Arena bytes held by cache entries.
    #[must_use]
    pub fn arena_used(&self) -> usize {
        self.allocator.used()
    }

    #[must_use]
    pub fn stats(&self) -> LightStackStats {
        self.stats
    }

    #[must_use]
    pub fn settings(&self) -> &LightSettings {
        &self.settings
    }
}
