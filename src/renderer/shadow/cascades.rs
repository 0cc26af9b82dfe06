//! Cascade Splitter
//!
//! Splits the camera frustum into up to [`MAX_CASCADES`] slices and fits a
//! stabilized orthographic light volume around each one.
//!
//! The splitter runs behind its own [`FixedRateGate`], independent of the
//! light stack. Between updates the last cascade set stays valid.

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::settings::ShadowSettings;
use crate::renderer::shadow::utils::{
    MAX_CASCADES, bounding_sphere, build_cascade_vp, compute_split_depths, frustum_corners_world,
    frustum_slice,
};
use crate::scene::camera::{Camera, Frustum};
use crate::utils::FixedRateGate;

/// One shadow cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    pub view_projection: Mat4,
    /// View-space distance where this cascade ends.
    pub split_depth: f32,
    /// Depth extent of the light volume.
    pub far_plane: f32,
    /// Culling frustum of the light volume.
    pub frustum: Frustum,
    /// Bounding sphere of the camera slice.
    pub center: Vec3,
    pub radius: f32,
}

impl Default for Cascade {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            split_depth: 0.0,
            far_plane: 0.0,
            frustum: Frustum::default(),
            center: Vec3::ZERO,
            radius: 0.0,
        }
    }
}

/// The cascade set of the last update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeData {
    cascades: [Cascade; MAX_CASCADES],
    count: usize,
    pub camera_near: f32,
    pub camera_far: f32,
    /// Direction towards the light the cascades were fitted for.
    pub light_direction: Vec3,
    pub lambda: f32,
}

impl CascadeData {
    #[must_use]
    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades[..self.count]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Cascade data in the layout the shading passes bind.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniforms {
    pub view_projections: [Mat4; MAX_CASCADES],
    pub far_planes: Vec4,
    /// End of each cascade, `-1.0` for unused ones.
    pub split_depths: Vec4,
    /// `(resolution, cascade_count, interpolation_range, max_penumbra)`.
    pub cascade_info: Vec4,
}

/// Computes shadow cascades for the dominant directional light.
pub struct CascadeSplitter {
    settings: ShadowSettings,
    gate: FixedRateGate,
    split_depths: [f32; MAX_CASCADES + 1],
    dirty: bool,
    data: CascadeData,
    update_count: u64,
}

impl CascadeSplitter {
    /// # Panics
    ///
    /// Panics if `settings` fail [`ShadowSettings::validate`], including a
    /// cascade count outside `1..=4`.
    #[must_use]
    pub fn new(settings: ShadowSettings) -> Self {
        if let Err(e) = settings.validate() {
            panic!("CascadeSplitter: {e}");
        }
        Self {
            gate: FixedRateGate::new(settings.update_rate_hz),
            split_depths: [0.0; MAX_CASCADES + 1],
            dirty: true,
            data: CascadeData {
                lambda: settings.split_lambda,
                ..Default::default()
            },
            settings,
            update_count: 0,
        }
    }

    /// Advances by `dt` and recomputes the cascades when the gate opens.
    ///
    /// `view_projection` is the camera's, `light_direction` points towards
    /// the light. Returns `true` if the cascades were recomputed.
    pub fn update_cascades(
        &mut self,
        dt: f32,
        camera_near: f32,
        camera_far: f32,
        view_projection: Mat4,
        light_direction: Vec3,
    ) -> bool {
        assert!(
            camera_near > 0.0 && camera_far > camera_near,
            "Cascades need 0 < near < far, got near {camera_near} far {camera_far}"
        );

        if !self.gate.tick(dt) {
            log::trace!("Cascade gate closed");
            return false;
        }

        self.compute(camera_near, camera_far, view_projection, light_direction);
        true
    }

    /// [`Self::update_cascades`] with the camera's own matrices.
    pub fn update(&mut self, dt: f32, camera: &Camera, light_direction: Vec3) -> bool {
        self.update_cascades(
            dt,
            camera.near,
            camera.far,
            camera.view_projection_matrix(),
            light_direction,
        )
    }

    fn compute(&mut self, near: f32, far: f32, view_projection: Mat4, light_direction: Vec3) {
        let count = self.settings.cascade_count as usize;

        let range_changed = (self.split_depths[0] - near).abs() > 1e-5
            || (self.split_depths[count] - far).abs() > 1e-5;
        if range_changed || self.dirty {
            self.dirty = false;
            self.split_depths = compute_split_depths(count, near, far, self.settings.split_lambda);
            log::debug!("Cascade splits: {:?}", &self.split_depths[..=count]);
        }

        let corners = frustum_corners_world(view_projection.inverse());
        let depth_range = far - near;
        let overlap = self.settings.interpolation_range;

        let mut slice_near = near;
        for (i, cascade) in self.data.cascades.iter_mut().enumerate().take(count) {
            // inner far edges are pulled in by the interpolation range, the
            // next slice starts there; the last slice always ends at `far`
            let slice_far = if i + 1 == count {
                far
            } else {
                (self.split_depths[i + 1] - overlap).max(slice_near)
            };

            let slice = frustum_slice(
                &corners,
                (slice_near - near) / depth_range,
                (slice_far - near) / depth_range,
            );
            let (center, radius) = bounding_sphere(&slice);
            let projection = build_cascade_vp(
                light_direction,
                center,
                radius,
                self.settings.offset,
                self.settings.resolution,
            );

            *cascade = Cascade {
                view_projection: projection.view_projection,
                split_depth: self.split_depths[i + 1],
                far_plane: projection.far_plane,
                frustum: Frustum::from_matrix(projection.view_projection),
                center,
                radius,
            };
            slice_near = slice_far;
        }

        self.data.count = count;
        self.data.camera_near = near;
        self.data.camera_far = far;
        self.data.light_direction = light_direction;
        self.data.lambda = self.settings.split_lambda;
        self.update_count += 1;
    }

    // ─── Reconfiguration ──────────────────────────────────────────────────

    /// # Panics
    ///
    /// Panics if `count` is outside `1..=4`.
    pub fn set_cascade_count(&mut self, count: u32) {
        assert!(
            (1..=MAX_CASCADES as u32).contains(&count),
            "Cascade count must be in 1..={MAX_CASCADES}, got {count}"
        );
        self.settings.cascade_count = count;
        self.dirty = true;
    }

    pub fn set_split_lambda(&mut self, lambda: f32) {
        assert!(
            lambda > 0.0 && lambda < 1.0,
            "Split lambda must be in (0, 1), got {lambda}"
        );
        self.settings.split_lambda = lambda;
        self.dirty = true;
    }

    pub fn set_interpolation_range(&mut self, range: f32) {
        assert!(range >= 0.0, "Interpolation range must be >= 0, got {range}");
        self.settings.interpolation_range = range;
        self.dirty = true;
    }

    pub fn set_offset(&mut self, offset: f32) {
        self.settings.offset = offset;
        self.dirty = true;
    }

    pub fn set_resolution(&mut self, resolution: u32) {
        assert!(
            resolution > 0 && resolution % 2 == 0,
            "Shadow resolution must be even, got {resolution}"
        );
        self.settings.resolution = resolution;
        self.dirty = true;
    }

    pub fn set_max_penumbra(&mut self, max_penumbra: f32) {
        assert!(
            max_penumbra > 1.0 && max_penumbra < 32.0,
            "Max penumbra must be in (1, 32), got {max_penumbra}"
        );
        self.settings.max_penumbra = max_penumbra;
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    #[must_use]
    pub fn cascade_data(&self) -> &CascadeData {
        &self.data
    }

    #[must_use]
    pub fn cascades(&self) -> &[Cascade] {
        self.data.cascades()
    }

    /// `near, split_1, .., far` of the last computed set.
    #[must_use]
    pub fn split_depths(&self) -> &[f32] {
        &self.split_depths[..=self.data.count.max(1).min(MAX_CASCADES)]
    }

    #[must_use]
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Number of gate-passing updates so far.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Packs the current cascades for upload.
    #[must_use]
    pub fn shadow_uniforms(&self) -> ShadowUniforms {
        let mut view_projections = [Mat4::IDENTITY; MAX_CASCADES];
        let mut far_planes = [0.0f32; MAX_CASCADES];
        let mut split_depths = [-1.0f32; MAX_CASCADES];

        for (i, cascade) in self.cascades().iter().enumerate() {
            view_projections[i] = cascade.view_projection;
            far_planes[i] = cascade.far_plane;
            split_depths[i] = cascade.split_depth;
        }

        ShadowUniforms {
            view_projections,
            far_planes: Vec4::from_array(far_planes),
            split_depths: Vec4::from_array(split_depths),
            cascade_info: Vec4::new(
                self.settings.resolution as f32,
                self.data.count as f32,
                self.settings.interpolation_range,
                self.settings.max_penumbra,
            ),
        }
    }
}
