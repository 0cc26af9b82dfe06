//! Shadow Utilities
//!
//! Pure math functions for cascaded shadow maps, kept free of renderer
//! state for reuse and testability.
//!
//! # Provided Functions
//!
//! - Cascade split computation (Practical Split Scheme)
//! - Frustum corner extraction in world space
//! - Bounding sphere fitting of a frustum slice
//! - Stabilized orthographic VP matrix construction for CSM cascades

use glam::{Mat4, Vec3, Vec4};

/// Maximum cascade count per directional light.
pub const MAX_CASCADES: usize = 4;

/// Bounding sphere radii are rounded up to this many steps per world unit.
const RADIUS_QUANTIZATION: f32 = 16.0;

// ============================================================================
// Cascade Split Computation
// ============================================================================

/// Computes cascade split depths using the Practical Split Scheme.
///
/// `lambda` blends between uniform (`0.0`) and logarithmic (`1.0`)
/// distribution. Returns view-space distances where entry `0` is `near` and
/// entry `cascade_count` is exactly `far`. Entries past `cascade_count` are 0.
#[must_use]
pub fn compute_split_depths(
    cascade_count: usize,
    near: f32,
    far: f32,
    lambda: f32,
) -> [f32; MAX_CASCADES + 1] {
    let mut splits = [0.0f32; MAX_CASCADES + 1];
    let n = cascade_count.clamp(1, MAX_CASCADES);

    splits[0] = near;
    for (i, split) in splits.iter_mut().enumerate().take(n).skip(1) {
        let p = i as f32 / n as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        *split = lambda * log_split + (1.0 - lambda) * uni_split;
    }
    splits[n] = far;

    splits
}

// ============================================================================
// Frustum Corners in World Space
// ============================================================================

/// Unprojects the 8 NDC corners of a `[0, 1]` depth frustum.
///
/// Returns the near face (`z = 0`) in indices `0..4` and the far face
/// (`z = 1`) in `4..8`, with `i` and `i + 4` on the same corner ray.
#[must_use]
pub fn frustum_corners_world(inverse_view_projection: Mat4) -> [Vec3; 8] {
    const NDC: [Vec3; 8] = [
        Vec3::new(-1.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
    ];

    NDC.map(|c| inverse_view_projection.project_point3(c))
}

/// Cuts the slice between `near_fraction` and `far_fraction` of the way
/// along each corner ray.
#[must_use]
pub fn frustum_slice(corners: &[Vec3; 8], near_fraction: f32, far_fraction: f32) -> [Vec3; 8] {
    let mut slice = [Vec3::ZERO; 8];
    for i in 0..4 {
        let ray = corners[i + 4] - corners[i];
        slice[i] = corners[i] + ray * near_fraction;
        slice[i + 4] = corners[i] + ray * far_fraction;
    }
    slice
}

/// Centroid and enclosing radius of a set of corners.
///
/// The radius is rounded up to 1/16 of a unit so small camera jitter does
/// not change the cascade's extent.
#[must_use]
pub fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let radius = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0f32, f32::max);
    let radius = (radius * RADIUS_QUANTIZATION).ceil() / RADIUS_QUANTIZATION;
    (center, radius)
}

// ============================================================================
// CSM: Build Cascade VP Matrix
// ============================================================================

/// Light-space matrices of one cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeProjection {
    pub view: Mat4,
    /// Orthographic projection including the texel snapping translation.
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Depth extent of the orthographic volume.
    pub far_plane: f32,
}

/// Builds a texel-stable orthographic VP matrix around a bounding sphere.
///
/// `light_direction` points towards the light. The eye sits on the sphere
/// pulled back by `offset`, the volume spans `[-radius, radius]` in x and y
/// and `[0, 2 * radius + offset]` in depth.
#[must_use]
pub fn build_cascade_vp(
    light_direction: Vec3,
    center: Vec3,
    radius: f32,
    offset: f32,
    shadow_map_size: u32,
) -> CascadeProjection {
    let safe_dir = light_direction.normalize_or(Vec3::Y);

    let up = if safe_dir.y.abs() > 0.99 {
        Vec3::X
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(center + safe_dir * (radius + offset), center, up);

    let far_plane = 2.0 * radius + offset;
    let mut projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, far_plane);

    // Texel snapping: move the world origin onto the shadow map texel grid
    let half_size = shadow_map_size as f32 * 0.5;
    let origin = (projection * view) * Vec4::W * half_size;
    let snap = (origin.round() - origin) / half_size;
    projection.w_axis.x += snap.x;
    projection.w_axis.y += snap.y;

    CascadeProjection {
        view,
        projection,
        view_projection: projection * view,
        far_plane,
    }
}
