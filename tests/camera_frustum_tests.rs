//! Camera and Frustum Tests
//!
//! Tests for:
//! - Perspective projection matrix generation (`[0, 1]` depth)
//! - View-projection matrix update and look-at placement
//! - Frustum plane extraction (Gribb-Hartmann)
//! - Frustum-sphere and frustum-point tests

use glam::{Affine3A, Mat4, Vec3, Vec4};

use lantern::scene::camera::{Camera, Frustum};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn ndc_z(m: Mat4, view_z: f32) -> f32 {
    let clip = m * Vec4::new(0.0, 0.0, view_z, 1.0);
    clip.z / clip.w
}

// ============================================================================
// Projection Matrix Tests
// ============================================================================

#[test]
fn perspective_near_maps_to_0_far_to_1() {
    let cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let proj = cam.projection_matrix();

    assert!(approx(ndc_z(proj, -0.1), 0.0), "near → {}", ndc_z(proj, -0.1));
    assert!(approx(ndc_z(proj, -100.0), 1.0), "far → {}", ndc_z(proj, -100.0));
}

#[test]
fn perspective_stores_fov_in_radians() {
    let cam = Camera::new_perspective(90.0, 1.5, 0.5, 50.0);
    assert!(approx(cam.fov, std::f32::consts::FRAC_PI_2));
    assert_eq!(cam.aspect, 1.5);
    assert_eq!(cam.near, 0.5);
    assert_eq!(cam.far, 50.0);
}

#[test]
fn update_projection_matrix_applies_new_range() {
    let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    cam.far = 10.0;
    cam.update_projection_matrix();

    assert!(approx(ndc_z(cam.projection_matrix(), -10.0), 1.0));
    assert_eq!(
        cam.view_projection_matrix(),
        cam.projection_matrix() * cam.view_matrix()
    );
}

#[test]
#[should_panic(expected = "0 < near < far")]
fn zero_near_panics() {
    let _ = Camera::new_perspective(60.0, 1.0, 0.0, 100.0);
}

#[test]
#[should_panic(expected = "0 < near < far")]
fn inverted_range_panics() {
    let _ = Camera::new_perspective(60.0, 1.0, 10.0, 1.0);
}

// ============================================================================
// View Matrix Tests
// ============================================================================

#[test]
fn world_transform_sets_position_and_view() {
    let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let transform = Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0));
    cam.update_view_projection(&transform);

    assert!(cam.position().distance(Vec3::new(1.0, 2.0, 3.0)) < EPSILON);
    // the camera's own position lands on the view origin
    let origin = cam.view_matrix().transform_point3(Vec3::new(1.0, 2.0, 3.0));
    assert!(origin.length() < EPSILON);
}

#[test]
fn look_at_points_negative_z_at_target() {
    let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let eye = Vec3::new(4.0, 3.0, 8.0);
    let target = Vec3::new(-1.0, 0.5, 0.0);
    cam.look_at(eye, target, Vec3::Y);

    assert!(cam.position().distance(eye) < 1e-3);
    let view_target = cam.view_matrix().transform_point3(target);
    assert!(view_target.x.abs() < 1e-3 && view_target.y.abs() < 1e-3);
    assert!(approx(view_target.z, -eye.distance(target)));
}

// ============================================================================
// Frustum Tests
// ============================================================================

#[test]
fn frustum_planes_are_normalized() {
    let cam = Camera::new_perspective(75.0, 16.0 / 9.0, 0.1, 100.0);
    for plane in cam.frustum().planes() {
        assert!(approx(plane.truncate().length(), 1.0), "plane {plane:?}");
    }
}

#[test]
fn frustum_contains_points_in_view() {
    let cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let frustum = cam.frustum();

    assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)), "behind");
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -150.0)), "past far");
    assert!(!frustum.contains_point(Vec3::new(50.0, 0.0, -5.0)), "outside right");
}

#[test]
fn frustum_sphere_straddling_plane_intersects() {
    let cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let frustum = cam.frustum();

    // center behind the camera but the sphere reaches past the near plane
    assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, 1.0), 2.0));
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 2.0));
    assert!(!frustum.intersects_sphere(Vec3::new(0.0, 200.0, -5.0), 1.0));
}

#[test]
fn frustum_follows_camera_motion() {
    let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
    let point = Vec3::new(0.0, 0.0, -5.0);
    assert!(cam.frustum().contains_point(point));

    cam.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::Y);
    assert!(!cam.frustum().contains_point(point));
}

#[test]
fn orthographic_frustum_matches_box() {
    let m = Mat4::orthographic_rh(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);
    let frustum = Frustum::from_matrix(m);

    assert!(frustum.contains_point(Vec3::new(1.9, 0.9, -9.9)));
    assert!(!frustum.contains_point(Vec3::new(2.1, 0.0, -5.0)));
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 0.5)));
    assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -10.5)));
}
