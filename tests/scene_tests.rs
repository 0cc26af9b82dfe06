//! Scene Integration Tests
//!
//! Tests for:
//! - Scene: add/remove lights, stale keys
//! - Light accessors and mutation through keys
//! - Light submission into the light stack

use glam::Vec3;

use lantern::renderer::device::HeadlessDevice;
use lantern::renderer::light_stack::LightStack;
use lantern::renderer::settings::LightSettings;
use lantern::scene::camera::Camera;
use lantern::scene::light::{AtmosphereLight, DirectionalLight, Light, Skylight};
use lantern::scene::scene::Scene;

fn new_scene() -> Scene {
    Scene::new(Camera::new_perspective(60.0, 1.0, 0.1, 100.0))
}

fn ready_stack(device: &mut HeadlessDevice) -> LightStack {
    let mut stack = LightStack::new(LightSettings {
        update_rate_hz: 1.0,
        ..Default::default()
    })
    .unwrap();
    stack.init(device).unwrap();
    stack
}

// ============================================================================
// Light Management
// ============================================================================

#[test]
fn scene_add_light() {
    let mut scene = new_scene();
    let key = scene.add_light(Light::new_directional(Vec3::Y, Vec3::ONE, 5.0));

    let light = scene.light(key).unwrap();
    assert_eq!(light.as_directional().unwrap().intensity, 5.0);
    assert_eq!(scene.lights.len(), 1);
}

#[test]
fn scene_add_light_from_descriptor() {
    let mut scene = new_scene();
    let key = scene.add_light(AtmosphereLight::default());
    assert!(scene.light(key).unwrap().as_atmosphere().is_some());

    let key = scene.add_light(Skylight::default());
    assert!(scene.light(key).unwrap().as_skylight().is_some());
}

#[test]
fn scene_remove_light() {
    let mut scene = new_scene();
    let key = scene.add_light(Light::new_skylight(2.0));

    let removed = scene.remove_light(key).unwrap();
    assert_eq!(removed.as_skylight().unwrap().intensity, 2.0);
    assert!(scene.light(key).is_none());
    assert!(scene.remove_light(key).is_none(), "stale key");
    assert!(scene.lights.is_empty());
}

#[test]
fn scene_light_mut_edits_in_place() {
    let mut scene = new_scene();
    let key = scene.add_light(DirectionalLight::default());

    scene
        .light_mut(key)
        .and_then(Light::as_directional_mut)
        .unwrap()
        .cast_shadows = true;

    assert!(scene.light(key).unwrap().as_directional().unwrap().cast_shadows);
}

#[test]
fn scene_keys_survive_other_removals() {
    let mut scene = new_scene();
    let a = scene.add_light(Light::new_skylight(1.0));
    let b = scene.add_light(Light::new_skylight(2.0));
    let c = scene.add_light(Light::new_skylight(3.0));

    scene.remove_light(a);
    assert_eq!(scene.light(b).unwrap().as_skylight().unwrap().intensity, 2.0);
    assert_eq!(scene.light(c).unwrap().as_skylight().unwrap().intensity, 3.0);
}

#[test]
#[should_panic(expected = "out of slots")]
fn scene_light_capacity_is_fixed() {
    let mut scene =
        Scene::with_light_capacity(Camera::new_perspective(60.0, 1.0, 0.1, 100.0), 2);
    scene.add_light(Light::new_atmosphere());
    scene.add_light(Light::new_atmosphere());
    scene.add_light(Light::new_atmosphere());
}

// ============================================================================
// Submission
// ============================================================================

#[test]
fn submitted_lights_reach_the_light_stack() {
    let mut device = HeadlessDevice::default();
    let mut stack = ready_stack(&mut device);
    let mut scene = new_scene();
    scene.add_light(DirectionalLight {
        direction: Vec3::new(0.0, 3.0, 0.0),
        cast_shadows: true,
        ..Default::default()
    });

    scene.submit_lights(&mut stack);
    assert!(stack.update(1.0, &mut device));

    let data = stack.light_data().directional_light;
    assert!(data.is_valid());
    assert_eq!(data.direction, Vec3::Y);
    assert_eq!(stack.shadow_casters().len(), 1);
}

#[test]
fn removed_light_is_evicted_on_next_tick() {
    let mut device = HeadlessDevice::default();
    let mut stack = ready_stack(&mut device);
    let mut scene = new_scene();
    let key = scene.add_light(Light::new_directional(Vec3::X, Vec3::ONE, 1.0));
    let checksum = scene.light(key).unwrap().checksum();

    scene.submit_lights(&mut stack);
    stack.update(1.0, &mut device);
    assert!(stack.is_cached(checksum));

    scene.remove_light(key);
    scene.submit_lights(&mut stack);
    stack.update(1.0, &mut device);
    assert!(!stack.is_cached(checksum));
}

#[test]
fn edited_light_gets_new_cache_entry() {
    let mut device = HeadlessDevice::default();
    let mut stack = ready_stack(&mut device);
    let mut scene = new_scene();
    let key = scene.add_light(Light::new_directional(Vec3::X, Vec3::ONE, 1.0));

    scene.submit_lights(&mut stack);
    stack.update(1.0, &mut device);

    scene
        .light_mut(key)
        .and_then(Light::as_directional_mut)
        .unwrap()
        .intensity = 2.0;
    scene.submit_lights(&mut stack);
    stack.update(1.0, &mut device);

    assert_eq!(stack.stats().directional_builds, 2);
    assert_eq!(stack.cache_len(), 1);
    assert_eq!(stack.light_data().directional_light.intensity, 2.0);
}
