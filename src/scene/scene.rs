use crate::core::{FreelistId, PackedFreelist};
use crate::renderer::LightStack;
use crate::scene::camera::Camera;
use crate::scene::light::Light;

/// Handle of a light owned by a [`Scene`].
pub type LightKey = FreelistId;

/// Default light capacity of a scene.
pub const DEFAULT_MAX_LIGHTS: usize = 256;

/// Scene data relevant to lighting.
///
/// Lights live packed in a [`PackedFreelist`], so submitting them is a linear
/// walk over contiguous memory.
pub struct Scene {
    pub lights: PackedFreelist<Light>,
    pub camera: Camera,
}

impl Scene {
    #[must_use]
    pub fn new(camera: Camera) -> Self {
        Self::with_light_capacity(camera, DEFAULT_MAX_LIGHTS)
    }

    #[must_use]
    pub fn with_light_capacity(camera: Camera, max_lights: usize) -> Self {
        Self {
            lights: PackedFreelist::new(max_lights),
            camera,
        }
    }

    pub fn add_light(&mut self, light: impl Into<Light>) -> LightKey {
        self.lights.insert(light.into())
    }

    /// Removes a light, `None` for stale keys.
    pub fn remove_light(&mut self, key: LightKey) -> Option<Light> {
        self.lights.contains(key).then(|| self.lights.erase(key))
    }

    #[must_use]
    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    /// Pushes every light for the current frame.
    pub fn submit_lights(&self, light_stack: &mut LightStack) {
        for light in self.lights.as_slice() {
            light_stack.push(light);
        }
    }
}
