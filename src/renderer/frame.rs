//! Per-frame lighting orchestration.
//!
//! Runs the light stack and then, when it resolved a shadow caster, the
//! cascade splitter for that light. Both keep their own update rate.

use crate::errors::Result;
use crate::renderer::device::GraphicsDevice;
use crate::renderer::light_stack::LightStack;
use crate::renderer::settings::RendererSettings;
use crate::renderer::shadow::CascadeSplitter;
use crate::scene::camera::Camera;

/// What a call to [`FrameLighting::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub lights_consolidated: bool,
    pub cascades_updated: bool,
}

/// Owns the light stack and the cascade splitter of one renderer.
pub struct FrameLighting {
    pub light_stack: LightStack,
    pub cascades: CascadeSplitter,
}

impl FrameLighting {
    /// Validates `settings`, builds both components and initializes the
    /// light stack on `device`.
    pub fn new(settings: &RendererSettings, device: &mut dyn GraphicsDevice) -> Result<Self> {
        settings.validate()?;
        let mut light_stack = LightStack::new(settings.light.clone())?;
        light_stack.init(device)?;
        Ok(Self {
            light_stack,
            cascades: CascadeSplitter::new(settings.shadow.clone()),
        })
    }

    /// Consolidates the lights pushed this frame, then updates the cascades
    /// for the current shadow caster, if any.
    pub fn update(&mut self, dt: f32, camera: &Camera, device: &mut dyn GraphicsDevice) -> FrameUpdate {
        let lights_consolidated = self.light_stack.update(dt, device);

        let cascades_updated = match self.light_stack.shadow_casters().last() {
            Some(caster) => {
                let direction = caster.direction;
                self.cascades.update(dt, camera, direction)
            }
            None => false,
        };

        FrameUpdate {
            lights_consolidated,
            cascades_updated,
        }
    }

    /// Releases every GPU resource the light stack holds.
    pub fn teardown(&mut self, device: &mut dyn GraphicsDevice) {
        self.light_stack.teardown(device);
    }
}
