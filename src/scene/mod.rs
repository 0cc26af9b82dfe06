//! Scene data consumed by the lighting layer.
//!
//! - Light: light descriptors (directional, skylight, atmosphere)
//! - Camera: perspective camera and its culling frustum
//! - Scene: owner of the lights

pub mod camera;
pub mod light;
pub mod scene;

pub use camera::{Camera, Frustum};
pub use light::{AtmosphereLight, DirectionalLight, Light, Skylight};
pub use scene::{LightKey, Scene};
