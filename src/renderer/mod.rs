//! Renderer-side lighting data.
//!
//! - [`device`]: the graphics device seam and a headless implementation
//! - [`light_stack`]: per-frame light consolidation and render data cache
//! - [`render_data_builder`]: builders invoked on cache misses
//! - [`shadow`]: cascaded shadow map splitting
//! - [`frame`]: runs the above once per frame

pub mod allocator;
pub mod device;
pub mod frame;
pub mod light_stack;
pub mod render_data_builder;
pub mod settings;
pub mod shadow;

pub use device::{GraphicsDevice, HeadlessDevice, TextureId};
pub use frame::{FrameLighting, FrameUpdate};
pub use light_stack::{LightBufferData, LightStack, LightStackStats};
pub use settings::{LightSettings, RendererSettings, ShadowSettings};
pub use shadow::CascadeSplitter;
