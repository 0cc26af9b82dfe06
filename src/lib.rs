#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod renderer;
pub mod scene;
pub mod utils;

pub use crate::core::{FreelistId, PackedFreelist};
pub use errors::{LanternError, Result};
pub use renderer::{
    CascadeSplitter, FrameLighting, GraphicsDevice, HeadlessDevice, LightStack, RendererSettings,
};
pub use scene::{Camera, Light, Scene};
