//! Cascaded shadow maps.

pub mod cascades;
pub mod utils;

pub use cascades::{Cascade, CascadeData, CascadeSplitter, ShadowUniforms};
pub use utils::MAX_CASCADES;
