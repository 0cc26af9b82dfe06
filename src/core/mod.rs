//! Core containers shared by the scene and the renderer.

pub mod packed_freelist;

pub use packed_freelist::{FreelistId, MAX_ELEMENTS, PackedFreelist};
