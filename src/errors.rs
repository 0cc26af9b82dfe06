//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`LanternError`] covers the recoverable failure modes:
//! - Invalid renderer configuration
//! - Graphics device resource creation failures
//!
//! Per-frame contract violations (stale handles, arena exhaustion) are not
//! represented here. They are assertions.
//!
//! # Usage
//!
//! Fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, LanternError>`.
//!
//! ```rust,ignore
//! use lantern::errors::Result;
//!
//! fn init_lighting(device: &mut impl GraphicsDevice) -> Result<LightStack> {
//!     let mut stack = LightStack::new(LightSettings::default())?;
//!     stack.init(device)?;
//!     Ok(stack)
//! }
//! ```

use thiserror::Error;

/// The main error type for the Lantern engine.
#[derive(Error, Debug)]
pub enum LanternError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A settings value is outside of its accepted range.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device rejected a texture description.
    #[error("Failed to create texture '{label}': {reason}")]
    TextureCreateFailed {
        /// Debug label of the texture
        label: String,
        /// Why the device refused it
        reason: String,
    },

    /// The device could not create a buffer.
    #[error("Failed to create buffer '{label}': {reason}")]
    BufferCreateFailed {
        /// Debug label of the buffer
        label: String,
        /// Why the device refused it
        reason: String,
    },

    /// The device ran out of handles of the given kind.
    #[error("Device capacity exceeded: {0}")]
    DeviceCapacityExceeded(&'static str),
}

/// Alias for `Result<T, LanternError>`.
pub type Result<T> = std::result::Result<T, LanternError>;
