//! Content checksums for cache keys.
//!
//! A [`Checksum`] identifies the fields of a descriptor that feed an
//! expensive derived resource. Equal fields give equal checksums. Every
//! field is written with its own tag so permuted equal values hash apart.
//! The hash is xxh3: fast, 64 bit, not cryptographic. Collisions are not
//! detected.

use std::fmt;

use xxhash_rust::xxh3::Xxh3;

/// 64-bit content hash used as a cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(pub u64);

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({:016x})", self.0)
    }
}

/// Incremental builder for a [`Checksum`].
///
/// ```rust,ignore
/// let checksum = ChecksumBuilder::new(b"sky")
///     .field(b"use_texture", &[u8::from(sky.use_texture)])
///     .f32(b"ground_radius", atmo.ground_radius)
///     .finish();
/// ```
pub struct ChecksumBuilder {
    hasher: Xxh3,
}

impl ChecksumBuilder {
    /// Starts a checksum for descriptors of the given kind.
    #[must_use]
    pub fn new(kind: &[u8]) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(&(kind.len() as u32).to_le_bytes());
        hasher.update(kind);
        Self { hasher }
    }

    /// Mixes one tagged field.
    #[must_use]
    pub fn field(mut self, tag: &[u8], bytes: &[u8]) -> Self {
        self.hasher.update(&(tag.len() as u32).to_le_bytes());
        self.hasher.update(tag);
        self.hasher.update(&(bytes.len() as u32).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    #[must_use]
    pub fn f32(self, tag: &[u8], value: f32) -> Self {
        self.field(tag, &value.to_le_bytes())
    }

    #[must_use]
    pub fn u32(self, tag: &[u8], value: u32) -> Self {
        self.field(tag, &value.to_le_bytes())
    }

    #[must_use]
    pub fn bool(self, tag: &[u8], value: bool) -> Self {
        self.field(tag, &[u8::from(value)])
    }

    /// Mixes any plain-old-data value by its bytes.
    #[must_use]
    pub fn pod<T: bytemuck::Pod>(self, tag: &[u8], value: &T) -> Self {
        self.field(tag, bytemuck::bytes_of(value))
    }

    #[must_use]
    pub fn finish(self) -> Checksum {
        Checksum(self.hasher.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_fields_equal_checksum() {
        let a = ChecksumBuilder::new(b"k").f32(b"x", 1.0).f32(b"y", 2.0).finish();
        let b = ChecksumBuilder::new(b"k").f32(b"x", 1.0).f32(b"y", 2.0).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn test_permuted_fields_differ() {
        let a = ChecksumBuilder::new(b"k").f32(b"x", 1.0).f32(b"y", 2.0).finish();
        let b = ChecksumBuilder::new(b"k").f32(b"x", 2.0).f32(b"y", 1.0).finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_separates_equal_fields() {
        let a = ChecksumBuilder::new(b"sun").f32(b"x", 1.0).finish();
        let b = ChecksumBuilder::new(b"sky").f32(b"x", 1.0).finish();
        assert_ne!(a, b);
    }
}
