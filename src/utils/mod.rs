pub mod checksum;
pub mod time;

pub use checksum::{Checksum, ChecksumBuilder};
pub use time::FixedRateGate;
