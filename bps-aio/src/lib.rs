// bps-aio/src/lib.rs
//! Archive extraction and checksum calculation for bps

pub mod checksum;
pub mod extract;
pub mod fs;

pub use checksum::ChecksumCalculator;
pub use extract::{Archive, ArchiveFormat};
