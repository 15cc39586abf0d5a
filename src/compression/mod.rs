//! Decompressors for the packers found on AMOS disks.
//!
//! Each codec decodes backward from the end of its packed stream into an
//! output buffer whose size is known from a header field. The bit cursors
//! differ in word width, refill trigger and checksum handling, so every codec
//! keeps its own.

pub mod powerpacker;
pub mod squash;
pub mod stonecracker;

pub use powerpacker::unpack as unpack_powerpacker;
pub use squash::{is_squashed, unsquash};
pub use stonecracker::unpack as unpack_stonecracker;
