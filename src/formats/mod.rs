//! Binary file format parsers.
//!
//! This module provides parsers for the formats an AMOS installation ships:
//! - Amiga hunk executables and object files
//! - Packed hunk files (PowerPacker and StoneCracker stubs)
//! - AMOS extension libraries (`.Lib`)
//! - AMOS compiled programs

pub mod amoslib;
pub mod hunk;
pub mod program;
pub mod unpack;

use crate::error::{AmosError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Magic byte signatures for format detection.
pub mod magic {
    /// Hunk header block: 0x000003F3
    pub const HUNK_HEADER: [u8; 4] = [0x00, 0x00, 0x03, 0xF3];

    /// Squashed hunk payload: 'x' 'V' 'd' 'g'
    pub const SQUASH: [u8; 4] = *b"xVdg";

    /// StoneCracker 4.04 packed data: 'S' '4' '0' '4'
    pub const STONECRACKER: [u8; 4] = *b"S404";

    /// AMOS Pro library variant marker: 'A' 'P' '2' '0'
    pub const AP20: [u8; 4] = *b"AP20";

    /// Sprite bank: 'A' 'm' 'S' 'p'
    pub const SPRITE_BANK: [u8; 4] = *b"AmSp";

    /// Icon bank: 'A' 'm' 'I' 'c'
    pub const ICON_BANK: [u8; 4] = *b"AmIc";

    /// Marker appended to some library routines: 'G' 'e' 't' 'P'
    pub const GET_PARAM: [u8; 4] = *b"GetP";
}

/// Detected file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    /// Amiga hunk file
    Hunk,
    /// Bare squashed payload
    Squashed,
    /// Bare StoneCracker payload
    StoneCracker,
    /// Unknown/raw data
    Raw,
}

/// Detect the file format from magic bytes.
pub fn detect_format(data: &[u8]) -> DetectedFormat {
    if data.len() < 4 {
        return DetectedFormat::Raw;
    }

    match [data[0], data[1], data[2], data[3]] {
        magic::HUNK_HEADER => DetectedFormat::Hunk,
        magic::SQUASH => DetectedFormat::Squashed,
        magic::STONECRACKER => DetectedFormat::StoneCracker,
        _ => DetectedFormat::Raw,
    }
}

/// Read bytes with bounds checking.
pub fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= data.len() => Ok(&data[offset..end]),
        _ => Err(AmosError::TruncatedData {
            offset,
            expected: len,
            actual: data.len().saturating_sub(offset),
        }),
    }
}

/// Read a big-endian u16.
pub fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    read_bytes(data, offset, 2).map(BigEndian::read_u16)
}

/// Read a big-endian i16.
pub fn read_i16(data: &[u8], offset: usize) -> Result<i16> {
    read_bytes(data, offset, 2).map(BigEndian::read_i16)
}

/// Read a big-endian u32.
pub fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    read_bytes(data, offset, 4).map(BigEndian::read_u32)
}

/// Decode bytes as ISO-8859-1 text, the encoding AMOS strings use.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Lower-case hex MD5 digest of a byte slice.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5::compute(data).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&[0, 0, 3, 0xF3, 0]), DetectedFormat::Hunk);
        assert_eq!(detect_format(b"xVdg...."), DetectedFormat::Squashed);
        assert_eq!(detect_format(b"S404"), DetectedFormat::StoneCracker);
        assert_eq!(detect_format(b"abc"), DetectedFormat::Raw);
    }

    #[test]
    fn test_read_helpers() {
        let data = [0x12, 0x34, 0xFF, 0xFE, 0x00];
        assert_eq!(read_u16(&data, 0).unwrap(), 0x1234);
        assert_eq!(read_i16(&data, 2).unwrap(), -2);
        assert_eq!(read_u32(&data, 0).unwrap(), 0x1234_FFFE);
        assert!(matches!(
            read_u32(&data, 2),
            Err(AmosError::TruncatedData {
                offset: 2,
                expected: 4,
                actual: 3
            })
        ));
        assert!(read_bytes(&data, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_latin1_and_md5() {
        assert_eq!(latin1(&[b'A', 0xE9]), "A\u{e9}");
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
