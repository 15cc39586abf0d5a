//! Amiga hunk file parser and writer.
//!
//! A hunk file starts with a `HUNK_HEADER` block (resident library names,
//! segment range and a size/flags table) followed by a sequence of typed
//! blocks. Only the block types produced by AMOS tooling are handled.

use crate::error::{AmosError, Result};
use crate::formats::{latin1, read_bytes, read_u32};
use serde::Serialize;
use std::fmt;

/// Hunk block type tags.
pub mod block {
    pub const CODE: u32 = 0x3E9;
    pub const DATA: u32 = 0x3EA;
    pub const BSS: u32 = 0x3EB;
    pub const RELOC32: u32 = 0x3EC;
    pub const END: u32 = 0x3F2;
    pub const HEADER: u32 = 0x3F3;
}

/// Block tags carry memory flags in their top 3 bits.
const TYPE_MASK: u32 = 0x1FFF_FFFF;

/// Size table entries carry memory flags in their top 2 bits.
const SIZE_MASK: u32 = 0x3FFF_FFFF;

/// Memory placement requested for a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Any memory
    Any,
    /// Chip memory (bit 30)
    Chip,
    /// Fast memory (bit 31)
    Fast,
    /// Both bits set: an extended attribute word follows on real loaders
    Extended,
}

impl MemoryType {
    fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => MemoryType::Any,
            1 => MemoryType::Chip,
            2 => MemoryType::Fast,
            _ => MemoryType::Extended,
        }
    }

    fn bits(self) -> u32 {
        match self {
            MemoryType::Any => 0,
            MemoryType::Chip => 1,
            MemoryType::Fast => 2,
            MemoryType::Extended => 3,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryType::Any => "any",
            MemoryType::Chip => "chip",
            MemoryType::Fast => "fast",
            MemoryType::Extended => "ext",
        };
        write!(f, "{}", name)
    }
}

/// One entry of the header's size table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HunkSize {
    /// Segment length in bytes
    pub length: u32,
    /// Requested memory type
    pub memory: MemoryType,
}

impl HunkSize {
    /// Decode a raw size table word.
    pub fn from_word(word: u32) -> Self {
        Self {
            length: (word & SIZE_MASK) * 4,
            memory: MemoryType::from_bits(word >> 30),
        }
    }

    /// Encode back into a raw size table word.
    pub fn to_word(self) -> u32 {
        ((self.length / 4) & SIZE_MASK) | (self.memory.bits() << 30)
    }
}

/// Relocations against one target segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocBlock {
    /// Segment the relocated longwords point into
    pub target: u32,
    /// Byte offsets of the longwords to relocate
    pub offsets: Vec<u32>,
}

/// A single block of a hunk file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hunk {
    /// Executable bytes
    Code(Vec<u8>),
    /// Initialized data bytes
    Data(Vec<u8>),
    /// 32-bit absolute relocations for the preceding segment
    Reloc32(Vec<RelocBlock>),
    /// Segment terminator
    End,
}

/// Hunk kind without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkKind {
    Code,
    Data,
    Reloc32,
    End,
}

impl fmt::Display for HunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HunkKind::Code => "HUNK_CODE",
            HunkKind::Data => "HUNK_DATA",
            HunkKind::Reloc32 => "HUNK_RELOC32",
            HunkKind::End => "HUNK_END",
        };
        write!(f, "{}", name)
    }
}

impl Hunk {
    /// Kind of this block.
    pub fn kind(&self) -> HunkKind {
        match self {
            Hunk::Code(_) => HunkKind::Code,
            Hunk::Data(_) => HunkKind::Data,
            Hunk::Reloc32(_) => HunkKind::Reloc32,
            Hunk::End => HunkKind::End,
        }
    }

    /// Payload bytes of a code or data block.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Hunk::Code(data) | Hunk::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Whether this block opens a new segment.
    pub fn is_segment(&self) -> bool {
        matches!(self, Hunk::Code(_) | Hunk::Data(_))
    }
}

/// A parsed hunk file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkFile {
    /// Every declared segment is present.
    Complete {
        sizes: Vec<HunkSize>,
        hunks: Vec<Hunk>,
    },
    /// Only segments `first..=last` of a larger program are present.
    Partial {
        first: u32,
        last: u32,
        sizes: Vec<HunkSize>,
        hunks: Vec<Hunk>,
    },
}

impl HunkFile {
    /// Blocks in file order.
    pub fn hunks(&self) -> &[Hunk] {
        match self {
            HunkFile::Complete { hunks, .. } | HunkFile::Partial { hunks, .. } => hunks,
        }
    }

    /// Size table from the header.
    pub fn sizes(&self) -> &[HunkSize] {
        match self {
            HunkFile::Complete { sizes, .. } | HunkFile::Partial { sizes, .. } => sizes,
        }
    }

    /// Whether all declared segments are present.
    pub fn is_complete(&self) -> bool {
        matches!(self, HunkFile::Complete { .. })
    }

    /// Kinds of all blocks, in order.
    pub fn kinds(&self) -> Vec<HunkKind> {
        self.hunks().iter().map(Hunk::kind).collect()
    }

    /// Consume the file and return its blocks.
    pub fn into_hunks(self) -> Vec<Hunk> {
        match self {
            HunkFile::Complete { hunks, .. } | HunkFile::Partial { hunks, .. } => hunks,
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32> {
        let value = read_u32(self.data, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = read_bytes(self.data, self.pos, len)?;
        self.pos += len;
        Ok(bytes)
    }

    fn longwords(&mut self, count: u32) -> Result<&'a [u8]> {
        let len = (count as usize)
            .checked_mul(4)
            .ok_or(AmosError::TruncatedData {
                offset: self.pos,
                expected: usize::MAX,
                actual: self.remaining(),
            })?;
        self.bytes(len)
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Parse a hunk file.
pub fn parse(data: &[u8]) -> Result<HunkFile> {
    let mut r = Reader::new(data);

    let magic = r.u32()?;
    if magic != block::HEADER {
        return Err(AmosError::InvalidMagic {
            expected: format!("0x{:08X}", block::HEADER),
            actual: format!("0x{:08X}", magic),
        });
    }

    let mut libraries = Vec::new();
    loop {
        let len = r.u32()? as usize;
        let name = trim_nul(r.bytes(len)?);
        if name.is_empty() {
            break;
        }
        libraries.push(latin1(name));
    }
    if !libraries.is_empty() {
        return Err(AmosError::ResidentLibraries { names: libraries });
    }

    let total = r.u32()?;
    let first = r.u32()?;
    let last = r.u32()?;
    if last < first || u64::from(last) + 1 > u64::from(total) {
        return Err(AmosError::InvalidHunkRange { first, last, total });
    }

    let mut sizes = Vec::with_capacity((total as usize).min(r.remaining() / 4));
    for _ in 0..total {
        sizes.push(HunkSize::from_word(r.u32()?));
    }

    let mut hunks = Vec::new();
    let mut segments = 0u32;
    while r.remaining() > 0 {
        let offset = r.pos;
        let tag = r.u32()? & TYPE_MASK;
        match tag {
            block::CODE | block::DATA => {
                let count = r.u32()?;
                let body = r.longwords(count)?.to_vec();
                hunks.push(if tag == block::CODE {
                    Hunk::Code(body)
                } else {
                    Hunk::Data(body)
                });
                segments += 1;
            }
            block::RELOC32 => {
                let mut blocks = Vec::new();
                loop {
                    let count = r.u32()?;
                    if count == 0 {
                        break;
                    }
                    let target = r.u32()?;
                    let offsets = r
                        .longwords(count)?
                        .chunks_exact(4)
                        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                        .collect();
                    blocks.push(RelocBlock { target, offsets });
                }
                hunks.push(Hunk::Reloc32(blocks));
            }
            block::END => hunks.push(Hunk::End),
            value => return Err(AmosError::UnknownHunkType { value, offset }),
        }
    }

    tracing::trace!(total, first, last, segments, "parsed hunk file");

    if segments == total {
        Ok(HunkFile::Complete { sizes, hunks })
    } else {
        Ok(HunkFile::Partial {
            first,
            last,
            sizes,
            hunks,
        })
    }
}

/// Serialize a hunk file.
///
/// The resident library list is always written empty.
pub fn write(file: &HunkFile) -> Vec<u8> {
    let sizes = file.sizes();
    let (first, last) = match file {
        HunkFile::Complete { .. } => (0, (sizes.len() as u32).saturating_sub(1)),
        HunkFile::Partial { first, last, .. } => (*first, *last),
    };

    let mut out = Vec::new();
    let mut put = |value: u32| out.extend_from_slice(&value.to_be_bytes());
    put(block::HEADER);
    put(0);
    put(sizes.len() as u32);
    put(first);
    put(last);
    for size in sizes {
        put(size.to_word());
    }

    for hunk in file.hunks() {
        match hunk {
            Hunk::Code(body) | Hunk::Data(body) => {
                put(if matches!(hunk, Hunk::Code(_)) {
                    block::CODE
                } else {
                    block::DATA
                });
                let longs = (body.len() + 3) / 4;
                put(longs as u32);
                for chunk in body.chunks(4) {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    put(u32::from_be_bytes(word));
                }
            }
            Hunk::Reloc32(blocks) => {
                put(block::RELOC32);
                for reloc in blocks.iter().filter(|b| !b.offsets.is_empty()) {
                    put(reloc.offsets.len() as u32);
                    put(reloc.target);
                    for &offset in &reloc.offsets {
                        put(offset);
                    }
                }
                put(0);
            }
            Hunk::End => put(block::END),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn be(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_parse_single_code_hunk() {
        let data = be(&[
            block::HEADER,
            0,
            1,
            0,
            0,
            2,
            block::CODE,
            2,
            0x4E71_4E71,
            0x4E75_0000,
            block::END,
        ]);
        let file = parse(&data).unwrap();
        assert!(file.is_complete());
        assert_eq!(file.sizes(), &[HunkSize::from_word(2)]);
        assert_eq!(file.sizes()[0].length, 8);
        assert_eq!(
            file.hunks(),
            &[
                Hunk::Code(vec![0x4E, 0x71, 0x4E, 0x71, 0x4E, 0x75, 0, 0]),
                Hunk::End
            ]
        );
    }

    #[test]
    fn test_memory_flags_and_type_mask() {
        let data = be(&[
            block::HEADER,
            0,
            1,
            0,
            0,
            0x4000_0001,
            0x4000_0000 | block::DATA,
            1,
            0xDEAD_BEEF,
            block::END,
        ]);
        let file = parse(&data).unwrap();
        assert_eq!(file.sizes()[0].memory, MemoryType::Chip);
        assert_eq!(file.kinds(), vec![HunkKind::Data, HunkKind::End]);
    }

    #[test]
    fn test_partial_file() {
        let data = be(&[block::HEADER, 0, 3, 1, 1, 1, 1, 1, block::CODE, 1, 0, block::END]);
        match parse(&data).unwrap() {
            HunkFile::Partial { first, last, sizes, hunks } => {
                assert_eq!((first, last), (1, 1));
                assert_eq!(sizes.len(), 3);
                assert_eq!(hunks.len(), 2);
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_magic() {
        let data = be(&[0x3E7, 0]);
        assert!(matches!(parse(&data), Err(AmosError::InvalidMagic { .. })));
    }

    #[test]
    fn test_rejects_resident_libraries() {
        let mut data = be(&[block::HEADER, 8]);
        data.extend_from_slice(b"dos.lib\0");
        data.extend_from_slice(&be(&[0, 1, 0, 0, 0]));
        match parse(&data) {
            Err(AmosError::ResidentLibraries { names }) => assert_eq!(names, vec!["dos.lib"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nul_padded_terminator_ends_library_list() {
        let data = be(&[block::HEADER, 4, 0, 1, 0, 0, 0, block::END]);
        assert!(parse(&data).is_ok());
    }

    #[test]
    fn test_rejects_bad_range() {
        let data = be(&[block::HEADER, 0, 1, 1, 0]);
        assert!(matches!(
            parse(&data),
            Err(AmosError::InvalidHunkRange { .. })
        ));
        let data = be(&[block::HEADER, 0, 2, 0, 2]);
        assert!(matches!(
            parse(&data),
            Err(AmosError::InvalidHunkRange { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let data = be(&[block::HEADER, 0, 1, 0, 0, 0, block::BSS, 0]);
        assert!(matches!(
            parse(&data),
            Err(AmosError::UnknownHunkType {
                value: block::BSS,
                offset: 24
            })
        ));
    }

    #[test]
    fn test_rejects_truncated_body() {
        let data = be(&[block::HEADER, 0, 1, 0, 0, 4, block::CODE, 4, 0]);
        assert!(matches!(parse(&data), Err(AmosError::TruncatedData { .. })));
    }

    #[test]
    fn test_write_then_parse() {
        let file = HunkFile::Complete {
            sizes: vec![
                HunkSize {
                    length: 8,
                    memory: MemoryType::Any,
                },
                HunkSize {
                    length: 4,
                    memory: MemoryType::Fast,
                },
            ],
            hunks: vec![
                Hunk::Code(vec![0x4E, 0xB9, 0, 0, 0, 4, 0x4E, 0x75]),
                Hunk::Reloc32(vec![RelocBlock {
                    target: 1,
                    offsets: vec![2],
                }]),
                Hunk::End,
                Hunk::Data(vec![1, 2, 3, 4]),
                Hunk::End,
            ],
        };
        let bytes = write(&file);
        assert_eq!(&bytes[..4], &[0, 0, 3, 0xF3]);
        assert_eq!(parse(&bytes).unwrap(), file);
    }

    #[test]
    fn test_write_pads_to_longwords() {
        let file = HunkFile::Complete {
            sizes: vec![HunkSize::from_word(1)],
            hunks: vec![Hunk::Code(vec![0x4E, 0x75]), Hunk::End],
        };
        let parsed = parse(&write(&file)).unwrap();
        assert_eq!(parsed.hunks()[0], Hunk::Code(vec![0x4E, 0x75, 0, 0]));
    }
}
