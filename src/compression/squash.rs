//! The "xVdg" squash codec used by the AMOS compiler.
//!
//! Layout: `"xVdg"`, big-endian buffer size, big-endian compressed size, then
//! the compressed region. The region is consumed as 32-bit words from its
//! end: decompressed size, checksum seed, initial bit register, then the bit
//! stream. Every bit-register word is folded into an XOR checksum that must
//! be zero once the output is complete, and the stream must be used up.

use crate::error::{AmosError, Codec, Result};
use crate::formats::{magic, read_u32};

const HEADER_LEN: usize = 12;

/// Whether a hunk body carries a squashed payload.
pub fn is_squashed(data: &[u8]) -> bool {
    data.len() > HEADER_LEN && data[..4] == magic::SQUASH
}

/// Backward 32-bit bit register with a sentinel bit and running checksum.
struct SquashBits<'a> {
    data: &'a [u8],
    pos: usize,
    bits: u32,
    checksum: u32,
}

impl<'a> SquashBits<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: data.len(),
            bits: 0,
            checksum: 0,
        }
    }

    fn read_long(&mut self) -> Result<u32> {
        if self.pos < 4 {
            return Err(AmosError::InputExhausted {
                codec: Codec::Squash,
                offset: self.pos,
            });
        }
        self.pos -= 4;
        read_u32(self.data, self.pos)
    }

    fn bit(&mut self) -> Result<u32> {
        let mut carry = self.bits & 1;
        self.bits >>= 1;
        if self.bits == 0 {
            let word = self.read_long()?;
            self.checksum ^= word;
            carry = word & 1;
            self.bits = (word >> 1) | 0x8000_0000;
        }
        Ok(carry)
    }

    fn bits(&mut self, count: u32) -> Result<u32> {
        let mut value = 0;
        for _ in 0..count {
            value = (value << 1) | self.bit()?;
        }
        Ok(value)
    }
}

/// Backward-growing output buffer.
struct Output {
    buf: Vec<u8>,
    pos: usize,
}

impl Output {
    fn literal(&mut self, value: u32) -> Result<()> {
        if self.pos == 0 {
            return Err(AmosError::OutputOverrun {
                codec: Codec::Squash,
                needed: 1,
                remaining: 0,
            });
        }
        self.pos -= 1;
        self.buf[self.pos] = value as u8;
        Ok(())
    }

    fn copy_back(&mut self, offset: u32, count: u32) -> Result<()> {
        if count as usize > self.pos {
            return Err(AmosError::OutputOverrun {
                codec: Codec::Squash,
                needed: count as usize,
                remaining: self.pos,
            });
        }
        for _ in 0..count {
            self.pos -= 1;
            let src = self.pos + offset as usize;
            if src >= self.buf.len() {
                return Err(AmosError::BackReferenceOutOfRange {
                    codec: Codec::Squash,
                    source_index: src,
                    length: self.buf.len(),
                });
            }
            self.buf[self.pos] = self.buf[src];
        }
        Ok(())
    }
}

/// Decompress a squashed hunk body.
pub fn unsquash(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < HEADER_LEN {
        return Err(AmosError::TruncatedData {
            offset: 0,
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }
    if data[..4] != magic::SQUASH {
        return Err(AmosError::InvalidMagic {
            expected: "xVdg".to_string(),
            actual: hex::encode(&data[..4]),
        });
    }

    let buffer_size = read_u32(data, 4)? as usize;
    let compressed_size = read_u32(data, 8)? as usize;
    let available = data.len() - HEADER_LEN;
    if compressed_size > available {
        return Err(AmosError::TruncatedData {
            offset: HEADER_LEN,
            expected: compressed_size,
            actual: available,
        });
    }
    if compressed_size < 12 {
        return Err(AmosError::malformed(
            Codec::Squash,
            format!("compressed region of {} bytes has no trailer", compressed_size),
        ));
    }
    let compressed = &data[HEADER_LEN..HEADER_LEN + compressed_size];

    let mut bits = SquashBits::new(compressed);
    let decompressed_size = bits.read_long()? as usize;
    if decompressed_size > buffer_size {
        return Err(AmosError::malformed(
            Codec::Squash,
            format!(
                "decompressed size {} exceeds buffer size {}",
                decompressed_size, buffer_size
            ),
        ));
    }
    bits.checksum = bits.read_long()?;
    bits.bits = bits.read_long()?;
    bits.checksum ^= bits.bits;

    tracing::debug!(buffer_size, compressed_size, decompressed_size, "unsquashing");

    let mut out = Output {
        buf: vec![0; buffer_size],
        pos: decompressed_size,
    };

    while out.pos > 0 {
        if bits.bit()? == 0 {
            if bits.bit()? == 0 {
                let count = bits.bits(3)? + 1;
                for _ in 0..count {
                    let value = bits.bits(8)?;
                    out.literal(value)?;
                }
            } else {
                let offset = bits.bits(8)?;
                out.copy_back(offset, 2)?;
            }
        } else {
            match bits.bits(2)? {
                0 => {
                    let offset = bits.bits(9)?;
                    out.copy_back(offset, 3)?;
                }
                1 => {
                    let offset = bits.bits(10)?;
                    out.copy_back(offset, 4)?;
                }
                2 => {
                    let count = bits.bits(8)? + 1;
                    let offset = bits.bits(12)?;
                    out.copy_back(offset, count)?;
                }
                _ => {
                    let count = bits.bits(8)? + 9;
                    for _ in 0..count {
                        let value = bits.bits(8)?;
                        out.literal(value)?;
                    }
                }
            }
        }
    }

    if bits.checksum != 0 {
        return Err(AmosError::ChecksumMismatch {
            residual: bits.checksum,
        });
    }
    // Only the sentinel bit may remain once every word has been read.
    if bits.pos != 0 || !bits.bits.is_power_of_two() {
        return Err(AmosError::UnconsumedInput {
            codec: Codec::Squash,
            bytes: bits.pos,
            register: bits.bits,
        });
    }

    out.buf.truncate(decompressed_size);
    Ok(out.buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use pretty_assertions::assert_eq;

    /// Bit writer producing streams in the order `SquashBits` consumes them.
    #[derive(Default)]
    pub(crate) struct SquashWriter {
        bits: Vec<u32>,
    }

    impl SquashWriter {
        pub(crate) fn put(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                self.bits.push((value >> i) & 1);
            }
        }

        /// Encode `data` as literal runs, last byte first.
        pub(crate) fn literals(&mut self, data: &[u8]) {
            for chunk in data.rchunks(8) {
                self.put(0, 1);
                self.put(0, 1);
                self.put(chunk.len() as u32 - 1, 3);
                for &b in chunk.iter().rev() {
                    self.put(u32::from(b), 8);
                }
            }
        }

        /// Compressed region: refill words (last consumed first), initial
        /// register, checksum seed, decompressed size.
        pub(crate) fn region(&self, decompressed_size: u32, prefix: &[u8]) -> Vec<u8> {
            let words: Vec<u32> = self
                .bits
                .chunks(32)
                .map(|chunk| {
                    chunk
                        .iter()
                        .enumerate()
                        .fold(0u32, |acc, (i, &b)| acc | (b << i))
                })
                .collect();
            let initial = 1u32;
            let seed = words.iter().fold(initial, |acc, w| acc ^ w);

            let mut out = prefix.to_vec();
            for w in words.iter().rev() {
                out.extend_from_slice(&w.to_be_bytes());
            }
            out.extend_from_slice(&initial.to_be_bytes());
            out.extend_from_slice(&seed.to_be_bytes());
            out.extend_from_slice(&decompressed_size.to_be_bytes());
            out
        }

        pub(crate) fn finish(&self, decompressed_size: u32, buffer_size: u32) -> Vec<u8> {
            wrap(&self.region(decompressed_size, &[]), buffer_size)
        }
    }

    pub(crate) fn wrap(region: &[u8], buffer_size: u32) -> Vec<u8> {
        let mut out = b"xVdg".to_vec();
        out.extend_from_slice(&buffer_size.to_be_bytes());
        out.extend_from_slice(&(region.len() as u32).to_be_bytes());
        out.extend_from_slice(region);
        out
    }

    /// Squash `data` using literal runs only.
    pub(crate) fn squash_literals(data: &[u8]) -> Vec<u8> {
        let mut w = SquashWriter::default();
        w.literals(data);
        w.finish(data.len() as u32, data.len() as u32)
    }

    #[test]
    fn test_literal_runs() {
        let data: Vec<u8> = (0..37u8).map(|i| i.wrapping_mul(7)).collect();
        assert_eq!(unsquash(&squash_literals(&data)).unwrap(), data);
    }

    #[test]
    fn test_back_references() {
        let mut w = SquashWriter::default();
        w.literals(&[1, 2, 3, 4]);
        // short copy: offset 4, two bytes
        w.put(0b01, 2);
        w.put(4, 8);
        w.put(0b01, 2);
        w.put(4, 8);
        let packed = w.finish(8, 8);
        assert_eq!(unsquash(&packed).unwrap(), vec![1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn test_long_modes() {
        let mut w = SquashWriter::default();
        w.literals(&[9, 8, 7]);
        // mode 0: copy 3 at offset 3
        w.put(1, 1);
        w.put(0, 2);
        w.put(3, 9);
        // mode 2: copy 5 at offset 6
        w.put(1, 1);
        w.put(2, 2);
        w.put(4, 8);
        w.put(6, 12);
        // mode 3: extended literal run of 9
        w.put(1, 1);
        w.put(3, 2);
        w.put(0, 8);
        for b in (10..19u8).rev() {
            w.put(u32::from(b), 8);
        }
        let packed = w.finish(20, 24);
        let mut expected: Vec<u8> = (10..19).collect();
        expected.extend_from_slice(&[8, 7, 9, 8, 7, 9, 8, 7, 9, 8, 7]);
        assert_eq!(unsquash(&packed).unwrap(), expected);
    }

    #[test]
    fn test_seed_bit_flips_are_detected() {
        let packed = squash_literals(b"AMOS Professional");
        let seed_at = packed.len() - 8;
        for bit in 0..32 {
            let mut corrupt = packed.clone();
            corrupt[seed_at + 3 - bit / 8] ^= 1 << (bit % 8);
            let err = unsquash(&corrupt).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Integrity);
        }
    }

    #[test]
    fn test_trailer_bit_flips_are_detected() {
        let data = b"AMOS Professional";
        let packed = squash_literals(data);
        let trailer_at = packed.len() - 12;
        for byte in 0..12 {
            for bit in 0..8 {
                let mut corrupt = packed.clone();
                corrupt[trailer_at + byte] ^= 1 << bit;
                assert!(
                    unsquash(&corrupt).is_err(),
                    "trailer byte {} bit {} decoded silently",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_shrunk_size_leaves_input() {
        let mut packed = squash_literals(b"AMOS Professional");
        let last = packed.len() - 1;
        packed[last] = 16;
        let err = unsquash(&packed).unwrap_err();
        assert!(matches!(err, AmosError::UnconsumedInput { bytes: 0, .. }));
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }

    #[test]
    fn test_unread_words_are_rejected() {
        let data = b"hello".to_vec();
        let mut w = SquashWriter::default();
        w.literals(&data);
        let clean = wrap(&w.region(5, &[]), 5);
        let padded = wrap(&w.region(5, &[0, 0, 0, 0]), 5);
        assert_eq!(unsquash(&clean).unwrap(), data);
        assert!(matches!(
            unsquash(&padded),
            Err(AmosError::UnconsumedInput { bytes: 4, .. })
        ));
    }

    #[test]
    fn test_compensating_flips_escape_checksum() {
        // The same bit flipped in two consumed words cancels in the XOR fold.
        // Stream bits 10 and 42 are both literal data of the final run.
        let data = b"AMOS Professional";
        let mut packed = squash_literals(data);
        let words_end = packed.len() - 12;
        for word in 0..2 {
            let start = words_end - (word + 1) * 4;
            packed[start + 2] ^= 0x04;
        }
        let out = unsquash(&packed).unwrap();
        assert_eq!(out.len(), data.len());
        assert_ne!(out, data.to_vec());
    }

    #[test]
    fn test_back_reference_out_of_range() {
        let mut w = SquashWriter::default();
        w.literals(&[1, 2]);
        w.put(0b01, 2);
        w.put(200, 8);
        let err = unsquash(&w.finish(4, 4)).unwrap_err();
        assert!(matches!(err, AmosError::BackReferenceOutOfRange { .. }));
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(
            unsquash(b"xVdg"),
            Err(AmosError::TruncatedData { .. })
        ));
        assert!(matches!(
            unsquash(b"abcd\0\0\0\0\0\0\0\0"),
            Err(AmosError::InvalidMagic { .. })
        ));
        let mut truncated = squash_literals(b"abc");
        truncated.pop();
        assert!(matches!(
            unsquash(&truncated),
            Err(AmosError::TruncatedData { .. })
        ));
        let oversized = SquashWriter::default().finish(8, 4);
        assert!(matches!(
            unsquash(&oversized),
            Err(AmosError::MalformedStream { .. })
        ));
    }

    #[test]
    fn test_is_squashed() {
        assert!(is_squashed(&squash_literals(b"x")));
        assert!(!is_squashed(b"xVdg\0\0\0\0\0\0\0\0"));
    }
}
