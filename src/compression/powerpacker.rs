//! PowerPacker decruncher.
//!
//! The packed stream is a sequence of big-endian longwords read from the end.
//! The final longword holds `(unpacked_length << 8) | skip_bits`; the one
//! before it starts the bit stream with its low `skip_bits` bits discarded.
//! Bits are taken LSB-first from each longword and assembled MSB-first into
//! values. Back-reference offset widths come from a 4-entry table stored in
//! the decrunch stub.

use crate::error::{AmosError, Codec, Result};
use crate::formats::read_u32;

/// Backward 32-bit bit window with an explicit count.
struct PowerPackerBits<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    count: u32,
}

impl<'a> PowerPackerBits<'a> {
    fn bit(&mut self) -> Result<u32> {
        if self.count == 0 {
            if self.pos < 4 {
                return Err(AmosError::InputExhausted {
                    codec: Codec::PowerPacker,
                    offset: self.pos,
                });
            }
            self.pos -= 4;
            self.buffer = read_u32(self.data, self.pos)?;
            self.count = 32;
        }
        let bit = self.buffer & 1;
        self.buffer >>= 1;
        self.count -= 1;
        Ok(bit)
    }

    fn bits(&mut self, count: u32) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.bit()?;
        }
        Ok(value)
    }

    /// Escalating length: `base` plus `width`-bit groups while a group is all ones.
    fn var_length(&mut self, width: u32, base: u32) -> Result<u32> {
        let all = (1 << width) - 1;
        let mut length = base;
        loop {
            let add = self.bits(width)?;
            length = length.saturating_add(add);
            if add != all {
                return Ok(length);
            }
        }
    }
}

fn overrun(needed: u32, remaining: usize) -> AmosError {
    AmosError::OutputOverrun {
        codec: Codec::PowerPacker,
        needed: needed as usize,
        remaining,
    }
}

/// Decrunch a PowerPacker stream with the stub's offset width table.
pub fn unpack(packed: &[u8], offset_bits: [u8; 4]) -> Result<Vec<u8>> {
    if packed.len() % 4 != 0 {
        return Err(AmosError::malformed(
            Codec::PowerPacker,
            format!("length {} is not a multiple of 4", packed.len()),
        ));
    }
    if packed.len() < 8 {
        return Err(AmosError::TruncatedData {
            offset: 0,
            expected: 8,
            actual: packed.len(),
        });
    }

    let trailer = read_u32(packed, packed.len() - 4)?;
    let unpacked_length = (trailer >> 8) as usize;
    let skip = trailer & 0xFF;
    if skip >= 32 {
        return Err(AmosError::malformed(
            Codec::PowerPacker,
            format!("skip bit count {} out of range", skip),
        ));
    }

    let pos = packed.len() - 8;
    let mut bits = PowerPackerBits {
        data: packed,
        pos,
        buffer: read_u32(packed, pos)? >> skip,
        count: 32 - skip,
    };

    tracing::debug!(unpacked_length, skip, ?offset_bits, "decrunching PowerPacker data");

    let mut out = vec![0u8; unpacked_length];
    let mut ptr = out.len();
    while ptr > 0 {
        if bits.bit()? == 0 {
            let count = bits.var_length(2, 1)?;
            if count as usize > ptr {
                return Err(overrun(count, ptr));
            }
            for _ in 0..count {
                ptr -= 1;
                out[ptr] = bits.bits(8)? as u8;
            }
        }
        if ptr == 0 {
            break;
        }

        let mode = bits.bits(2)? as usize;
        let (offset, length) = if mode == 3 {
            let width = if bits.bit()? == 0 {
                7
            } else {
                u32::from(offset_bits[3])
            };
            let offset = bits.bits(width)?;
            (offset, bits.var_length(3, 5)?)
        } else {
            let offset = bits.bits(u32::from(offset_bits[mode]))?;
            (offset, mode as u32 + 2)
        };

        if length as usize > ptr {
            return Err(overrun(length, ptr));
        }
        let source = ptr.saturating_add(offset as usize);
        if source >= out.len() {
            return Err(AmosError::BackReferenceOutOfRange {
                codec: Codec::PowerPacker,
                source_index: source,
                length: out.len(),
            });
        }
        for _ in 0..length {
            out[ptr - 1] = out[ptr + offset as usize];
            ptr -= 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) const TABLE: [u8; 4] = [9, 10, 11, 12];

    /// Bit writer producing streams in the order `PowerPackerBits` consumes them.
    #[derive(Default)]
    pub(crate) struct PowerPackerWriter {
        bits: Vec<u32>,
    }

    impl PowerPackerWriter {
        pub(crate) fn put(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                self.bits.push((value >> i) & 1);
            }
        }

        pub(crate) fn var_length(&mut self, value: u32, width: u32, base: u32) {
            let all = (1 << width) - 1;
            let mut rest = value - base;
            while rest >= all {
                self.put(all, width);
                rest -= all;
            }
            self.put(rest, width);
        }

        /// Literal run of `data`, written last byte first.
        pub(crate) fn literals(&mut self, data: &[u8]) {
            self.put(0, 1);
            self.var_length(data.len() as u32, 2, 1);
            for &b in data.iter().rev() {
                self.put(u32::from(b), 8);
            }
        }

        pub(crate) fn finish(&self, unpacked_length: u32, skip: u32) -> Vec<u8> {
            let first = (32 - skip) as usize;
            let mut words = Vec::new();
            let head = &self.bits[..first.min(self.bits.len())];
            words.push(
                head.iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, &b)| acc | (b << (i as u32 + skip))),
            );
            if self.bits.len() > first {
                for chunk in self.bits[first..].chunks(32) {
                    words.push(
                        chunk
                            .iter()
                            .enumerate()
                            .fold(0u32, |acc, (i, &b)| acc | (b << i)),
                    );
                }
            }
            let mut out = Vec::new();
            for w in words.iter().rev() {
                out.extend_from_slice(&w.to_be_bytes());
            }
            out.extend_from_slice(&((unpacked_length << 8) | skip).to_be_bytes());
            out
        }
    }

    /// Pack `data` as one literal run.
    pub(crate) fn crunch_literals(data: &[u8]) -> Vec<u8> {
        let mut w = PowerPackerWriter::default();
        w.literals(data);
        w.finish(data.len() as u32, 0)
    }

    #[test]
    fn test_single_literal_run() {
        let data: Vec<u8> = (0..=60u8).collect();
        assert_eq!(unpack(&crunch_literals(&data), TABLE).unwrap(), data);
    }

    #[test]
    fn test_short_matches() {
        let mut w = PowerPackerWriter::default();
        w.literals(b"abcXYZ");
        w.put(1, 2);
        w.put(2, 10);
        w.put(1, 1);
        w.put(1, 2);
        w.put(2, 10);
        let packed = w.finish(12, 5);
        assert_eq!(unpack(&packed, TABLE).unwrap(), b"abcabcabcXYZ".to_vec());
    }

    #[test]
    fn test_long_match_with_short_offset() {
        let mut w = PowerPackerWriter::default();
        w.literals(b"0123456789");
        w.put(3, 2);
        w.put(0, 1);
        w.put(9, 7);
        w.var_length(10, 3, 5);
        let packed = w.finish(20, 0);
        assert_eq!(
            unpack(&packed, TABLE).unwrap(),
            b"01234567890123456789".to_vec()
        );
    }

    #[test]
    fn test_long_match_with_table_offset() {
        let mut w = PowerPackerWriter::default();
        w.literals(b"xy");
        w.put(3, 2);
        w.put(1, 1);
        w.put(1, 12);
        w.var_length(6, 3, 5);
        let packed = w.finish(8, 0);
        assert_eq!(unpack(&packed, TABLE).unwrap(), b"xyxyxyxy".to_vec());
    }

    #[test]
    fn test_match_out_of_range() {
        let mut w = PowerPackerWriter::default();
        w.literals(b"ab");
        w.put(0, 2);
        w.put(5, 9);
        let err = unpack(&w.finish(4, 0), TABLE).unwrap_err();
        assert!(matches!(err, AmosError::BackReferenceOutOfRange { .. }));
    }

    #[test]
    fn test_literal_overrun() {
        let mut w = PowerPackerWriter::default();
        w.literals(b"abcd");
        let err = unpack(&w.finish(2, 0), TABLE).unwrap_err();
        assert!(matches!(err, AmosError::OutputOverrun { .. }));
    }

    #[test]
    fn test_exhausted_input() {
        let mut packed = crunch_literals(b"abcdefgh");
        let len = packed.len();
        // claim more output than the stream describes
        packed[len - 4..].copy_from_slice(&((64u32 << 8) | 0).to_be_bytes());
        assert!(unpack(&packed, TABLE).is_err());
    }

    #[test]
    fn test_header_validation() {
        assert!(matches!(
            unpack(&[0; 6], TABLE),
            Err(AmosError::MalformedStream { .. })
        ));
        assert!(matches!(
            unpack(&[0; 4], TABLE),
            Err(AmosError::TruncatedData { .. })
        ));
        assert!(matches!(
            unpack(&[0, 0, 0, 0, 0, 0, 1, 32], TABLE),
            Err(AmosError::MalformedStream { .. })
        ));
        assert_eq!(unpack(&[0; 8], TABLE).unwrap(), Vec::<u8>::new());
    }
}
