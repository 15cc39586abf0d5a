//! StoneCracker 4.04 ("S404") decruncher.
//!
//! Header: `"S404"`, security length, raw size, packed length (all 32-bit
//! big-endian). The packed stream is read as 16-bit words from its end; the
//! last three words hold the residual bit count, the first partial bit word
//! and the `eff` long-distance width. Tokens start with a 9-bit prefix.

use crate::error::{AmosError, Codec, Result};
use crate::formats::hunk::{self, Hunk, HunkFile, HunkSize};
use crate::formats::{magic, read_u16, read_u32};

const HEADER_LEN: usize = 16;

/// Backward 16-bit word accumulator, consumed MSB-first.
struct S404Bits<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    count: u32,
}

impl<'a> S404Bits<'a> {
    fn refill(&mut self) -> Result<()> {
        if self.pos < HEADER_LEN {
            return Err(AmosError::InputExhausted {
                codec: Codec::StoneCracker,
                offset: self.pos,
            });
        }
        let word = u32::from(read_u16(self.data, self.pos)?);
        self.pos -= 2;
        self.buffer = (self.buffer << 16) | word;
        self.count += 16;
        Ok(())
    }

    fn bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!((1..=16).contains(&n));
        while self.count < n {
            self.refill()?;
        }
        let shift = self.count - n;
        let value = (self.buffer >> shift) & ((1 << n) - 1);
        self.count -= n;
        self.buffer &= (1u32 << self.count) - 1;
        Ok(value)
    }

    fn long_distance(&mut self, low: u32, extra: u32) -> Result<u32> {
        Ok(((low << extra) | self.bits(extra)?) + 544)
    }
}

struct Output {
    buf: Vec<u8>,
    pos: usize,
}

impl Output {
    fn check(&self, len: u32) -> Result<()> {
        if len as usize > self.pos {
            return Err(AmosError::OutputOverrun {
                codec: Codec::StoneCracker,
                needed: len as usize,
                remaining: self.pos,
            });
        }
        Ok(())
    }

    fn literal(&mut self, value: u32) -> Result<()> {
        self.check(1)?;
        self.pos -= 1;
        self.buf[self.pos] = value as u8;
        Ok(())
    }

    fn copy_back(&mut self, len: u32, distance: u32) -> Result<()> {
        self.check(len)?;
        for _ in 0..len {
            let dst = self.pos - 1;
            let src = dst + distance as usize;
            if src >= self.buf.len() {
                return Err(AmosError::BackReferenceOutOfRange {
                    codec: Codec::StoneCracker,
                    source_index: src,
                    length: self.buf.len(),
                });
            }
            self.buf[dst] = self.buf[src];
            self.pos = dst;
        }
        Ok(())
    }
}

/// Decrunch an S404 stream.
pub fn unpack(packed: &[u8]) -> Result<Vec<u8>> {
    if packed.len() < HEADER_LEN {
        return Err(AmosError::TruncatedData {
            offset: 0,
            expected: HEADER_LEN,
            actual: packed.len(),
        });
    }
    if packed[..4] != magic::STONECRACKER {
        return Err(AmosError::InvalidMagic {
            expected: "S404".to_string(),
            actual: hex::encode(&packed[..4]),
        });
    }

    let raw_size = read_u32(packed, 8)? as usize;
    let packed_len = read_u32(packed, 12)? as usize;
    let tail = HEADER_LEN
        .checked_add(packed_len)
        .filter(|tail| tail.saturating_add(2) <= packed.len())
        .ok_or(AmosError::TruncatedData {
            offset: HEADER_LEN,
            expected: packed_len.saturating_add(2),
            actual: packed.len() - HEADER_LEN,
        })?;

    let bit_count = u32::from(read_u16(packed, tail)? & 0xF);
    let value = u32::from(read_u16(packed, tail - 2)?);
    let eff = u32::from(read_u16(packed, tail - 4)?);
    if !(10..=14).contains(&eff) {
        return Err(AmosError::malformed(
            Codec::StoneCracker,
            format!("eff {} outside 10..=14", eff),
        ));
    }

    let mut bits = S404Bits {
        data: packed,
        pos: tail - 6,
        buffer: if bit_count > 0 {
            value >> (16 - bit_count)
        } else {
            0
        },
        count: bit_count,
    };

    tracing::debug!(raw_size, packed_len, eff, "decrunching StoneCracker data");

    let mut out = Output {
        buf: vec![0; raw_size],
        pos: raw_size,
    };

    while out.pos > 0 {
        let prefix = bits.bits(9)?;

        if prefix < 0x100 {
            out.literal(prefix)?;
            continue;
        }

        if prefix == 0x13E || prefix == 0x13F {
            let len = (((prefix << 4) | bits.bits(4)?) & 0x1F) + 14;
            out.check(len)?;
            for _ in 0..len {
                let value = bits.bits(8)?;
                out.literal(value)?;
            }
            continue;
        }

        let (len, distance) = if prefix >= 0x180 {
            let len = if prefix & 0x40 != 0 { 3 } else { 2 };
            let distance = if prefix & 0x20 != 0 {
                bits.long_distance(prefix & 0x1F, eff - 5)?
            } else if prefix & 0x30 != 0 {
                ((prefix & 0x0F) << 1) | bits.bits(1)?
            } else {
                (((prefix & 0x0F) << 5) | bits.bits(5)?) + 32
            };
            (len, distance)
        } else if prefix >= 0x140 {
            let len = ((prefix & 0x30) >> 4) + 4;
            let distance = if prefix & 0x08 != 0 {
                bits.long_distance(prefix & 0x07, eff - 3)?
            } else if prefix & 0x0C != 0 {
                ((prefix & 0x03) << 3) | bits.bits(3)?
            } else {
                (((prefix & 0x03) << 7) | bits.bits(7)?) + 32
            };
            (len, distance)
        } else if prefix >= 0x120 {
            let len = ((prefix & 0x1E) >> 1) + 8;
            let distance = if prefix & 0x01 != 0 {
                bits.bits(eff)? + 544
            } else {
                let t6 = bits.bits(6)?;
                if t6 & 0x20 != 0 {
                    t6 & 0x1F
                } else {
                    ((t6 << 4) | bits.bits(4)?) + 32
                }
            };
            (len, distance)
        } else {
            let mut w = ((prefix & 0x1F) << 3) | bits.bits(3)?;
            let mut len = 23u32;
            while w == 0xFF {
                len = len.saturating_add(w);
                w = bits.bits(8)?;
            }
            len = len.saturating_add(w);

            let d7 = bits.bits(7)?;
            let distance = if d7 & 0x40 != 0 {
                bits.long_distance(d7 & 0x3F, eff - 6)?
            } else if d7 & 0x20 != 0 {
                d7 & 0x1F
            } else {
                ((d7 << 4) | bits.bits(4)?) + 32
            };
            (len, distance)
        };

        out.copy_back(len, distance + 1)?;
    }

    Ok(out.buf)
}

/// Rebuild a standard hunk file from a decrunched StoneCracker image.
///
/// The image holds `hunk_count - 1`, the size table, then per hunk a type
/// word, a longword count word and the data, closed by `0xFFFF`.
pub fn to_hunk_bytes(image: &[u8]) -> Result<Vec<u8>> {
    let count = read_u32(image, 0)?
        .checked_add(1)
        .ok_or_else(|| AmosError::malformed(Codec::StoneCracker, "hunk count overflow"))?
        as usize;
    let table_end = count
        .checked_mul(4)
        .and_then(|n| n.checked_add(4))
        .filter(|&end| end <= image.len())
        .ok_or(AmosError::TruncatedData {
            offset: 4,
            expected: count.saturating_mul(4),
            actual: image.len().saturating_sub(4),
        })?;

    let mut sizes = Vec::with_capacity(count);
    for i in 0..count {
        sizes.push(HunkSize::from_word(read_u32(image, 4 + i * 4)?));
    }

    let mut pos = table_end;
    let mut hunks = Vec::with_capacity(count * 2);
    for _ in 0..count {
        let type_word = read_u16(image, pos)?;
        let len = usize::from(read_u16(image, pos + 2)?) * 4;
        let data = crate::formats::read_bytes(image, pos + 4, len)?.to_vec();
        pos += 4 + len;

        if type_word & 0x4000 == 0 {
            return Err(AmosError::UnsupportedHunkWord { value: type_word });
        }
        hunks.push(if type_word & 0x8000 != 0 {
            Hunk::Data(data)
        } else {
            Hunk::Code(data)
        });
        hunks.push(Hunk::End);
    }

    if pos + 2 != image.len() || read_u16(image, pos)? != 0xFFFF {
        return Err(AmosError::malformed(
            Codec::StoneCracker,
            "hunk image is not terminated by 0xFFFF",
        ));
    }

    Ok(hunk::write(&HunkFile::Complete { sizes, hunks }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Bit writer producing streams in the order `S404Bits` consumes them.
    #[derive(Default)]
    struct S404Writer {
        bits: Vec<u16>,
    }

    impl S404Writer {
        fn put(&mut self, value: u32, count: u32) {
            for i in (0..count).rev() {
                self.bits.push(((value >> i) & 1) as u16);
            }
        }

        fn finish(&self, raw_size: u32, eff: u16, lead: usize) -> Vec<u8> {
            let lead = lead.min(self.bits.len());
            let value = self.bits[..lead]
                .iter()
                .enumerate()
                .fold(0u16, |acc, (i, &b)| acc | (b << (15 - i)));
            let words: Vec<u16> = self.bits[lead..]
                .chunks(16)
                .map(|c| {
                    c.iter()
                        .enumerate()
                        .fold(0u16, |acc, (i, &b)| acc | (b << (15 - i)))
                })
                .collect();

            let mut payload = Vec::new();
            for w in words.iter().rev() {
                payload.extend_from_slice(&w.to_be_bytes());
            }
            payload.extend_from_slice(&eff.to_be_bytes());
            payload.extend_from_slice(&value.to_be_bytes());

            let mut out = b"S404".to_vec();
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&raw_size.to_be_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            out.extend_from_slice(&payload);
            out.extend_from_slice(&(lead as u16).to_be_bytes());
            out
        }
    }

    #[test]
    fn test_literals_and_short_copies() {
        let mut w = S404Writer::default();
        for b in b"DCBA" {
            w.put(u32::from(*b), 9);
        }
        // copy 4 at distance 3
        w.put(0x144, 9);
        w.put(3, 3);
        // copy 2 at distance 3
        w.put(0x191, 9);
        w.put(1, 1);
        let packed = w.finish(10, 10, 0);
        assert_eq!(unpack(&packed).unwrap(), b"CDABCDABCD".to_vec());
    }

    #[test]
    fn test_partial_lead_word() {
        let mut w = S404Writer::default();
        for b in b"olleh" {
            w.put(u32::from(*b), 9);
        }
        let packed = w.finish(5, 12, 7);
        assert_eq!(unpack(&packed).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn test_literal_run() {
        let data: Vec<u8> = (100..114).collect();
        let mut w = S404Writer::default();
        w.put(0x13E, 9);
        w.put(0, 4);
        for &b in data.iter().rev() {
            w.put(u32::from(b), 8);
        }
        assert_eq!(unpack(&w.finish(14, 10, 0)).unwrap(), data);
    }

    #[test]
    fn test_long_copy_band() {
        let mut w = S404Writer::default();
        w.put(u32::from(b'a'), 9);
        w.put(u32::from(b'b'), 9);
        // copy 23 at distance 1
        w.put(0x100, 9);
        w.put(0, 3);
        w.put(0x21, 7);
        let expected: Vec<u8> = (0..25).map(|i| if i % 2 == 0 { b'a' } else { b'b' }).collect();
        assert_eq!(unpack(&w.finish(25, 10, 0)).unwrap(), expected);
    }

    #[test]
    fn test_eff_long_distance() {
        let mut w = S404Writer::default();
        let value = |i: usize| (i * 31 % 251) as u8;
        for i in (2..548).rev() {
            w.put(u32::from(value(i)), 9);
        }
        w.put(0x1A0, 9);
        w.put(0, 5);
        let out = unpack(&w.finish(548, 10, 0)).unwrap();
        // distance 544 copies from 545 bytes ahead
        assert_eq!(out[1], value(546));
        assert_eq!(out[0], value(545));
        assert_eq!(out[547], value(547));
    }

    #[test]
    fn test_copy_out_of_range() {
        let mut w = S404Writer::default();
        w.put(u32::from(b'z'), 9);
        w.put(0x191, 9);
        w.put(1, 1);
        let err = unpack(&w.finish(3, 10, 0)).unwrap_err();
        assert!(matches!(err, AmosError::BackReferenceOutOfRange { .. }));
    }

    #[test]
    fn test_header_validation() {
        assert!(matches!(
            unpack(b"S404"),
            Err(AmosError::TruncatedData { .. })
        ));
        let mut wrong = S404Writer::default().finish(0, 10, 0);
        wrong[0] = b'X';
        assert!(matches!(unpack(&wrong), Err(AmosError::InvalidMagic { .. })));
        let mut bad_eff = S404Writer::default().finish(0, 9, 0);
        assert!(matches!(
            unpack(&bad_eff),
            Err(AmosError::MalformedStream { .. })
        ));
        bad_eff.truncate(bad_eff.len() - 1);
        assert!(matches!(
            unpack(&bad_eff),
            Err(AmosError::TruncatedData { .. })
        ));
        assert_eq!(unpack(&S404Writer::default().finish(0, 14, 0)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_exhausted_input() {
        let mut w = S404Writer::default();
        w.put(u32::from(b'q'), 9);
        assert!(matches!(
            unpack(&w.finish(4, 10, 0)),
            Err(AmosError::InputExhausted { .. })
        ));
    }

    fn image(hunks: &[(u16, &[u8])]) -> Vec<u8> {
        let mut out = ((hunks.len() - 1) as u32).to_be_bytes().to_vec();
        for (_, data) in hunks {
            out.extend_from_slice(&((data.len() / 4) as u32).to_be_bytes());
        }
        for (type_word, data) in hunks {
            out.extend_from_slice(&type_word.to_be_bytes());
            out.extend_from_slice(&((data.len() / 4) as u16).to_be_bytes());
            out.extend_from_slice(data);
        }
        out.extend_from_slice(&[0xFF, 0xFF]);
        out
    }

    #[test]
    fn test_image_to_hunk_file() {
        let bytes = to_hunk_bytes(&image(&[
            (0x4000, &[0x4E, 0x71, 0x4E, 0x75]),
            (0xC000, &[1, 2, 3, 4, 5, 6, 7, 8]),
        ]))
        .unwrap();
        let file = hunk::parse(&bytes).unwrap();
        assert!(file.is_complete());
        assert_eq!(
            file.hunks(),
            &[
                Hunk::Code(vec![0x4E, 0x71, 0x4E, 0x75]),
                Hunk::End,
                Hunk::Data(vec![1, 2, 3, 4, 5, 6, 7, 8]),
                Hunk::End,
            ]
        );
        assert_eq!(file.sizes()[1].length, 8);
    }

    #[test]
    fn test_image_rejects_bss_and_bad_terminator() {
        assert!(matches!(
            to_hunk_bytes(&image(&[(0x0000, &[])])),
            Err(AmosError::UnsupportedHunkWord { value: 0 })
        ));
        let mut bad = image(&[(0x4000, &[0, 0, 0, 0])]);
        bad.push(0);
        assert!(to_hunk_bytes(&bad).is_err());
    }
}
