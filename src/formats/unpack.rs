//! Recognition of packed executables.
//!
//! A packed hunk file is a decrunch stub plus its payload. Only three exact
//! stub shapes are recognized; anything else is returned unchanged.

use crate::compression::{powerpacker, stonecracker};
use crate::error::{Result, ResultExt};
use crate::formats::hunk::{self, Hunk, HunkFile};
use crate::formats::{md5_hex, read_u32};
use serde::Serialize;
use std::fmt;

const PP_STUB_LEN: usize = 632;
const PP_STUB_TABLE: usize = 0x26C;
const PP_SHORT_STUB_LEN: usize = 548;
const PP_SHORT_STUB_TABLE: usize = 540;
const PP_STUB_LENGTH_FIELD: usize = 0x20;

const SC_STUB_LEN: usize = 76;
const SC_STUB_MD5: &str = "769130d87b9517f4ba90889f2a392dd9";
const SC_LOADER_LEN: usize = 396;
const SC_LOADER_MD5: &str = "cd6e1a62d3dfdc1a59d8a050a855b3ae";
const SC_PAYLOAD_OFFSET: usize = 392;

/// Packer recognized from a stub shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Packer {
    /// PowerPacker with its 632-byte stub
    PowerPacker,
    /// PowerPacker with the shorter 548-byte stub
    PowerPackerShort,
    /// StoneCracker 4.04
    StoneCracker,
}

impl fmt::Display for Packer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Packer::PowerPacker => "PowerPacker",
            Packer::PowerPackerShort => "PowerPacker (short stub)",
            Packer::StoneCracker => "StoneCracker 4.04",
        };
        write!(f, "{}", name)
    }
}

/// Identify the packer stub of a complete hunk file.
pub fn detect_packer(file: &HunkFile) -> Option<Packer> {
    let HunkFile::Complete { hunks, .. } = file else {
        return None;
    };

    match hunks.as_slice() {
        [Hunk::Code(stub), Hunk::End, Hunk::Data(payload), Hunk::End] => {
            let packer = match stub.len() {
                PP_STUB_LEN => Packer::PowerPacker,
                PP_SHORT_STUB_LEN => Packer::PowerPackerShort,
                _ => return None,
            };
            let declared = read_u32(stub, PP_STUB_LENGTH_FIELD).ok()? as usize;
            (4..=payload.len()).contains(&declared).then_some(packer)
        }
        [Hunk::Code(stub), Hunk::Code(loader), Hunk::End] => {
            let matches = stub.len() == SC_STUB_LEN
                && loader.len() > SC_LOADER_LEN
                && md5_hex(stub) == SC_STUB_MD5
                && md5_hex(&loader[..SC_LOADER_LEN]) == SC_LOADER_MD5;
            matches.then_some(Packer::StoneCracker)
        }
        _ => None,
    }
}

fn offset_table(stub: &[u8], at: usize) -> [u8; 4] {
    [stub[at], stub[at + 1], stub[at + 2], stub[at + 3]]
}

/// Decrunch a packed hunk file, or return it unchanged if no stub matches.
pub fn unpack_hunk_file(file: HunkFile) -> Result<HunkFile> {
    let Some(packer) = detect_packer(&file) else {
        return Ok(file);
    };
    tracing::debug!(%packer, "recognized packer stub");

    let unpacked = match (packer, file.hunks()) {
        (Packer::PowerPacker, [Hunk::Code(stub), _, Hunk::Data(payload), _]) => Some(
            powerpacker::unpack(payload, offset_table(stub, PP_STUB_TABLE))?,
        ),
        (Packer::PowerPackerShort, [Hunk::Code(stub), _, Hunk::Data(payload), _]) => Some(
            powerpacker::unpack(payload, offset_table(stub, PP_SHORT_STUB_TABLE))?,
        ),
        (Packer::StoneCracker, [_, Hunk::Code(loader), _]) => {
            let image = stonecracker::unpack(&loader[SC_PAYLOAD_OFFSET..])?;
            Some(stonecracker::to_hunk_bytes(&image)?)
        }
        _ => None,
    };

    match unpacked {
        Some(bytes) => hunk::parse(&bytes).context(format!("parsing {} output", packer)),
        None => Ok(file),
    }
}

/// Parse a hunk file and decrunch it when packed.
pub fn parse_unpacked(data: &[u8]) -> Result<HunkFile> {
    unpack_hunk_file(hunk::parse(data)?)
}
