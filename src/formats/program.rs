//! AMOS compiled program parser.
//!
//! A compiled program is a hunk file of CODE/END pairs. Hunk 0 is a runtime
//! loader whose MD5 (with its relocation-dependent fields blanked) identifies
//! the layout of the hunks that follow. Any hunk may be squashed.

use crate::compression::squash;
use crate::error::{AmosError, Result, ResultExt};
use crate::formats::hunk::{Hunk, HunkFile};
use crate::formats::{magic, md5_hex, read_bytes, read_u16, read_u32, unpack};
use serde::Serialize;
use std::fmt;

const PRO_LOADER_LEN: usize = 2888;
const CLASSIC_LOADER_LENS: [usize; 3] = [2764, 2804, 2292];

const PRO_LOADERS: &[&str] = &["ddf9a12877a328162cecef459d9765a5"];
const CLASSIC_LOADERS: &[&str] = &[
    "0dbe48a6071ec6beae4239d26e7e8309",
    "2680a6b417c606c6fb6d6235cb127e7f",
    "7fcfb0d746a79495e277d9d08adc5e24",
];

const CLASSIC_MIN_HUNKS: usize = 8;
const PRO_MIN_HUNKS: usize = 9;

/// Relocation stream byte that skips ahead without recording.
const RELOC_SKIP: u8 = 1;
const RELOC_SKIP_DISTANCE: u32 = 508;

/// Runtime loader family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderKind {
    /// AMOS 1.x compiler output
    Classic,
    /// AMOS Professional compiler output
    Pro,
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderKind::Classic => write!(f, "Classic"),
            LoaderKind::Pro => write!(f, "Pro"),
        }
    }
}

/// A memory bank appended to the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bank {
    /// Sprite bank, including its `AmSp` header
    Sprites(Vec<u8>),
    /// Icon bank, including its `AmIc` header
    Icons(Vec<u8>),
    /// Numbered data bank
    Data { number: u32, flags: u16, data: Vec<u8> },
}

impl Bank {
    /// Short name of the bank kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Bank::Sprites(_) => "sprites",
            Bank::Icons(_) => "icons",
            Bank::Data { .. } => "bank",
        }
    }

    /// Bank contents.
    pub fn data(&self) -> &[u8] {
        match self {
            Bank::Sprites(data) | Bank::Icons(data) | Bank::Data { data, .. } => data,
        }
    }
}

/// A parsed AMOS compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmosProgram {
    pub loader: LoaderKind,
    pub loader_hash: String,
    pub flags: u32,
    /// Only Pro loaders carry a pivot
    pub pivot: Option<u32>,
    pub loader_hunk: Vec<u8>,
    pub main_hunk: Vec<u8>,
    pub relocation_hunk: Vec<u8>,
    /// Pro: dynamically linked library code
    pub dynamic_library: Option<Vec<u8>>,
    /// Classic: statically linked library code
    pub fixed_library: Option<Vec<u8>>,
    /// Pro: AMOS library, absent when empty
    pub amos_library: Option<Vec<u8>>,
    pub environment: Vec<u8>,
    pub mouse: Vec<u8>,
    pub default_font: Option<Vec<u8>>,
    pub key_map: Option<Vec<u8>>,
    pub default_bank: Option<Vec<u8>>,
    pub error_messages: Option<Vec<u8>>,
    pub main_relocations: Vec<u32>,
    pub library_relocations: Vec<u32>,
    pub banks: Vec<Bank>,
}

/// MD5 of a loader hunk with flags and pivot blanked.
pub fn loader_hash(loader: &[u8]) -> String {
    let mut copy = loader.to_vec();
    if copy.len() == PRO_LOADER_LEN {
        copy[2..6].fill(0);
        copy[8..12].fill(0);
    } else if CLASSIC_LOADER_LENS.contains(&copy.len()) {
        copy[2..4].fill(0);
    }
    md5_hex(&copy)
}

/// Identify a loader hunk by its blanked hash.
pub fn identify_loader(loader: &[u8]) -> Result<LoaderKind> {
    let hash = loader_hash(loader);
    if PRO_LOADERS.contains(&hash.as_str()) {
        Ok(LoaderKind::Pro)
    } else if CLASSIC_LOADERS.contains(&hash.as_str()) {
        Ok(LoaderKind::Classic)
    } else {
        Err(AmosError::UnknownLoader { hash })
    }
}

/// Read one zero-terminated relocation list starting at `*pos`.
fn read_relocations(stream: &[u8], pos: &mut usize) -> Vec<u32> {
    let mut relocations = Vec::new();
    let mut offset = 0u32;
    while let Some(&b) = stream.get(*pos) {
        *pos += 1;
        match b {
            0 => break,
            RELOC_SKIP => offset = offset.wrapping_add(RELOC_SKIP_DISTANCE),
            n => {
                offset = offset.wrapping_add(2 * u32::from(n));
                relocations.push(offset);
            }
        }
    }
    relocations
}

fn parse_bank(raw: &[u8], loader: LoaderKind) -> Result<Bank> {
    let body = match loader {
        LoaderKind::Classic => read_bytes(raw, 4, raw.len().saturating_sub(4))?,
        LoaderKind::Pro => raw,
    };
    match body.get(..4) {
        Some(id) if id == magic::SPRITE_BANK => return Ok(Bank::Sprites(body.to_vec())),
        Some(id) if id == magic::ICON_BANK => return Ok(Bank::Icons(body.to_vec())),
        _ => {}
    }
    match loader {
        LoaderKind::Classic => Ok(Bank::Data {
            number: u32::from(read_u16(body, 0)?),
            flags: 0,
            data: read_bytes(body, 4, body.len().saturating_sub(4))?.to_vec(),
        }),
        LoaderKind::Pro => Ok(Bank::Data {
            number: read_u32(body, 0)?,
            flags: read_u16(body, 4)?,
            data: read_bytes(body, 8, body.len().saturating_sub(8))?.to_vec(),
        }),
    }
}

/// Collect code hunk bodies, unsquashing where needed.
fn code_hunks(file: &HunkFile) -> Result<Vec<Vec<u8>>> {
    let HunkFile::Complete { hunks, .. } = file else {
        return Err(AmosError::InvalidProgram {
            message: "hunk file is partial".to_string(),
        });
    };

    let mut bodies = Vec::with_capacity(hunks.len() / 2);
    for (i, pair) in hunks.chunks(2).enumerate() {
        let data = match pair {
            [Hunk::Code(data), Hunk::End] => data,
            [Hunk::Code(_)] | [Hunk::Code(_), _] => {
                return Err(AmosError::InvalidProgram {
                    message: format!("expected HUNK_END after code hunk {}", i),
                })
            }
            _ => {
                return Err(AmosError::InvalidProgram {
                    message: format!("expected HUNK_CODE at hunk {}", i),
                })
            }
        };
        if squash::is_squashed(data) {
            tracing::trace!(hunk = i, "unsquashing program hunk");
            bodies.push(squash::unsquash(data).context(format!("unsquashing hunk {}", i))?);
        } else {
            bodies.push(data.clone());
        }
    }
    Ok(bodies)
}

/// Split unpacked program hunks according to the loader layout.
pub fn split_program(loader: LoaderKind, hunks: Vec<Vec<u8>>) -> Result<AmosProgram> {
    let min = match loader {
        LoaderKind::Classic => CLASSIC_MIN_HUNKS,
        LoaderKind::Pro => PRO_MIN_HUNKS,
    };
    if hunks.len() < min {
        return Err(AmosError::InvalidProgram {
            message: format!(
                "{} loader needs {} hunks, found {}",
                loader,
                min,
                hunks.len()
            ),
        });
    }

    let loader_hash = loader_hash(&hunks[0]);
    let mut iter = hunks.into_iter();
    let mut next = || iter.next().unwrap_or_default();

    let mut program = match loader {
        LoaderKind::Classic => {
            let loader_hunk = next();
            let flags = u32::from(read_u16(&loader_hunk, 2)?);
            AmosProgram {
                loader,
                loader_hash,
                flags,
                pivot: None,
                loader_hunk,
                main_hunk: next(),
                relocation_hunk: next(),
                dynamic_library: None,
                fixed_library: Some(next()),
                amos_library: None,
                environment: next(),
                mouse: next(),
                default_font: Some(next()),
                key_map: Some(next()),
                default_bank: None,
                error_messages: None,
                main_relocations: Vec::new(),
                library_relocations: Vec::new(),
                banks: Vec::new(),
            }
        }
        LoaderKind::Pro => {
            let loader_hunk = next();
            let flags = read_u32(&loader_hunk, 2)?;
            let pivot = read_u32(&loader_hunk, 8)?;
            let main_hunk = next();
            let dynamic_library = next();
            let relocation_hunk = next();
            let amos_library = Some(next()).filter(|lib| *lib != [0u8, 0, 0, 0]);
            AmosProgram {
                loader,
                loader_hash,
                flags,
                pivot: Some(pivot),
                loader_hunk,
                main_hunk,
                relocation_hunk,
                dynamic_library: Some(dynamic_library),
                fixed_library: None,
                amos_library,
                mouse: next(),
                environment: next(),
                default_font: None,
                key_map: None,
                default_bank: Some(next()),
                error_messages: Some(next()),
                main_relocations: Vec::new(),
                library_relocations: Vec::new(),
                banks: Vec::new(),
            }
        }
    };

    let mut pos = 0;
    program.main_relocations = read_relocations(&program.relocation_hunk, &mut pos);
    program.library_relocations = read_relocations(&program.relocation_hunk, &mut pos);
    program.banks = iter
        .enumerate()
        .map(|(i, raw)| parse_bank(&raw, loader).context(format!("parsing bank hunk {}", i)))
        .collect::<Result<_>>()?;

    tracing::debug!(
        %loader,
        banks = program.banks.len(),
        relocations = program.main_relocations.len(),
        "parsed AMOS program"
    );
    Ok(program)
}

/// Parse an AMOS compiled executable.
pub fn parse_program(data: &[u8]) -> Result<AmosProgram> {
    let file = unpack::parse_unpacked(data)?;
    let hunks = code_hunks(&file)?;
    let Some(loader) = hunks.first() else {
        return Err(AmosError::InvalidProgram {
            message: "no hunks".to_string(),
        });
    };
    let kind = identify_loader(loader)?;
    tracing::debug!(loader = %kind, "identified AMOS loader");
    split_program(kind, hunks)
}
