//! AMOS extension library (`.Lib`) parser.
//!
//! Layout of the first code hunk:
//!
//! ```text
//! +0   u32  size of the code block size table
//! +4   u32  size of the token table
//! +8   u32  size of the code region
//! +12  u32  size of the title region
//! +16  i16  "always run" flag
//! +18  ["AP20"]  optional marker
//!      code block sizes (u16, in words)
//!      token table
//!      code blocks
//!      title strings
//! ```

use crate::error::{AmosError, Result};
use crate::formats::{latin1, magic, read_bytes, read_i16, read_u16, read_u32};
use memchr::memchr_iter;
use serde::Serialize;

const BASE_OFFSET: usize = 18;

/// One record of the token table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenEntry {
    /// Code block number of the instruction form, or negative when absent
    pub instruction: i16,
    /// Code block number of the function form, or negative when absent
    pub function: i16,
    /// Keyword text, with the leading `!` marker removed
    pub name: String,
    /// Parameter signature characters
    pub signature: String,
    /// Non-positive byte that ended the signature
    pub terminator: i8,
}

/// A parsed AMOS extension library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    /// Library routines run on startup even when unused
    pub always_run: bool,
    /// Header carries the `AP20` marker
    pub ap20: bool,
    /// Routine bodies in routine-number order
    pub code_blocks: Vec<Vec<u8>>,
    /// Token table records
    pub tokens: Vec<TokenEntry>,
    /// Title strings
    pub title: Vec<String>,
}

fn section_end(base: usize, data: &[u8], field: usize) -> Result<usize> {
    let len = read_u32(data, field)? as usize;
    base.checked_add(len).ok_or(AmosError::InvalidSection {
        kind: "library header",
        message: format!("section length {} overflows", len),
    })
}

/// Parse an AMOS library from the body of its first code hunk.
pub fn parse(data: &[u8]) -> Result<LibraryInfo> {
    if data.len() < BASE_OFFSET {
        return Err(AmosError::TruncatedData {
            offset: 0,
            expected: BASE_OFFSET,
            actual: data.len(),
        });
    }

    let always_run = read_i16(data, 16)? != 0;
    let ap20 = data.get(BASE_OFFSET..BASE_OFFSET + 4) == Some(&magic::AP20[..]);
    let c_off = if ap20 { BASE_OFFSET + 4 } else { BASE_OFFSET };

    let c_tk = section_end(c_off, data, 0)?;
    let c_lib = section_end(c_tk, data, 4)?;
    let c_title = section_end(c_lib, data, 8)?;
    let c_end = section_end(c_title, data, 12)?;
    if c_end > data.len() {
        return Err(AmosError::TruncatedData {
            offset: c_title,
            expected: c_end - c_title,
            actual: data.len().saturating_sub(c_title),
        });
    }

    let title = parse_title(&data[c_title..c_end]);

    let block_count = (c_tk - c_off) / 2;
    let mut code_blocks = Vec::with_capacity(block_count);
    let mut next = c_lib;
    for i in 0..block_count {
        let len = usize::from(read_u16(data, c_off + 2 * i)?) * 2;
        code_blocks.push(read_bytes(data, next, len)?.to_vec());
        next += len;
    }
    if next != c_title {
        return Err(AmosError::InvalidSection {
            kind: "code block table",
            message: format!("blocks end at {}, title region starts at {}", next, c_title),
        });
    }

    let tokens = parse_tokens(data, c_tk, c_lib)?;

    tracing::debug!(
        blocks = code_blocks.len(),
        tokens = tokens.len(),
        ap20,
        "parsed AMOS library"
    );

    Ok(LibraryInfo {
        always_run,
        ap20,
        code_blocks,
        tokens,
        title,
    })
}

fn parse_title(region: &[u8]) -> Vec<String> {
    let end = region.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let region = &region[..end];
    if region.is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    for nul in memchr_iter(0, region) {
        parts.push(latin1(&region[start..nul]));
        start = nul + 1;
    }
    parts.push(latin1(&region[start..]));
    parts
}

fn parse_tokens(data: &[u8], start: usize, limit: usize) -> Result<Vec<TokenEntry>> {
    let byte_at = |pos: usize| -> Result<u8> {
        if pos >= limit {
            return Err(AmosError::UnterminatedTokenTable { offset: pos });
        }
        read_bytes(data, pos, 1).map(|b| b[0])
    };

    let mut tokens = Vec::new();
    let mut previous = String::new();
    let mut pos = start;
    loop {
        if pos >= limit {
            return Err(AmosError::UnterminatedTokenTable { offset: pos });
        }
        let instruction = read_i16(data, pos)?;
        if instruction == 0 {
            break;
        }
        pos += 2;
        let function = read_i16(data, pos)?;
        pos += 2;

        let mut raw_name = String::new();
        loop {
            let b = byte_at(pos)?;
            pos += 1;
            raw_name.push(char::from(b & 0x7F));
            if b & 0x80 != 0 {
                break;
            }
        }
        if raw_name == "\0" {
            raw_name.clear();
        }

        let mut signature = String::new();
        let terminator = loop {
            let b = byte_at(pos)? as i8;
            pos += 1;
            if b <= 0 {
                break b;
            }
            signature.push(char::from(b as u8));
        };
        pos += pos % 2;

        let name = match (raw_name.is_empty(), previous.strip_prefix('!')) {
            (true, Some(base)) => base.to_string(),
            _ => raw_name.strip_prefix('!').unwrap_or(&raw_name).to_string(),
        };
        tokens.push(TokenEntry {
            instruction,
            function,
            name,
            signature,
            terminator,
        });
        previous = raw_name;
    }

    Ok(tokens)
}
