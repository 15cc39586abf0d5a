//! Escape-coded routine bodies of AMOS libraries.
//!
//! Library routines do not call each other directly. The library compiler
//! leaves escape words in their place, which the AMOS loader links against
//! the routine table. An escape word has the form `$FxF1` with the escape
//! type in bits 11..8:
//!
//! ```text
//! $F0F1 tag arg routine    extended jump (6 bytes)
//! $F1F1 tag arg routine    extended call (6 bytes)
//! $F2F1 routine .. $FEF1   relative branches (4 bytes)
//! $FFF1 xxxx               raw data follows (4 bytes)
//! ```
//!
//! Extended escapes with tag 0 name a library (0 for the current one);
//! tag 1 names an address register 0-7 to jump or call through, or 8-15
//! for a plain address load.

pub mod compile;

pub use compile::{compile_library_routines, CompiledLibraryInfo, RoutinePlacement, RoutineSource};

use crate::architectures::m68k::Mnemonic;
use crate::formats::magic;
use byteorder::{BigEndian, ByteOrder};
use serde::{Serialize, Serializer};

const ESCAPE_MASK: u16 = 0xF0FF;
const ESCAPE_VALUE: u16 = 0xF0F1;

const EXTENDED_JUMP: u8 = 0x0;
const EXTENDED_CALL: u8 = 0x1;
const RAW_DATA: u8 = 0xF;

const TAG_LIBRARY: u8 = 0;
const TAG_REGISTER: u8 = 1;

/// Branch escapes by escape type, starting at type 2.
const ESCAPE_BRANCHES: [Mnemonic; 13] = [
    Mnemonic::Bra,
    Mnemonic::Bsr,
    Mnemonic::Beq,
    Mnemonic::Bne,
    Mnemonic::Bcs,
    Mnemonic::Bcc,
    Mnemonic::Blt,
    Mnemonic::Bge,
    Mnemonic::Bls,
    Mnemonic::Bhi,
    Mnemonic::Ble,
    Mnemonic::Bpl,
    Mnemonic::Bmi,
];

/// Byte length of a branch escape.
pub const BRANCH_LENGTH: usize = 4;

/// Byte length of an extended escape.
pub const EXTENDED_LENGTH: usize = 6;

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// One piece of a routine body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Section {
    /// Plain machine code
    Literal {
        #[serde(serialize_with = "serialize_hex")]
        bytes: Vec<u8>,
    },
    /// Relative branch to a routine of the same library
    Branch { mnemonic: Mnemonic, target: u16 },
    /// JMP/JSR to a routine, in the current library when `library` is 0
    Library { call: bool, library: u8, routine: u16 },
    /// JMP/JSR through an address register loaded with a routine address
    Register { call: bool, reg: u8, routine: u16 },
    /// Load a routine address into an address register
    LoadAddress { reg: u8, routine: u16 },
    /// Everything after this marker is data
    RawData,
}

impl Section {
    /// Bytes the section occupies, both in the library and once compiled.
    pub fn len(&self) -> usize {
        match self {
            Section::Literal { bytes } => bytes.len(),
            Section::Branch { .. } | Section::RawData => BRANCH_LENGTH,
            Section::Library { .. } | Section::Register { .. } | Section::LoadAddress { .. } => {
                EXTENDED_LENGTH
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Routine named by this section, with its library (0 = current).
    pub fn reference(&self) -> Option<(u8, u16)> {
        match *self {
            Section::Branch { target, .. } => Some((0, target)),
            Section::Library {
                library, routine, ..
            } => Some((library, routine)),
            Section::Register { routine, .. } | Section::LoadAddress { routine, .. } => {
                Some((0, routine))
            }
            Section::Literal { .. } | Section::RawData => None,
        }
    }
}

/// A routine body split into literal code and escapes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CodePattern {
    pub sections: Vec<Section>,
    /// The routine starts by branching to this routine
    pub redirect_target: Option<u16>,
    /// The routine ends by branching to this routine; the branch is dropped
    /// when the target is laid out right after it
    pub fallthrough_target: Option<u16>,
}

impl CodePattern {
    /// Length of the routine with its trailing branch, if any.
    pub fn len(&self) -> usize {
        self.body_len() + if self.fallthrough_target.is_some() { BRANCH_LENGTH } else { 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the sections alone.
    pub fn body_len(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    /// Routines this pattern refers to, in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        self.sections
            .iter()
            .filter_map(Section::reference)
            .chain(self.fallthrough_target.map(|t| (0, t)))
    }
}

fn is_escape(word: u16) -> bool {
    word & ESCAPE_MASK == ESCAPE_VALUE
}

fn escape_type(word: u16) -> u8 {
    ((word >> 8) & 0xF) as u8
}

/// Recognise the escape at `pos`, or `None` when the bytes are literal.
fn read_escape(code: &[u8], pos: usize) -> Option<Section> {
    let word = BigEndian::read_u16(code.get(pos..pos + 2)?);
    if !is_escape(word) {
        return None;
    }

    match escape_type(word) {
        kind @ (EXTENDED_JUMP | EXTENDED_CALL) => {
            let ext = code.get(pos + 2..pos + EXTENDED_LENGTH)?;
            let call = kind == EXTENDED_CALL;
            let (tag, arg) = (ext[0], ext[1]);
            let routine = BigEndian::read_u16(&ext[2..4]);
            match (tag, arg) {
                (TAG_LIBRARY, library) => Some(Section::Library {
                    call,
                    library,
                    routine,
                }),
                (TAG_REGISTER, reg @ 0..=7) => Some(Section::Register { call, reg, routine }),
                // never emitted by the AMOS compiler but loaded the same way
                (TAG_REGISTER, reg @ 8..=15) => Some(Section::LoadAddress {
                    reg: reg - 8,
                    routine,
                }),
                _ => None,
            }
        }
        RAW_DATA => {
            code.get(pos + 2..pos + BRANCH_LENGTH)?;
            Some(Section::RawData)
        }
        kind => {
            let target = BigEndian::read_u16(code.get(pos + 2..pos + BRANCH_LENGTH)?);
            Some(Section::Branch {
                mnemonic: ESCAPE_BRANCHES[kind as usize - 2],
                target,
            })
        }
    }
}

/// Split a routine body into sections.
///
/// Any escape-shaped word that does not decode stays inside the current
/// literal run. After a raw-data marker the rest of the body is one literal.
pub fn scan_sections(code: &[u8]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    let flush = |sections: &mut Vec<Section>, from: usize, to: usize| {
        if to > from {
            sections.push(Section::Literal {
                bytes: code[from..to].to_vec(),
            });
        }
    };

    while pos + 2 <= code.len() {
        let Some(section) = read_escape(code, pos) else {
            pos += 2;
            continue;
        };
        flush(&mut sections, literal_start, pos);
        pos += section.len();
        literal_start = pos;
        let raw = section == Section::RawData;
        sections.push(section);
        if raw {
            break;
        }
    }

    flush(&mut sections, literal_start, code.len());
    sections
}

/// `MOVEQ #n,D2` with n in 0..=2 followed by `RTS`
fn is_moveq_d2_return(tail: &[u8]) -> bool {
    matches!(tail, [0x74, 0..=2, 0x4E, 0x75])
}

/// Analyse a routine body.
pub fn to_code_pattern(code: &[u8]) -> CodePattern {
    let mut code = code;
    if code.ends_with(&magic::GET_PARAM) {
        code = &code[..code.len() - 4];
    }

    let mut owned;
    let code = if code.len() >= 4 && is_moveq_d2_return(&code[code.len() - 4..]) {
        owned = code[..code.len() - 4].to_vec();
        owned.extend_from_slice(&[0x4E, 0x75]);
        &owned[..]
    } else {
        code
    };

    let mut sections = scan_sections(code);

    let fallthrough_target = match sections.last() {
        Some(&Section::Branch {
            mnemonic: Mnemonic::Bra,
            target,
        }) => {
            sections.pop();
            Some(target)
        }
        _ => None,
    };

    let redirect_target = match sections.first() {
        Some(&Section::Branch {
            mnemonic: Mnemonic::Bra,
            target,
        }) => Some(target),
        None => fallthrough_target,
        _ => None,
    };

    CodePattern {
        sections,
        redirect_target,
        fallthrough_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(bytes: &[u8]) -> Section {
        Section::Literal {
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_plain_code_is_one_literal() {
        let code = [0x70, 0x00, 0x4E, 0x75];
        let pattern = to_code_pattern(&code);
        assert_eq!(pattern.sections, vec![lit(&code)]);
        assert_eq!(pattern.redirect_target, None);
        assert_eq!(pattern.fallthrough_target, None);
        assert_eq!(pattern.len(), 4);
    }

    #[test]
    fn test_escapes_between_literals() {
        let code = [
            0x20, 0x3C, // MOVE.L #..,D0 (first half)
            0xF1, 0xF1, 0x00, 0x02, 0x00, 0x05, // call library 2, routine 5
            0xF0, 0xF1, 0x01, 0x03, 0x00, 0x07, // jump through A3 to routine 7
            0xF1, 0xF1, 0x01, 0x09, 0x00, 0x08, // load routine 8 into A1
            0xF4, 0xF1, 0x00, 0x0A, // BEQ to routine 10
            0x4E, 0x75,
        ];
        let pattern = to_code_pattern(&code);
        assert_eq!(
            pattern.sections,
            vec![
                lit(&[0x20, 0x3C]),
                Section::Library {
                    call: true,
                    library: 2,
                    routine: 5
                },
                Section::Register {
                    call: false,
                    reg: 3,
                    routine: 7
                },
                Section::LoadAddress { reg: 1, routine: 8 },
                Section::Branch {
                    mnemonic: Mnemonic::Beq,
                    target: 10
                },
                lit(&[0x4E, 0x75]),
            ]
        );
        assert_eq!(pattern.len(), code.len());
    }

    #[test]
    fn test_unrecognised_escape_stays_literal() {
        // tag 2 is not an extended form
        let code = [0xF0, 0xF1, 0x02, 0x00, 0x00, 0x01, 0x4E, 0x75];
        assert_eq!(scan_sections(&code), vec![lit(&code)]);

        // truncated branch escape at the very end
        let code = [0x4E, 0x71, 0xF2, 0xF1];
        assert_eq!(scan_sections(&code), vec![lit(&code)]);

        // register numbers past 15 are not recognised either
        let code = [0xF1, 0xF1, 0x01, 0x10, 0x00, 0x01];
        assert_eq!(scan_sections(&code), vec![lit(&code)]);
    }

    #[test]
    fn test_raw_data_stops_scanning() {
        let code = [0x4E, 0x75, 0xFF, 0xF1, 0x00, 0x00, 0xF2, 0xF1, 0x00, 0x01];
        assert_eq!(
            scan_sections(&code),
            vec![
                lit(&[0x4E, 0x75]),
                Section::RawData,
                lit(&[0xF2, 0xF1, 0x00, 0x01]),
            ]
        );
    }

    #[test]
    fn test_escapes_are_word_aligned() {
        let code = [0x00, 0xF2, 0xF1, 0x00, 0x01, 0x00];
        assert_eq!(scan_sections(&code), vec![lit(&code)]);
    }

    #[test]
    fn test_trailing_branch_becomes_fallthrough() {
        let code = [0x70, 0x01, 0xF2, 0xF1, 0x00, 0x04];
        let pattern = to_code_pattern(&code);
        assert_eq!(pattern.sections, vec![lit(&[0x70, 0x01])]);
        assert_eq!(pattern.fallthrough_target, Some(4));
        assert_eq!(pattern.redirect_target, None);
        assert_eq!(pattern.len(), code.len());
    }

    #[test]
    fn test_redirect() {
        let code = [0xF2, 0xF1, 0x00, 0x09, 0x4E, 0x75];
        let pattern = to_code_pattern(&code);
        assert_eq!(pattern.redirect_target, Some(9));

        // a body that is only a branch redirects through its fallthrough
        let pattern = to_code_pattern(&[0xF2, 0xF1, 0x00, 0x0C]);
        assert!(pattern.sections.is_empty());
        assert_eq!(pattern.fallthrough_target, Some(12));
        assert_eq!(pattern.redirect_target, Some(12));
    }

    #[test]
    fn test_trailers_are_stripped() {
        let pattern = to_code_pattern(b"\x4E\x71\x4E\x75GetP");
        assert_eq!(pattern.sections, vec![lit(&[0x4E, 0x71, 0x4E, 0x75])]);

        let pattern = to_code_pattern(&[0x4E, 0x71, 0x74, 0x02, 0x4E, 0x75]);
        assert_eq!(pattern.sections, vec![lit(&[0x4E, 0x71, 0x4E, 0x75])]);

        // MOVEQ #3,D2 is kept
        let code = [0x74, 0x03, 0x4E, 0x75];
        assert_eq!(to_code_pattern(&code).sections, vec![lit(&code)]);
    }

    #[test]
    fn test_length_matches_input() {
        let bodies: [&[u8]; 5] = [
            &[],
            &[0x4E, 0x75],
            &[0x4E, 0x71, 0x4E],
            &[0xF3, 0xF1, 0x00, 0x01, 0xF0, 0xF1, 0x00, 0x00, 0x00, 0x02, 0x4E, 0x75],
            &[0x12, 0x34, 0xFF, 0xF1, 0xAB, 0xCD, 0xF2, 0xF1, 0x00, 0x03],
        ];
        for body in bodies {
            let pattern = to_code_pattern(body);
            assert_eq!(pattern.len(), body.len(), "{:02x?}", body);
            let sum: usize = pattern.sections.iter().map(Section::len).sum();
            assert_eq!(sum, pattern.body_len());
        }
    }

    #[test]
    fn test_references() {
        let code = [0xF3, 0xF1, 0x00, 0x01, 0x4E, 0x71, 0xF2, 0xF1, 0x00, 0x02];
        let refs: Vec<_> = to_code_pattern(&code).references().collect();
        assert_eq!(refs, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_serialized_sections() {
        let pattern = to_code_pattern(&[0x4E, 0x75]);
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["sections"][0]["type"], "literal");
        assert_eq!(json["sections"][0]["bytes"], "4e75");
        assert_eq!(json["fallthrough_target"], serde_json::Value::Null);
    }
}
