//! Linking routine patterns into one relocatable code block.
//!
//! Routines are laid out back to back after a leading `RTS`. References to
//! routines become real 68000 code:
//!
//! - library jumps and calls use `JMP`/`JSR (xxx).L` with the target offset
//!   tagged in the top nibble, and the longword is recorded for relocation;
//! - register forms load the target with `LEA d16(PC),An` first;
//! - branches become word-displacement `Bcc`.

use super::{CodePattern, Section};
use crate::architectures::m68k::mnemonic::BRANCHES;
use crate::architectures::m68k::{opcodes, Mnemonic};
use crate::error::{AmosError, Result};
use crate::formats::hunk::{Hunk, HunkFile, HunkSize, MemoryType, RelocBlock};
use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;
use std::collections::HashMap;

/// Tag carried by unrelocated absolute addresses.
pub const ADDRESS_TAG: u32 = 0x1000_0000;

const ADDRESS_MASK: u32 = 0x0FFF_FFFF;

/// Leading pad of every compiled block.
const HEADER_LENGTH: usize = 2;

/// A routine to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineSource {
    pub library: u8,
    pub routine: u16,
    pub pattern: CodePattern,
}

/// Where a routine ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutinePlacement {
    pub library: u8,
    pub routine: u16,
    pub offset: usize,
    pub length: usize,
    /// Execution continues into the next routine without a branch
    pub fallthrough: bool,
}

/// Result of compiling a set of routines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledLibraryInfo {
    #[serde(skip)]
    pub code: Vec<u8>,
    /// Offsets of longwords holding tagged absolute addresses
    pub relocations: Vec<u32>,
    pub routines: Vec<RoutinePlacement>,
}

impl CompiledLibraryInfo {
    /// Placement of a routine.
    pub fn placement(&self, library: u8, routine: u16) -> Option<&RoutinePlacement> {
        self.routines
            .iter()
            .find(|r| r.library == library && r.routine == routine)
    }

    /// Wrap the code in a single-segment hunk file with its relocations.
    pub fn to_hunk_file(&self) -> HunkFile {
        let mut code = self.code.clone();
        for &offset in &self.relocations {
            let field = &mut code[offset as usize..offset as usize + 4];
            let address = BigEndian::read_u32(field) & ADDRESS_MASK;
            BigEndian::write_u32(field, address);
        }
        code.resize((code.len() + 3) & !3, 0);

        let size = HunkSize {
            length: code.len() as u32,
            memory: MemoryType::Any,
        };
        let mut hunks = vec![Hunk::Code(code)];
        if !self.relocations.is_empty() {
            hunks.push(Hunk::Reloc32(vec![RelocBlock {
                target: 0,
                offsets: self.relocations.clone(),
            }]));
        }
        hunks.push(Hunk::End);

        HunkFile::Complete {
            sizes: vec![size],
            hunks,
        }
    }
}

/// Condition field of a branch mnemonic.
fn condition(mnemonic: Mnemonic) -> Option<u16> {
    BRANCHES
        .iter()
        .position(|&m| m == mnemonic)
        .map(|c| c as u16)
}

/// Whether the routine after `index` is the one it falls into.
fn falls_through(routines: &[RoutineSource], index: usize) -> bool {
    let current = &routines[index];
    match (current.pattern.fallthrough_target, routines.get(index + 1)) {
        (Some(target), Some(next)) => next.library == current.library && next.routine == target,
        _ => false,
    }
}

struct Emitter<'a> {
    out: Vec<u8>,
    relocations: Vec<u32>,
    offsets: &'a HashMap<(u8, u16), usize>,
}

impl Emitter<'_> {
    fn word(&mut self, value: u16) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    fn long(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_be_bytes());
    }

    fn target(&self, library: u8, routine: u16) -> Result<usize> {
        self.offsets
            .get(&(library, routine))
            .copied()
            .ok_or(AmosError::UnresolvedRoutine { library, routine })
    }

    /// Displacement word for a field at the current position.
    fn displacement(&mut self, target: usize) -> Result<()> {
        let field = self.out.len();
        let displacement = target as i64 - field as i64;
        let value = i16::try_from(displacement).map_err(|_| AmosError::DisplacementOutOfRange {
            displacement,
            offset: field,
        })?;
        self.word(value as u16);
        Ok(())
    }

    fn branch(&mut self, mnemonic: Mnemonic, target: usize) -> Result<()> {
        let condition = condition(mnemonic).ok_or_else(|| AmosError::InvalidSection {
            kind: "branch section",
            message: format!("{} is not a branch", mnemonic),
        })?;
        self.word(opcodes::BRA | (condition << 8));
        self.displacement(target)
    }

    fn section(&mut self, library: u8, section: &Section) -> Result<()> {
        match *section {
            Section::Literal { ref bytes } => self.out.extend_from_slice(bytes),
            Section::Branch { mnemonic, target } => {
                let target = self.target(library, target)?;
                self.branch(mnemonic, target)?;
            }
            Section::Library {
                call,
                library: other,
                routine,
            } => {
                let library = if other == 0 { library } else { other };
                let target = self.target(library, routine)?;
                self.word(if call { opcodes::JSR_ABS_L } else { opcodes::JMP_ABS_L });
                self.relocations.push(self.out.len() as u32);
                self.long(ADDRESS_TAG | target as u32);
            }
            Section::Register { call, reg, routine } => {
                let target = self.target(library, routine)?;
                self.word(opcodes::LEA_PC | (u16::from(reg) << 9));
                self.displacement(target)?;
                let jump = if call {
                    opcodes::JSR_INDIRECT
                } else {
                    opcodes::JMP_INDIRECT
                };
                self.word(jump | u16::from(reg));
            }
            Section::LoadAddress { reg, routine } => {
                let target = self.target(library, routine)?;
                self.word(opcodes::LEA_PC | (u16::from(reg) << 9));
                self.displacement(target)?;
                self.word(opcodes::NOP);
            }
            Section::RawData => {
                self.word(opcodes::NOP);
                self.word(opcodes::NOP);
            }
        }
        Ok(())
    }
}

/// Lay out and link routines in the given order.
pub fn compile_library_routines(routines: &[RoutineSource]) -> Result<CompiledLibraryInfo> {
    let mut offsets = HashMap::with_capacity(routines.len());
    let mut placements = Vec::with_capacity(routines.len());
    let mut offset = HEADER_LENGTH;

    for (index, source) in routines.iter().enumerate() {
        let fallthrough = falls_through(routines, index);
        let length = if fallthrough {
            source.pattern.body_len()
        } else {
            source.pattern.len()
        };

        if offsets.insert((source.library, source.routine), offset).is_some() {
            return Err(AmosError::DuplicateRoutine {
                library: source.library,
                routine: source.routine,
            });
        }
        placements.push(RoutinePlacement {
            library: source.library,
            routine: source.routine,
            offset,
            length,
            fallthrough,
        });
        offset += length;
    }

    let mut emitter = Emitter {
        out: Vec::with_capacity(offset),
        relocations: Vec::new(),
        offsets: &offsets,
    };
    emitter.word(opcodes::RTS);

    for (source, placement) in routines.iter().zip(&placements) {
        for section in &source.pattern.sections {
            emitter.section(source.library, section)?;
        }
        if let (Some(target), false) = (source.pattern.fallthrough_target, placement.fallthrough) {
            let target = emitter.target(source.library, target)?;
            emitter.branch(Mnemonic::Bra, target)?;
        }
        debug_assert_eq!(emitter.out.len(), placement.offset + placement.length);
    }

    tracing::debug!(
        routines = placements.len(),
        bytes = emitter.out.len(),
        relocations = emitter.relocations.len(),
        "compiled library routines"
    );

    Ok(CompiledLibraryInfo {
        code: emitter.out,
        relocations: emitter.relocations,
        routines: placements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architectures::m68k::disassemble;
    use crate::formats::hunk;
    use crate::patterns::to_code_pattern;
    use pretty_assertions::assert_eq;

    fn source(library: u8, routine: u16, code: &[u8]) -> RoutineSource {
        RoutineSource {
            library,
            routine,
            pattern: to_code_pattern(code),
        }
    }

    const RTS: [u8; 2] = [0x4E, 0x75];

    #[test]
    fn test_fallthrough_elides_branch() {
        // A: NOP, falls into routine 2
        let a = source(1, 1, &[0x4E, 0x71, 0xF2, 0xF1, 0x00, 0x02]);
        let b = source(1, 2, &RTS);

        let compiled = compile_library_routines(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(compiled.code, vec![0x4E, 0x75, 0x4E, 0x71, 0x4E, 0x75]);
        assert_eq!(
            compiled.routines[0],
            RoutinePlacement {
                library: 1,
                routine: 1,
                offset: 2,
                length: 2,
                fallthrough: true,
            }
        );

        // B first: A needs its branch back to B
        let compiled = compile_library_routines(&[b, a]).unwrap();
        let a = compiled.placement(1, 1).unwrap();
        assert!(!a.fallthrough);
        assert_eq!(a.offset, 4);
        assert_eq!(a.length, 6);
        // BRA.W at 6, field at 8, target 2
        assert_eq!(&compiled.code[4..], &[0x4E, 0x71, 0x60, 0x00, 0xFF, 0xFA]);
    }

    #[test]
    fn test_fallthrough_requires_same_library() {
        let a = source(1, 1, &[0xF2, 0xF1, 0x00, 0x02]);
        let b = source(2, 2, &RTS);
        let c = source(1, 2, &RTS);
        let compiled = compile_library_routines(&[a, b, c]).unwrap();
        assert!(!compiled.routines[0].fallthrough);
        assert_eq!(compiled.routines[0].length, 4);
    }

    #[test]
    fn test_library_references_are_relocated() {
        let caller = source(0, 1, &[0xF1, 0xF1, 0x00, 0x03, 0x00, 0x07, 0x4E, 0x75]);
        let callee = source(3, 7, &RTS);
        let local = source(0, 2, &[0xF0, 0xF1, 0x00, 0x00, 0x00, 0x01]);

        let compiled = compile_library_routines(&[caller, callee, local]).unwrap();
        // caller at 2: JSR (xxx).L to library 3 routine 7 at 10
        assert_eq!(&compiled.code[2..8], &[0x4E, 0xB9, 0x10, 0x00, 0x00, 0x0A]);
        // local at 12: JMP (xxx).L to its own library routine 1 at 2
        assert_eq!(&compiled.code[12..18], &[0x4E, 0xF9, 0x10, 0x00, 0x00, 0x02]);
        assert_eq!(compiled.relocations, vec![4, 14]);
    }

    #[test]
    fn test_register_and_branch_forms() {
        let a = source(
            0,
            1,
            &[
                0xF1, 0xF1, 0x01, 0x02, 0x00, 0x02, // JSR through A2 to routine 2
                0xF1, 0xF1, 0x01, 0x0B, 0x00, 0x02, // LEA routine 2 into A3
                0xF4, 0xF1, 0x00, 0x02, // BEQ routine 2
                0xFF, 0xF1, 0x12, 0x34, // raw data
                0x4E, 0x75,
            ],
        );
        let b = source(0, 2, &RTS);
        let compiled = compile_library_routines(&[a, b]).unwrap();
        let b_offset = compiled.placement(0, 2).unwrap().offset;
        assert_eq!(b_offset, 24);

        let listing: Vec<String> = disassemble(&compiled.code, 0)
            .into_iter()
            .map(|i| i.text)
            .collect();
        assert_eq!(
            listing,
            vec![
                "RTS",
                "LEA ($14,PC),A2",
                "JSR (A2)",
                "LEA ($e,PC),A3",
                "NOP",
                "BEQ $8",
                "NOP",
                "NOP",
                "RTS",
                "RTS",
            ]
        );
    }

    #[test]
    fn test_errors() {
        let dup = compile_library_routines(&[source(0, 1, &RTS), source(0, 1, &RTS)]);
        assert!(matches!(
            dup,
            Err(AmosError::DuplicateRoutine {
                library: 0,
                routine: 1
            })
        ));

        let missing = compile_library_routines(&[source(0, 1, &[0xF2, 0xF1, 0x00, 0x09, 0x4E, 0x75])]);
        assert!(matches!(
            missing,
            Err(AmosError::UnresolvedRoutine {
                library: 0,
                routine: 9
            })
        ));

        let far = source(0, 1, &[0xF3, 0xF1, 0x00, 0x02]);
        let filler = source(0, 3, &vec![0x4E; 0x8000]);
        let target = source(0, 2, &RTS);
        let err = compile_library_routines(&[far, filler, target]).unwrap_err();
        assert!(matches!(err, AmosError::DisplacementOutOfRange { offset: 4, .. }));
    }

    #[test]
    fn test_branch_section_needs_branch_mnemonic() {
        let bad = RoutineSource {
            library: 0,
            routine: 1,
            pattern: CodePattern {
                sections: vec![Section::Branch {
                    mnemonic: Mnemonic::Nop,
                    target: 1,
                }],
                ..CodePattern::default()
            },
        };
        let err = compile_library_routines(&[bad]).unwrap_err();
        assert!(matches!(
            err,
            AmosError::InvalidSection {
                kind: "branch section",
                ..
            }
        ));
        assert_eq!(condition(Mnemonic::Ble), Some(15));
        assert_eq!(condition(Mnemonic::Dbf), None);
    }

    #[test]
    fn test_hunk_file() {
        let caller = source(0, 1, &[0xF1, 0xF1, 0x00, 0x00, 0x00, 0x02, 0x4E, 0x75]);
        let callee = source(0, 2, &RTS);
        let compiled = compile_library_routines(&[caller, callee]).unwrap();

        let file = compiled.to_hunk_file();
        let parsed = hunk::parse(&hunk::write(&file)).unwrap();
        assert_eq!(parsed, file);

        let Hunk::Code(code) = &file.hunks()[0] else {
            panic!("expected code hunk");
        };
        assert_eq!(code.len() % 4, 0);
        assert_eq!(&code[4..8], &[0x00, 0x00, 0x00, 0x0A]);
        assert_eq!(
            file.hunks()[1],
            Hunk::Reloc32(vec![RelocBlock {
                target: 0,
                offsets: vec![4],
            }])
        );
    }
}
