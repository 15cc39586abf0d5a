//! Report types for inspected files.
//!
//! Parsers return rich structures (`HunkFile`, `LibraryInfo`, `AmosProgram`);
//! this module condenses them into serializable reports that the formatters
//! render and `--format json` emits.

use crate::formats::amoslib::TokenEntry;
use crate::formats::hunk::{Hunk, HunkFile, HunkKind, MemoryType};
use crate::formats::program::{AmosProgram, LoaderKind};
use crate::formats::unpack::Packer;
use crate::patterns::CodePattern;
use crate::registry::{ExtensionSlot, ResolvedLibrary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an inspected file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Plain hunk executable or object
    Hunk,
    /// AMOS extension library
    Library,
    /// AMOS compiled program
    Program,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileKind::Hunk => "hunk",
            FileKind::Library => "library",
            FileKind::Program => "program",
        };
        write!(f, "{}", name)
    }
}

/// Options for file inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectOptions {
    /// Decrunch recognised packer stubs before parsing
    pub unpack: bool,
    /// Instructions listed per disassembly
    pub max_instructions: usize,
    /// Analyse every library routine into a code pattern
    pub patterns: bool,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            unpack: true,
            max_instructions: 256,
            patterns: true,
        }
    }
}

impl InspectOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse files exactly as stored.
    pub fn raw() -> Self {
        Self {
            unpack: false,
            ..Self::default()
        }
    }
}

/// One block of a hunk file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HunkSummary {
    pub index: usize,
    pub kind: HunkKind,
    /// Payload length in bytes, 0 for blocks without one
    pub length: usize,
    /// Memory type from the header, for segments
    pub memory: Option<MemoryType>,
    /// Relocated longwords, for relocation blocks
    pub relocations: usize,
}

/// Summarise every block of a hunk file.
pub fn summarize_hunks(file: &HunkFile) -> Vec<HunkSummary> {
    let sizes = file.sizes();
    let mut segment = 0;
    file.hunks()
        .iter()
        .enumerate()
        .map(|(index, hunk)| {
            let memory = if hunk.is_segment() {
                let memory = sizes.get(segment).map(|s| s.memory);
                segment += 1;
                memory
            } else {
                None
            };
            let relocations = match hunk {
                Hunk::Reloc32(blocks) => blocks.iter().map(|b| b.offsets.len()).sum(),
                _ => 0,
            };
            HunkSummary {
                index,
                kind: hunk.kind(),
                length: hunk.data().map_or(0, <[u8]>::len),
                memory,
                relocations,
            }
        })
        .collect()
}

/// One routine of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineReport {
    pub number: u16,
    /// Name from the registry, when the library is known
    pub name: Option<String>,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<CodePattern>,
}

/// Registry match of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownLibrary {
    pub name: String,
    pub version: String,
    pub slot: Option<u8>,
}

impl KnownLibrary {
    /// Combine the registry and slot table entries; either may be missing.
    pub fn new(library: Option<&ResolvedLibrary>, slot: Option<ExtensionSlot>) -> Option<Self> {
        match (library, slot) {
            (Some(lib), slot) => Some(Self {
                name: lib.name.clone(),
                version: lib.version.clone(),
                slot: slot.map(|s| s.slot),
            }),
            (None, Some(slot)) => Some(Self {
                name: slot.name.to_string(),
                version: slot.version.to_string(),
                slot: Some(slot.slot),
            }),
            (None, None) => None,
        }
    }
}

/// Analysis of an AMOS extension library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryReport {
    pub always_run: bool,
    pub ap20: bool,
    pub known: Option<KnownLibrary>,
    pub title: Vec<String>,
    pub tokens: Vec<TokenEntry>,
    pub routines: Vec<RoutineReport>,
}

/// A bank appended to a compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankSummary {
    pub kind: &'static str,
    pub number: Option<u32>,
    pub length: usize,
}

/// Analysis of an AMOS compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramReport {
    pub loader: LoaderKind,
    pub loader_hash: String,
    pub flags: u32,
    pub pivot: Option<u32>,
    pub main_length: usize,
    pub main_relocations: usize,
    pub library_relocations: usize,
    pub has_amos_library: bool,
    pub banks: Vec<BankSummary>,
}

impl From<&AmosProgram> for ProgramReport {
    fn from(program: &AmosProgram) -> Self {
        use crate::formats::program::Bank;

        Self {
            loader: program.loader,
            loader_hash: program.loader_hash.clone(),
            flags: program.flags,
            pivot: program.pivot,
            main_length: program.main_hunk.len(),
            main_relocations: program.main_relocations.len(),
            library_relocations: program.library_relocations.len(),
            has_amos_library: program.amos_library.is_some(),
            banks: program
                .banks
                .iter()
                .map(|bank| BankSummary {
                    kind: bank.kind(),
                    number: match bank {
                        Bank::Data { number, .. } => Some(*number),
                        _ => None,
                    },
                    length: bank.data().len(),
                })
                .collect(),
        }
    }
}

/// Complete result of inspecting one file.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub kind: FileKind,
    pub md5: String,
    pub size: usize,
    /// Packer whose stub was removed
    pub packer: Option<Packer>,
    pub complete: bool,
    pub hunks: Vec<HunkSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<LibraryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<ProgramReport>,
    pub notes: Vec<Note>,
}

impl InspectReport {
    /// Create a report for a parsed hunk file.
    pub fn new(kind: FileKind, md5: String, size: usize, file: &HunkFile) -> Self {
        Self {
            kind,
            md5,
            size,
            packer: None,
            complete: file.is_complete(),
            hunks: summarize_hunks(file),
            library: None,
            program: None,
            notes: Vec::new(),
        }
    }

    /// Record the packer that was removed.
    pub fn with_packer(mut self, packer: Option<Packer>) -> Self {
        self.packer = packer;
        self
    }

    /// Attach library analysis.
    pub fn with_library(mut self, library: LibraryReport) -> Self {
        self.kind = FileKind::Library;
        self.library = Some(library);
        self
    }

    /// Attach program analysis.
    pub fn with_program(mut self, program: ProgramReport) -> Self {
        self.kind = FileKind::Program;
        self.program = Some(program);
        self
    }

    /// Add a note.
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }
}

/// Analysis note or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Severity level
    pub level: NoteLevel,
    /// Note message
    pub message: String,
    /// Optional context (e.g., "library parsing")
    pub context: Option<String>,
}

impl Note {
    /// Create an info note.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Info,
            message: message.into(),
            context: None,
        }
    }

    /// Create a warning note.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Warning,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to the note.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Note severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    /// Informational
    Info,
    /// Warning (non-fatal issue)
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::hunk::{HunkSize, RelocBlock};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_default() {
        let options = InspectOptions::default();
        assert!(options.unpack);
        assert_eq!(options.max_instructions, 256);
        assert!(!InspectOptions::raw().unpack);

        let parsed: InspectOptions = serde_json::from_str(r#"{"unpack": false}"#).unwrap();
        assert!(!parsed.unpack);
        assert_eq!(parsed.max_instructions, 256);
    }

    #[test]
    fn test_summarize_hunks() {
        let file = HunkFile::Complete {
            sizes: vec![
                HunkSize {
                    length: 8,
                    memory: MemoryType::Chip,
                },
                HunkSize {
                    length: 4,
                    memory: MemoryType::Any,
                },
            ],
            hunks: vec![
                Hunk::Code(vec![0; 8]),
                Hunk::Reloc32(vec![RelocBlock {
                    target: 1,
                    offsets: vec![0, 4],
                }]),
                Hunk::End,
                Hunk::Data(vec![0; 4]),
                Hunk::End,
            ],
        };
        let summary = summarize_hunks(&file);
        assert_eq!(summary.len(), 5);
        assert_eq!(summary[0].memory, Some(MemoryType::Chip));
        assert_eq!(summary[1].relocations, 2);
        assert_eq!(summary[1].memory, None);
        assert_eq!(summary[3].kind, HunkKind::Data);
        assert_eq!(summary[3].memory, Some(MemoryType::Any));
        assert_eq!(summary[4].length, 0);
    }

    #[test]
    fn test_known_library() {
        let slot = ExtensionSlot {
            name: "Compact",
            version: "ProV2",
            slot: 2,
        };
        let known = KnownLibrary::new(None, Some(slot)).unwrap();
        assert_eq!(known.slot, Some(2));
        assert_eq!(KnownLibrary::new(None, None), None);
    }

    #[test]
    fn test_note_levels() {
        let note = Note::warning("odd").with_context("library");
        assert_eq!(note.level, NoteLevel::Warning);
        assert_eq!(serde_json::to_value(&note).unwrap()["level"], "warning");
    }
}
