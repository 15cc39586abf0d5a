//! AMOS Inspect - Amiga AMOS Binary Analysis
//!
//! This library reads the binaries an AMOS installation consists of and
//! turns their code into a form that can be inspected and relinked.
//!
//! # Features
//!
//! - **Hunk Files**: Parses and writes Amiga hunk executables, including
//!   partial (overlay/object) layouts and 32-bit relocations
//! - **Decrunching**: Removes PowerPacker and StoneCracker stubs and decodes
//!   the AMOS compiler's squash format
//! - **Libraries**: Splits AMOS extension libraries into token tables, titles
//!   and routine code blocks, and names known libraries by MD5
//! - **Code Patterns**: Recognises the escape words AMOS uses for inter-routine
//!   references and relinks routines into one relocatable block
//! - **68000 Decoding**: Classifies, decodes and renders the baseline 68000
//!   instruction set
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use amos_inspect::{inspect_file, InspectOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = inspect_file("AMOSPro_Music.Lib", &InspectOptions::default())?;
//!     println!("Kind: {}", report.kind);
//!     if let Some(library) = &report.library {
//!         println!("Routines: {}", library.routines.len());
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod architectures;
pub mod compression;
pub mod error;
pub mod formats;
pub mod formatter;
pub mod patterns;
pub mod registry;
pub mod types;

pub use error::{AmosError, ErrorCategory, Result, ResultExt};
pub use formats::amoslib::LibraryInfo;
pub use formats::hunk::HunkFile;
pub use formats::program::AmosProgram;
pub use patterns::{CodePattern, CompiledLibraryInfo};
pub use types::{FileKind, InspectOptions, InspectReport, Note, NoteLevel};

use formats::hunk::{self, Hunk};
use formats::{amoslib, program, unpack, DetectedFormat};
use patterns::{compile_library_routines, to_code_pattern, RoutineSource};
use registry::{extension_slot, Registry};
use std::path::Path;
use types::{KnownLibrary, LibraryReport, ProgramReport, RoutineReport};

/// Inspect a file by path.
///
/// # Example
///
/// ```rust,no_run
/// use amos_inspect::{inspect_file, InspectOptions};
///
/// let report = inspect_file("AMOS.Lib", &InspectOptions::default())?;
/// println!("{} {}", report.md5, report.kind);
/// # Ok::<(), amos_inspect::AmosError>(())
/// ```
pub fn inspect_file<P: AsRef<Path>>(path: P, options: &InspectOptions) -> Result<InspectReport> {
    let data = std::fs::read(path)?;
    inspect_bytes(&data, options)
}

/// Inspect an in-memory file.
///
/// Compiled programs are recognised by their loader, libraries by a
/// well-formed library header in the first code hunk. Anything else that
/// parses as a hunk file is reported as a plain hunk file.
pub fn inspect_bytes(data: &[u8], options: &InspectOptions) -> Result<InspectReport> {
    match formats::detect_format(data) {
        DetectedFormat::Hunk => {}
        _ => {
            return Err(AmosError::InvalidMagic {
                expected: hex::encode(formats::magic::HUNK_HEADER),
                actual: hex::encode(&data[..data.len().min(4)]),
            })
        }
    }

    let md5 = formats::md5_hex(data);
    let parsed = hunk::parse(data)?;
    let packer = if options.unpack {
        unpack::detect_packer(&parsed)
    } else {
        None
    };
    let file = if options.unpack {
        unpack::unpack_hunk_file(parsed)?
    } else {
        parsed
    };
    let report = InspectReport::new(FileKind::Hunk, md5.clone(), data.len(), &file)
        .with_packer(packer);

    let Some(first) = first_code(&file) else {
        return Ok(report.with_note(Note::info("no code hunk")));
    };

    if file.is_complete() && program::identify_loader(first).is_ok() {
        let parsed = program::parse_program(data).context("parsing AMOS program")?;
        return Ok(report.with_program(ProgramReport::from(&parsed)));
    }

    match amoslib::parse(first) {
        Ok(info) => {
            let library = library_report(&info, &md5, options)?;
            Ok(with_registry_note(report.with_library(library)))
        }
        Err(err) => {
            tracing::debug!(%err, "first code hunk is not an AMOS library");
            Ok(report)
        }
    }
}

/// Parse an AMOS library file.
pub fn read_library(data: &[u8], options: &InspectOptions) -> Result<LibraryInfo> {
    let file = if options.unpack {
        unpack::parse_unpacked(data)?
    } else {
        hunk::parse(data)?
    };
    let code = first_code(&file).ok_or_else(|| AmosError::InvalidSection {
        kind: "library",
        message: "no code hunk".to_string(),
    })?;
    amoslib::parse(code).context("parsing library header")
}

/// Inspect an AMOS library, failing when it does not parse as one.
pub fn inspect_library(data: &[u8], options: &InspectOptions) -> Result<InspectReport> {
    let info = read_library(data, options)?;
    let md5 = formats::md5_hex(data);
    let file = if options.unpack {
        unpack::parse_unpacked(data)?
    } else {
        hunk::parse(data)?
    };
    let library = library_report(&info, &md5, options)?;
    Ok(with_registry_note(
        InspectReport::new(FileKind::Library, md5, data.len(), &file).with_library(library),
    ))
}

/// Inspect an AMOS compiled program, failing when it does not parse as one.
pub fn inspect_program(data: &[u8], options: &InspectOptions) -> Result<InspectReport> {
    let parsed = program::parse_program(data)?;
    let file = if options.unpack {
        unpack::parse_unpacked(data)?
    } else {
        hunk::parse(data)?
    };
    Ok(
        InspectReport::new(FileKind::Program, formats::md5_hex(data), data.len(), &file)
            .with_program(ProgramReport::from(&parsed)),
    )
}

/// Relink every code block of a library into one relocatable block.
///
/// Routines are placed in routine-number order as library 0, so references
/// into other extensions are reported as unresolved.
pub fn compile_library(info: &LibraryInfo) -> Result<CompiledLibraryInfo> {
    let sources = info
        .code_blocks
        .iter()
        .enumerate()
        .map(|(number, code)| {
            Ok(RoutineSource {
                library: 0,
                routine: routine_number(number)?,
                pattern: to_code_pattern(code),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    compile_library_routines(&sources)
}

/// Routine number of the code block at `index`.
fn routine_number(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| AmosError::InvalidSection {
        kind: "code block table",
        message: format!("block {} exceeds the routine number range", index),
    })
}

fn with_registry_note(report: InspectReport) -> InspectReport {
    if report.library.as_ref().is_some_and(|l| l.known.is_none()) {
        let note = Note::warning("library not in registry").with_context("registry lookup");
        report.with_note(note)
    } else {
        report
    }
}

fn first_code(file: &HunkFile) -> Option<&[u8]> {
    file.hunks().iter().find_map(|h| match h {
        Hunk::Code(data) => Some(data.as_slice()),
        _ => None,
    })
}

fn library_report(info: &LibraryInfo, md5: &str, options: &InspectOptions) -> Result<LibraryReport> {
    let registry = Registry::builtin()?;
    let resolved = registry.lookup(md5);
    let known = KnownLibrary::new(resolved, extension_slot(md5));

    let routines = info
        .code_blocks
        .iter()
        .enumerate()
        .map(|(number, code)| {
            let number = routine_number(number)?;
            Ok(RoutineReport {
                number,
                name: resolved
                    .and_then(|lib| lib.routine_name(number))
                    .map(str::to_string),
                length: code.len(),
                pattern: options.patterns.then(|| to_code_pattern(code)),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LibraryReport {
        always_run: info.always_run,
        ap20: info.ap20,
        known,
        title: info.title.clone(),
        tokens: info.tokens.clone(),
        routines,
    })
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
