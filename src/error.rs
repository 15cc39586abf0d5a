//! Error types for AMOS inspection.
//!
//! Every parser, codec and compiler in the crate reports failures through
//! [`AmosError`]. Errors fall into three broad categories (see
//! [`ErrorCategory`]); "not recognized" outcomes such as an invalid opcode or
//! an unmatched escape are ordinary return values and never appear here.

use std::fmt;
use thiserror::Error;

/// Decompression codec that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// The "xVdg" squash codec used by the AMOS compiler.
    Squash,
    /// PowerPacker data cruncher.
    PowerPacker,
    /// StoneCracker 4.04 ("S404").
    StoneCracker,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Squash => "squash",
            Codec::PowerPacker => "PowerPacker",
            Codec::StoneCracker => "StoneCracker",
        };
        write!(f, "{}", name)
    }
}

/// Broad classification of an [`AmosError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong magic, truncated buffer, or inconsistent section boundaries.
    Structural,
    /// Checksum failure or a back-reference outside the output buffer.
    Integrity,
    /// Well-formed input outside the shapes this crate handles.
    Unsupported,
}

/// Primary error type for AMOS inspection.
#[derive(Debug, Error)]
pub enum AmosError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Truncated data when reading.
    #[error("Truncated data at offset {offset}: expected {expected} bytes, got {actual}")]
    TruncatedData {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// Invalid magic bytes for the expected format.
    #[error("Invalid magic bytes: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    /// Hunk file depends on resident libraries.
    #[error("Resident libraries are not supported: {names:?}")]
    ResidentLibraries { names: Vec<String> },

    /// Hunk header range does not fit the declared total.
    #[error("Invalid hunk range: first {first}, last {last}, total {total}")]
    InvalidHunkRange { first: u32, last: u32, total: u32 },

    /// Hunk block type tag not understood.
    #[error("Unknown hunk type 0x{value:08X} at offset {offset}")]
    UnknownHunkType { value: u32, offset: usize },

    /// Section boundaries in an AMOS library are inconsistent.
    #[error("Invalid {kind}: {message}")]
    InvalidSection { kind: &'static str, message: String },

    /// Token table ran into the code region without a terminator.
    #[error("Unterminated token table at offset {offset}")]
    UnterminatedTokenTable { offset: usize },

    /// Codec header or parameter is malformed.
    #[error("{codec} stream malformed: {message}")]
    MalformedStream { codec: Codec, message: String },

    /// Codec ran out of input bits.
    #[error("{codec} stream exhausted at input offset {offset}")]
    InputExhausted { codec: Codec, offset: usize },

    /// Codec tried to write past the start of its output buffer.
    #[error("{codec} output overrun: {needed} bytes requested with {remaining} remaining")]
    OutputOverrun {
        codec: Codec,
        needed: usize,
        remaining: usize,
    },

    /// Codec back-reference points outside the output buffer.
    #[error("{codec} back-reference out of range: source {source_index} with buffer length {length}")]
    BackReferenceOutOfRange {
        codec: Codec,
        source_index: usize,
        length: usize,
    },

    /// Codec finished its output with input bits left over.
    #[error("{codec} stream has unconsumed input: {bytes} bytes, register 0x{register:08X}")]
    UnconsumedInput {
        codec: Codec,
        bytes: usize,
        register: u32,
    },

    /// Squash checksum did not fold to zero.
    #[error("Squash checksum mismatch: residual 0x{residual:08X}")]
    ChecksumMismatch { residual: u32 },

    /// Packed hunk layout uses a feature that is not handled.
    #[error("Unsupported packed hunk type word 0x{value:04X}")]
    UnsupportedHunkWord { value: u16 },

    /// Compiled program starts with a loader that is not recognized.
    #[error("Unknown AMOS loader (md5 {hash})")]
    UnknownLoader { hash: String },

    /// AMOS program layout is inconsistent.
    #[error("Invalid AMOS program: {message}")]
    InvalidProgram { message: String },

    /// Two routines share the same library and routine number.
    #[error("Duplicate routine {routine} in library {library}")]
    DuplicateRoutine { library: u8, routine: u16 },

    /// A reference names a routine that was not placed.
    #[error("Unresolved routine {routine} in library {library}")]
    UnresolvedRoutine { library: u8, routine: u16 },

    /// A PC-relative displacement does not fit 16 bits.
    #[error("Displacement {displacement} at offset {offset} exceeds 16-bit range")]
    DisplacementOutOfRange { displacement: i64, offset: usize },

    /// An operand violates the addressing capability of its slot.
    #[error("Invalid operand for opcode 0x{opcode:04X}: {message}")]
    InvalidOperand { opcode: u16, message: String },

    /// Library registry definitions are inconsistent.
    #[error("Registry error: {message}")]
    RegistryError { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Error with added context.
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<AmosError>,
    },
}

impl AmosError {
    /// Broad category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            AmosError::ChecksumMismatch { .. }
            | AmosError::BackReferenceOutOfRange { .. }
            | AmosError::UnconsumedInput { .. } => ErrorCategory::Integrity,
            AmosError::ResidentLibraries { .. }
            | AmosError::UnsupportedHunkWord { .. }
            | AmosError::UnknownLoader { .. }
            | AmosError::DuplicateRoutine { .. }
            | AmosError::UnresolvedRoutine { .. }
            | AmosError::DisplacementOutOfRange { .. } => ErrorCategory::Unsupported,
            AmosError::Context { source, .. } => source.category(),
            _ => ErrorCategory::Structural,
        }
    }

    pub(crate) fn malformed(codec: Codec, message: impl Into<String>) -> Self {
        AmosError::MalformedStream {
            codec,
            message: message.into(),
        }
    }
}

/// Result type alias for AMOS operations.
pub type Result<T> = std::result::Result<T, AmosError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| AmosError::Context {
            message: msg.into(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AmosError::TruncatedData {
            offset: 16,
            expected: 4,
            actual: 2,
        };
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("4"));
    }

    #[test]
    fn test_unknown_hunk_type() {
        let err = AmosError::UnknownHunkType {
            value: 0x3EB,
            offset: 40,
        };
        assert!(err.to_string().contains("000003EB"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            AmosError::ChecksumMismatch { residual: 1 }.category(),
            ErrorCategory::Integrity
        );
        assert_eq!(
            AmosError::DuplicateRoutine {
                library: 0,
                routine: 3
            }
            .category(),
            ErrorCategory::Unsupported
        );
        assert_eq!(
            AmosError::malformed(Codec::Squash, "short").category(),
            ErrorCategory::Structural
        );
    }

    #[test]
    fn test_context_keeps_category() {
        let result: Result<()> = Err(AmosError::BackReferenceOutOfRange {
            codec: Codec::PowerPacker,
            source_index: 10,
            length: 8,
        });
        let err = result.context("unpacking stub").unwrap_err();
        assert!(err.to_string().starts_with("unpacking stub"));
        assert_eq!(err.category(), ErrorCategory::Integrity);
    }
}
