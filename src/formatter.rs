//! Output formatters for inspection reports.
//!
//! This module provides trait-based formatters for rendering reports and
//! disassembly listings in various output formats (human-readable, JSON,
//! compact).

use crate::architectures::m68k::Instruction;
use crate::types::{HunkSummary, InspectReport, LibraryReport, Note, NoteLevel, ProgramReport};
use std::path::Path;

/// Trait for formatting inspection reports.
///
/// Implementors render each component of a report, plus the complete report.
pub trait ReportFormatter {
    /// Format the file path header.
    fn format_file(&self, path: &Path) -> String;

    /// Format the one-line summary (kind, size, hash, packer).
    fn format_summary(&self, report: &InspectReport) -> Option<String>;

    /// Format the hunk table.
    fn format_hunks(&self, hunks: &[HunkSummary]) -> Option<String>;

    /// Format library analysis.
    fn format_library(&self, library: &LibraryReport) -> Option<String>;

    /// Format compiled program analysis.
    fn format_program(&self, program: &ProgramReport) -> Option<String>;

    /// Format analysis notes.
    fn format_notes(&self, notes: &[Note]) -> Option<String>;

    /// Format a disassembly listing.
    fn format_listing(&self, instructions: &[Instruction], path: &Path) -> String;

    /// Format the complete report.
    ///
    /// Default implementation concatenates all component outputs.
    fn format_report(&self, report: &InspectReport, path: &Path) -> String {
        let mut parts = vec![self.format_file(path)];

        if let Some(s) = self.format_summary(report) {
            parts.push(s);
        }
        if let Some(s) = self.format_hunks(&report.hunks) {
            parts.push(s);
        }
        if let Some(s) = report.library.as_ref().and_then(|l| self.format_library(l)) {
            parts.push(s);
        }
        if let Some(s) = report.program.as_ref().and_then(|p| self.format_program(p)) {
            parts.push(s);
        }
        if let Some(s) = self.format_notes(&report.notes) {
            parts.push(s);
        }

        parts.concat()
    }
}

/// Human-readable output formatter.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    /// Show verbose output (per-routine patterns, every token)
    pub verbose: bool,
    /// Quiet mode (minimal output)
    pub quiet: bool,
}

impl HumanFormatter {
    /// Create a new human formatter with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            quiet: false,
        }
    }

    /// Create a quiet formatter.
    pub fn quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
        }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_file(&self, path: &Path) -> String {
        if self.quiet {
            String::new()
        } else {
            format!("File: {}\n", path.display())
        }
    }

    fn format_summary(&self, report: &InspectReport) -> Option<String> {
        if self.quiet {
            return Some(format!("{}\t{}\n", report.md5, report.kind));
        }
        let mut s = format!("  Kind:       {}\n", report.kind);
        s.push_str(&format!("  Size:       {} bytes\n", report.size));
        s.push_str(&format!("  MD5:        {}\n", report.md5));
        if let Some(packer) = report.packer {
            s.push_str(&format!("  Packer:     {}\n", packer));
        }
        if !report.complete {
            s.push_str("  Layout:     partial (overlay or object)\n");
        }
        Some(s)
    }

    fn format_hunks(&self, hunks: &[HunkSummary]) -> Option<String> {
        if self.quiet || hunks.is_empty() {
            return None;
        }
        let mut s = String::from("  Hunks:\n");
        for hunk in hunks {
            s.push_str(&format!("    {:>3}  {:<12}", hunk.index, hunk.kind.to_string()));
            if hunk.length > 0 {
                s.push_str(&format!(" {:>8} bytes", hunk.length));
            }
            if let Some(memory) = hunk.memory {
                s.push_str(&format!("  {}", memory));
            }
            if hunk.relocations > 0 {
                s.push_str(&format!(" {} relocations", hunk.relocations));
            }
            s.push('\n');
        }
        Some(s)
    }

    fn format_library(&self, library: &LibraryReport) -> Option<String> {
        if self.quiet {
            return None;
        }
        let mut s = String::new();
        match &library.known {
            Some(known) => {
                s.push_str(&format!("  Library:    {} {}", known.name, known.version));
                if let Some(slot) = known.slot {
                    s.push_str(&format!(" (slot {})", slot));
                }
                s.push('\n');
            }
            None => s.push_str("  Library:    unknown\n"),
        }
        if !library.title.is_empty() {
            s.push_str(&format!("  Title:      {}\n", library.title.join(" / ")));
        }
        let mut flags = Vec::new();
        if library.always_run {
            flags.push("always-run");
        }
        if library.ap20 {
            flags.push("AP20");
        }
        if !flags.is_empty() {
            s.push_str(&format!("  Flags:      {}\n", flags.join(", ")));
        }
        s.push_str(&format!(
            "  Routines:   {}  Tokens: {}\n",
            library.routines.len(),
            library.tokens.len()
        ));

        if self.verbose {
            for token in &library.tokens {
                s.push_str(&format!(
                    "    token {:>6} {:>6}  {}{}\n",
                    token.instruction, token.function, token.name, token.signature
                ));
            }
            for routine in &library.routines {
                s.push_str(&format!("    L{:<4} {:>6} bytes", routine.number, routine.length));
                if let Some(name) = &routine.name {
                    s.push_str(&format!("  {}", name));
                }
                if let Some(pattern) = &routine.pattern {
                    s.push_str(&format!(
                        "  [{} sections, {} refs",
                        pattern.sections.len(),
                        pattern.references().count()
                    ));
                    if let Some(target) = pattern.fallthrough_target {
                        s.push_str(&format!(", falls to L{}", target));
                    }
                    s.push(']');
                }
                s.push('\n');
            }
        }
        Some(s)
    }

    fn format_program(&self, program: &ProgramReport) -> Option<String> {
        if self.quiet {
            return None;
        }
        let mut s = format!("  Loader:     {} ({})\n", program.loader, program.loader_hash);
        s.push_str(&format!("  Flags:      ${:08x}", program.flags));
        if let Some(pivot) = program.pivot {
            s.push_str(&format!("  Pivot: ${:x}", pivot));
        }
        s.push('\n');
        s.push_str(&format!(
            "  Main:       {} bytes, {} relocations ({} in library)\n",
            program.main_length, program.main_relocations, program.library_relocations
        ));
        if program.has_amos_library {
            s.push_str("  AMOS lib:   present\n");
        }
        for bank in &program.banks {
            s.push_str(&format!("    {:<8}", bank.kind));
            if let Some(number) = bank.number {
                s.push_str(&format!(" #{}", number));
            }
            s.push_str(&format!(" {} bytes\n", bank.length));
        }
        Some(s)
    }

    fn format_notes(&self, notes: &[Note]) -> Option<String> {
        if self.quiet || notes.is_empty() {
            return None;
        }
        let mut s = String::from("  Notes:\n");
        for note in notes {
            let prefix = match note.level {
                NoteLevel::Info => "info",
                NoteLevel::Warning => "warning",
            };
            s.push_str(&format!("    [{}] {}", prefix, note.message));
            if let Some(context) = &note.context {
                s.push_str(&format!(" ({})", context));
            }
            s.push('\n');
        }
        Some(s)
    }

    fn format_listing(&self, instructions: &[Instruction], path: &Path) -> String {
        let mut s = self.format_file(path);
        for instruction in instructions {
            if self.quiet {
                s.push_str(&format!("{}\n", instruction.text));
                continue;
            }
            s.push_str(&format!(
                "{:08x}  {:<20}  {}\n",
                instruction.offset,
                hex::encode(&instruction.bytes),
                instruction.text
            ));
        }
        s
    }
}

/// JSON output formatter.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl JsonFormatter {
    /// Create a new JSON formatter with pretty printing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact JSON formatter.
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut out = json.unwrap_or_else(|_| "{}".to_string());
        out.push('\n');
        out
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new()
    }

    fn format_summary(&self, _report: &InspectReport) -> Option<String> {
        None
    }

    fn format_hunks(&self, _hunks: &[HunkSummary]) -> Option<String> {
        None
    }

    fn format_library(&self, _library: &LibraryReport) -> Option<String> {
        None
    }

    fn format_program(&self, _program: &ProgramReport) -> Option<String> {
        None
    }

    fn format_notes(&self, _notes: &[Note]) -> Option<String> {
        None
    }

    fn format_listing(&self, instructions: &[Instruction], path: &Path) -> String {
        #[derive(serde::Serialize)]
        struct ListingJson<'a> {
            path: String,
            instructions: &'a [Instruction],
        }

        self.render(&ListingJson {
            path: path.display().to_string(),
            instructions,
        })
    }

    fn format_report(&self, report: &InspectReport, path: &Path) -> String {
        #[derive(serde::Serialize)]
        struct ReportJson<'a> {
            path: String,
            #[serde(flatten)]
            report: &'a InspectReport,
        }

        self.render(&ReportJson {
            path: path.display().to_string(),
            report,
        })
    }
}

/// Short/compact output formatter.
///
/// One tab-separated line per file: path, kind, md5, hunk count, then the
/// known library name or loader kind when there is one.
#[derive(Debug, Clone, Default)]
pub struct ShortFormatter;

impl ShortFormatter {
    /// Create a new short formatter.
    pub fn new() -> Self {
        Self
    }
}

impl ReportFormatter for ShortFormatter {
    fn format_file(&self, _path: &Path) -> String {
        String::new()
    }

    fn format_summary(&self, _report: &InspectReport) -> Option<String> {
        None
    }

    fn format_hunks(&self, _hunks: &[HunkSummary]) -> Option<String> {
        None
    }

    fn format_library(&self, _library: &LibraryReport) -> Option<String> {
        None
    }

    fn format_program(&self, _program: &ProgramReport) -> Option<String> {
        None
    }

    fn format_notes(&self, _notes: &[Note]) -> Option<String> {
        None
    }

    fn format_listing(&self, instructions: &[Instruction], _path: &Path) -> String {
        instructions
            .iter()
            .map(|i| format!("{:x}\t{}\n", i.offset, i.text))
            .collect()
    }

    fn format_report(&self, report: &InspectReport, path: &Path) -> String {
        let detail = match (&report.library, &report.program) {
            (Some(library), _) => library
                .known
                .as_ref()
                .map(|k| format!("{} {}", k.name, k.version))
                .unwrap_or_default(),
            (None, Some(program)) => program.loader.to_string(),
            (None, None) => String::new(),
        };
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            path.display(),
            report.kind,
            report.md5,
            report.hunks.len(),
            detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architectures::m68k::disassemble;
    use crate::formats::hunk::{Hunk, HunkFile, HunkSize};
    use crate::patterns::to_code_pattern;
    use crate::types::{FileKind, KnownLibrary, RoutineReport};

    fn sample_report() -> InspectReport {
        let file = HunkFile::Complete {
            sizes: vec![HunkSize::from_word(1)],
            hunks: vec![Hunk::Code(vec![0x4E, 0x75, 0x4E, 0x71]), Hunk::End],
        };
        InspectReport::new(FileKind::Hunk, "00ff".to_string(), 32, &file)
            .with_library(LibraryReport {
                always_run: false,
                ap20: true,
                known: Some(KnownLibrary {
                    name: "Tools".to_string(),
                    version: "V1.01".to_string(),
                    slot: None,
                }),
                title: vec!["Tools".to_string()],
                tokens: Vec::new(),
                routines: vec![RoutineReport {
                    number: 0,
                    name: Some("Init".to_string()),
                    length: 2,
                    pattern: Some(to_code_pattern(&[0x4E, 0x75])),
                }],
            })
            .with_note(Note::warning("unregistered token").with_context("library"))
    }

    #[test]
    fn test_human_formatter() {
        let output = HumanFormatter::verbose().format_report(&sample_report(), Path::new("a.lib"));
        assert!(output.contains("File: a.lib"));
        assert!(output.contains("Kind:       library"));
        assert!(output.contains("Tools V1.01"));
        assert!(output.contains("AP20"));
        assert!(output.contains("L0"));
        assert!(output.contains("Init"));
        assert!(output.contains("[warning] unregistered token (library)"));
    }

    #[test]
    fn test_human_formatter_quiet() {
        let output = HumanFormatter::quiet().format_report(&sample_report(), Path::new("a.lib"));
        assert_eq!(output, "00ff\tlibrary\n");
    }

    #[test]
    fn test_json_formatter() {
        let output = JsonFormatter::compact().format_report(&sample_report(), Path::new("a.lib"));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["path"], "a.lib");
        assert_eq!(value["kind"], "library");
        assert_eq!(value["library"]["known"]["name"], "Tools");
        assert_eq!(value["notes"][0]["level"], "warning");
        assert!(value.get("program").is_none());
    }

    #[test]
    fn test_short_formatter() {
        let output = ShortFormatter::new().format_report(&sample_report(), Path::new("a.lib"));
        assert_eq!(output, "a.lib\tlibrary\t00ff\t2\tTools V1.01\n");
    }

    #[test]
    fn test_listing() {
        let listing = disassemble(&[0x70, 0x01, 0x4E, 0x75], 0);
        let human = HumanFormatter::new().format_listing(&listing, Path::new("x"));
        assert!(human.contains("00000000  7001"));
        assert!(human.contains("RTS"));

        let short = ShortFormatter::new().format_listing(&listing, Path::new("x"));
        assert_eq!(short, "0\tMOVEQ.L #1,D0\n2\tRTS\n");
    }
}
