//! AMOS Inspect CLI
//!
//! Command-line tool for examining AMOS programs, extension libraries and
//! the Amiga hunk files they are stored in.

use amos_inspect::architectures::m68k::{disassemble, read_unconditional_execution};
use amos_inspect::formats::{hunk, unpack};
use amos_inspect::formatter::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter};
use amos_inspect::{compile_library, inspect_bytes, inspect_library, inspect_program, read_library};
use amos_inspect::{InspectOptions, InspectReport};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// AMOS binary inspector.
///
/// Parses hunk files, unpacks PowerPacker, StoneCracker and squash data,
/// splits AMOS libraries into routines and disassembles 68000 code.
#[derive(Parser, Debug)]
#[command(name = "amos-inspect")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(short, long, global = true, default_value = "human", env = "AMOS_INSPECT_FORMAT")]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Parse files as stored, without removing packer stubs
    #[arg(long, global = true)]
    no_unpack: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the hunks of hunk files
    Hunks {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyse AMOS extension libraries
    Lib {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Analyse AMOS compiled programs
    Program {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Disassemble 68000 code
    Disasm {
        file: PathBuf,
        /// Start offset in bytes
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Number of bytes to decode
        #[arg(long)]
        length: Option<usize>,
        /// Stop after the first unconditional jump or return
        #[arg(long)]
        until_return: bool,
        /// Decode the first code hunk instead of the raw file
        #[arg(long)]
        hunk: bool,
    },
    /// Relink a library's routines into a relocatable hunk file
    Compile {
        file: PathBuf,
        /// Output path (defaults to the input with a `.hunk` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyse every library under a directory (needs the `batch` feature)
    Scan {
        dir: PathBuf,
        /// File extension to match, case-insensitively
        #[arg(long, default_value = "lib")]
        extension: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact single-line output
    Short,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("amos_inspect=debug")
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => return,
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn formatter(args: &Args) -> Box<dyn ReportFormatter> {
    match args.format {
        OutputFormat::Human if args.quiet => Box::new(HumanFormatter::quiet()),
        OutputFormat::Human if args.verbose => Box::new(HumanFormatter::verbose()),
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json if args.quiet => Box::new(JsonFormatter::compact()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Short => Box::new(ShortFormatter::new()),
    }
}

/// Run the selected command; `Ok(false)` means some input failed.
fn run(args: &Args) -> Result<bool> {
    let options = InspectOptions {
        unpack: !args.no_unpack,
        ..InspectOptions::default()
    };
    let out = formatter(args);

    match &args.command {
        Command::Hunks { files } => {
            let options = InspectOptions {
                patterns: false,
                ..options.clone()
            };
            Ok(each_file(
                files,
                args,
                |data| Ok(inspect_bytes(data, &options)?),
                out.as_ref(),
            ))
        }
        Command::Lib { files } => Ok(each_file(
            files,
            args,
            |data| Ok(inspect_library(data, &options)?),
            out.as_ref(),
        )),
        Command::Program { files } => Ok(each_file(
            files,
            args,
            |data| Ok(inspect_program(data, &options)?),
            out.as_ref(),
        )),
        Command::Disasm {
            file,
            offset,
            length,
            until_return,
            hunk,
        } => {
            let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            let code = if *hunk {
                first_code_hunk(&data, &options)?
            } else {
                data
            };
            if *offset > code.len() {
                bail!("offset {} is past the end ({} bytes)", offset, code.len());
            }
            let end = if *until_return {
                read_unconditional_execution(&code, *offset)?.end
            } else {
                span_end(*offset, *length, code.len())
            };
            let mut listing = disassemble(&code[*offset..end], *offset);
            if length.is_none() && !*until_return {
                listing.truncate(options.max_instructions);
            }
            print!("{}", out.format_listing(&listing, file));
            Ok(true)
        }
        Command::Compile { file, output } => {
            let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            let info = read_library(&data, &options)
                .with_context(|| format!("parsing {}", file.display()))?;
            let compiled = compile_library(&info)?;
            let target = output
                .clone()
                .unwrap_or_else(|| file.with_extension("hunk"));
            std::fs::write(&target, hunk::write(&compiled.to_hunk_file()))
                .with_context(|| format!("writing {}", target.display()))?;
            if !args.quiet {
                eprintln!(
                    "{}: {} routines, {} bytes, {} relocations",
                    target.display(),
                    compiled.routines.len(),
                    compiled.code.len(),
                    compiled.relocations.len()
                );
            }
            Ok(true)
        }
        Command::Scan { dir, extension } => scan(dir, extension, &options, args, out.as_ref()),
    }
}

/// End of a `--length` span, clamped to the buffer.
fn span_end(offset: usize, length: Option<usize>, available: usize) -> usize {
    length.map_or(available, |len| offset.saturating_add(len).min(available))
}

fn first_code_hunk(data: &[u8], options: &InspectOptions) -> Result<Vec<u8>> {
    let file = if options.unpack {
        unpack::parse_unpacked(data)?
    } else {
        hunk::parse(data)?
    };
    file.into_hunks()
        .into_iter()
        .find_map(|h| match h {
            hunk::Hunk::Code(code) => Some(code),
            _ => None,
        })
        .context("no code hunk")
}

fn each_file<F>(files: &[PathBuf], args: &Args, inspect: F, out: &dyn ReportFormatter) -> bool
where
    F: Fn(&[u8]) -> Result<InspectReport>,
{
    let mut success = true;
    for path in files {
        match read_and_inspect(path, &inspect) {
            Ok(report) => print!("{}", out.format_report(&report, path)),
            Err(e) => {
                if !args.quiet {
                    eprintln!("Error analyzing {}: {:#}", path.display(), e);
                }
                success = false;
            }
        }
    }
    success
}

fn read_and_inspect<F>(path: &Path, inspect: F) -> Result<InspectReport>
where
    F: Fn(&[u8]) -> Result<InspectReport>,
{
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    inspect(&data)
}

#[cfg(feature = "batch")]
fn scan(
    dir: &Path,
    extension: &str,
    options: &InspectOptions,
    args: &Args,
    out: &dyn ReportFormatter,
) -> Result<bool> {
    use rayon::prelude::*;

    let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(%e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    tracing::debug!(count = files.len(), "scanning libraries");

    let results: Vec<(PathBuf, Result<InspectReport>)> = files
        .into_par_iter()
        .map(|path| {
            let report = read_and_inspect(&path, |data| Ok(inspect_library(data, options)?));
            (path, report)
        })
        .collect();

    let mut success = true;
    for (path, result) in results {
        match result {
            Ok(report) => print!("{}", out.format_report(&report, &path)),
            Err(e) => {
                if !args.quiet {
                    eprintln!("Error analyzing {}: {:#}", path.display(), e);
                }
                success = false;
            }
        }
    }
    Ok(success)
}

#[cfg(not(feature = "batch"))]
fn scan(
    _dir: &Path,
    _extension: &str,
    _options: &InspectOptions,
    _args: &Args,
    _out: &dyn ReportFormatter,
) -> Result<bool> {
    bail!("directory scanning needs the `batch` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["amos-inspect", "lib", "Music.Lib"]).unwrap();
        assert!(matches!(args.command, Command::Lib { ref files } if files.len() == 1));
        assert!(!args.verbose);
        assert!(!args.no_unpack);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["amos-inspect", "hunks", "a", "b", "-f", "json", "--no-unpack"])
                .unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
        assert!(args.no_unpack);
    }

    #[test]
    fn test_disasm_options() {
        let args = Args::try_parse_from([
            "amos-inspect",
            "disasm",
            "code.bin",
            "--offset",
            "16",
            "--until-return",
        ])
        .unwrap();
        match args.command {
            Command::Disasm {
                offset,
                until_return,
                hunk,
                length,
                ..
            } => {
                assert_eq!(offset, 16);
                assert!(until_return);
                assert!(!hunk);
                assert_eq!(length, None);
            }
            _ => panic!("expected disasm"),
        }
    }

    #[test]
    fn test_span_end() {
        assert_eq!(span_end(4, None, 10), 10);
        assert_eq!(span_end(4, Some(2), 10), 6);
        assert_eq!(span_end(4, Some(100), 10), 10);
        assert_eq!(span_end(4, Some(usize::MAX), 10), 10);
    }

    #[test]
    fn test_quiet_json_is_compact() {
        let args =
            Args::try_parse_from(["amos-inspect", "-q", "-f", "json", "hunks", "a"]).unwrap();
        let json = formatter(&args).format_listing(&[], Path::new("a"));
        assert_eq!(json, "{\"path\":\"a\",\"instructions\":[]}\n");
    }

    #[test]
    fn test_files_required() {
        assert!(Args::try_parse_from(["amos-inspect", "program"]).is_err());
    }
}
