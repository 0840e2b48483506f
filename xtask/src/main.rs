use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for attila-emu")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format check, clippy and the whole test suite
    Ci,
    /// Run the tests, optionally of a single emulator module
    Test {
        #[arg(long, value_enum)]
        module: Option<Module>,
    },
    /// Run the criterion benchmarks
    Bench {
        /// Only benchmarks whose name contains this string
        filter: Option<String>,
    },
    /// Replay a trace, writing frame dumps and the validation log
    Replay {
        trace: PathBuf,
        /// Stop after this many frames
        #[arg(short = 'f', long)]
        frames: Option<u32>,
        /// Directory receiving the dumps and validation.json
        #[arg(short = 'o', long, default_value = "target/replay")]
        out: PathBuf,
        #[arg(long)]
        release: bool,
    },
    /// Replay a trace and compare its validation log with a known good one
    Regress {
        trace: PathBuf,
        /// validation.json recorded by a reference run of the same trace
        #[arg(short = 'r', long)]
        reference: PathBuf,
        #[arg(short = 'f', long)]
        frames: Option<u32>,
        /// Mismatching records printed per section
        #[arg(long, default_value_t = 5)]
        show: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Module {
    Gpu,
    Memory,
    Texture,
    Mapper,
    Codec,
    Trace,
}

impl Module {
    fn path(self) -> &'static str {
        match self {
            Module::Gpu => "core::gpu",
            Module::Memory => "core::memory",
            Module::Texture => "core::texture_cache",
            Module::Mapper => "core::pixel_mapper",
            Module::Codec => "core::codec",
            Module::Trace => "core::trace",
        }
    }
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Ci => run_ci(),
        Commands::Test { module } => match module {
            Some(module) => cargo(["test", "--lib", module.path()]),
            None => cargo(["test", "--workspace"]),
        },
        Commands::Bench { filter } => match filter {
            Some(filter) => cargo(["bench", "--", filter.as_str()]),
            None => cargo(["bench"]),
        },
        Commands::Replay {
            trace,
            frames,
            out,
            release,
        } => replay(&trace, frames, &out, release).map(|_| ()),
        Commands::Regress {
            trace,
            reference,
            frames,
            show,
        } => regress(&trace, &reference, frames, show),
    }
}

fn cargo<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let status = Command::new("cargo")
        .args(&args)
        .status()
        .context("failed to start cargo")?;
    if !status.success() {
        bail!("cargo {} exited with {}", args[0].to_string_lossy(), status);
    }
    Ok(())
}

fn run_ci() -> Result<()> {
    let steps: [(&str, &[&str]); 3] = [
        ("Format", &["fmt", "--all", "--", "--check"]),
        ("Clippy", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]),
        ("Test", &["test", "--workspace"]),
    ];

    let start = Instant::now();
    for (name, args) in steps {
        println!("{} {}", "→".blue(), name.bold());
        cargo(args.iter().copied())?;
    }
    println!(
        "\n{} {}",
        "✓ CI passed in".green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

/// Run the emulator binary on `trace` with validation on, returning the log path
fn replay(trace: &Path, frames: Option<u32>, out: &Path, release: bool) -> Result<PathBuf> {
    if !trace.exists() {
        bail!("trace file not found: {}", trace.display());
    }
    fs::create_dir_all(out).with_context(|| format!("cannot create {}", out.display()))?;

    let mut args: Vec<OsString> = vec!["run".into(), "--quiet".into(), "--bin".into(), "attila-emu".into()];
    if release {
        args.push("--release".into());
    }
    args.extend([
        "--".into(),
        trace.into(),
        "--validation".into(),
        "--dump-dir".into(),
        out.into(),
    ]);
    if let Some(frames) = frames {
        args.extend(["--frames".into(), frames.to_string().into()]);
    }

    println!("{} Replaying {}", "→".blue(), trace.display().to_string().cyan());
    let start = Instant::now();
    cargo(args)?;
    println!(
        "{} Replay finished in {:.2}s, output in {}",
        "✓".green().bold(),
        start.elapsed().as_secs_f64(),
        out.display()
    );
    Ok(out.join("validation.json"))
}

fn regress(trace: &Path, reference: &Path, frames: Option<u32>, show: usize) -> Result<()> {
    let expected = read_log(reference)?;

    let stem = trace.file_stem().map_or_else(|| "trace".into(), |s| s.to_string_lossy().into_owned());
    let out = Path::new("target/regress").join(stem);
    let actual = read_log(&replay(trace, frames, &out, true)?)?;

    let diffs = diff_logs(&expected, &actual);
    let mut failed = false;
    for diff in &diffs {
        if diff.mismatches.is_empty() {
            println!("{} {}: {} records match", "✓".green(), diff.section, diff.actual);
            continue;
        }
        failed = true;
        println!(
            "{} {}: {} mismatches ({} expected records, {} recorded)",
            "✗".red().bold(),
            diff.section.bold(),
            diff.mismatches.len(),
            diff.expected,
            diff.actual
        );
        for (position, want, got) in diff.mismatches.iter().take(show) {
            println!("    #{position}");
            println!("      {} {}", "expected".yellow(), want);
            println!("      {} {}", "recorded".yellow(), got);
        }
    }

    if failed {
        bail!("validation log differs from {}", reference.display());
    }
    Ok(())
}

fn read_log(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a validation log", path.display()))
}

/// Records of one validation log section that differ between two runs
#[derive(Debug)]
struct SectionDiff {
    section: String,
    expected: usize,
    actual: usize,
    /// Position, expected record, recorded record (`null` when missing)
    mismatches: Vec<(usize, Value, Value)>,
}

/// Compare two validation logs section by section
///
/// Records are stored sorted by key, so equal runs line up position by position.
fn diff_logs(expected: &Value, actual: &Value) -> Vec<SectionDiff> {
    let mut sections = vec![
        ("vertices".to_string(), &expected["vertices"], &actual["vertices"]),
        ("z_stencil".to_string(), &expected["z_stencil"], &actual["z_stencil"]),
    ];
    let targets = records(&expected["color"]).len().max(records(&actual["color"]).len());
    for rt in 0..targets {
        sections.push((format!("color[{rt}]"), &expected["color"][rt], &actual["color"][rt]));
    }

    sections
        .into_iter()
        .map(|(section, want, got)| {
            let (want, got) = (records(want), records(got));
            let mismatches = (0..want.len().max(got.len()))
                .filter_map(|i| {
                    let a = want.get(i).cloned().unwrap_or(Value::Null);
                    let b = got.get(i).cloned().unwrap_or(Value::Null);
                    (a != b).then_some((i, a, b))
                })
                .collect();
            SectionDiff {
                section,
                expected: want.len(),
                actual: got.len(),
                mismatches,
            }
        })
        .collect()
}

fn records(section: &Value) -> &[Value] {
    section.as_array().map(Vec::as_slice).unwrap_or(&[])
}
