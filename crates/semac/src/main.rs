//! semac - semantic analyzer for JSON-serialized syntax trees
//!
//! Usage: semac [OPTIONS] <INPUT>...

use anyhow::{bail, Context};
use clap::{Parser as ClapParser, ValueEnum};
use log::LevelFilter;
use semac::common::{DiagnosticReporter, SourceRef};
use semac::driver::{Session, SessionConfig, SessionStatus, UnitResult};
use semac::sema::{AnalyzerConfig, Diagnostic};
use serde::Serialize;
use simple_logger::SimpleLogger;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

/// Diagnostic output format
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
enum Format {
    /// Rendered for a terminal
    #[default]
    Human,
    /// One JSON document on stdout
    Json,
}

#[derive(ClapParser, Debug)]
#[command(name = "semac")]
#[command(version)]
#[command(about = "Semantic analyzer for JSON-serialized abstract syntax trees", long_about = None)]
struct Args {
    /// AST files to analyze (JSON)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Original source text of the input, for annotated snippets
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output format (human or json)
    #[arg(short, long, value_enum, default_value = "human")]
    format: Format,

    /// Do not warn about unused variables and parameters
    #[arg(long)]
    no_warn_unused: bool,

    /// Maximum nesting depth of statements and expressions
    #[arg(long, default_value = "512")]
    max_depth: usize,

    /// Verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(status) => process::exit(status.code()),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(SessionStatus::Fatal.code());
        }
    }
}

fn run(args: &Args) -> anyhow::Result<SessionStatus> {
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("failed to initialize logging")?;

    if args.source.is_some() && args.inputs.len() > 1 {
        bail!("--source can only be used with a single input file");
    }

    let config = SessionConfig {
        analyzer: AnalyzerConfig {
            warn_unused: !args.no_warn_unused,
            max_depth: args.max_depth,
        },
        ..SessionConfig::default()
    };
    log::info!("analyzing {} file(s)", args.inputs.len());
    let results = Session::new(config).analyze_files(&args.inputs);

    match args.format {
        Format::Human => report_human(args, &results)?,
        Format::Json => report_json(args, &results)?,
    }

    Ok(SessionStatus::of(&results))
}

fn report_human(args: &Args, results: &[UnitResult]) -> anyhow::Result<()> {
    let mut reporter = DiagnosticReporter::new();
    let file_id = match &args.source {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read source file {}", path.display()))?;
            Some(reporter.add_file(path.display().to_string(), text))
        }
        None => None,
    };

    for unit in results {
        let path = unit.path.display().to_string();
        let analysis = match &unit.outcome {
            Ok(analysis) => analysis,
            Err(e) => {
                reporter.report_error(&path, e);
                continue;
            }
        };

        let source = file_id.map_or(SourceRef::Path(&path), SourceRef::File);
        for diagnostic in &analysis.diagnostics {
            if args.quiet && !diagnostic.is_error() {
                continue;
            }
            reporter.report(source, diagnostic);
        }

        if !args.quiet {
            eprintln!(
                "{path}: {} error(s), {} warning(s)",
                analysis.diagnostics.error_count(),
                analysis.diagnostics.warning_count()
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct UnitReport<'a> {
    path: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fatal: Option<String>,
    diagnostics: Vec<&'a Diagnostic>,
}

fn report_json(args: &Args, results: &[UnitResult]) -> anyhow::Result<()> {
    let reports: Vec<_> = results
        .iter()
        .map(|unit| match &unit.outcome {
            Ok(analysis) => UnitReport {
                path: unit.path.display().to_string(),
                success: analysis.is_success(),
                fatal: None,
                diagnostics: analysis
                    .diagnostics
                    .iter()
                    .filter(|d| !args.quiet || d.is_error())
                    .collect(),
            },
            Err(e) => UnitReport {
                path: unit.path.display().to_string(),
                success: false,
                fatal: Some(e.to_string()),
                diagnostics: Vec::new(),
            },
        })
        .collect();

    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &reports).context("failed to write JSON report")?;
    writeln!(out)?;
    Ok(())
}
