//! tombstone command-line interface.
//!
//! `tombstone generate` writes the generated objects and the manifest;
//! `tombstone check` reports what `generate` would change. Both print every
//! diagnostic to stderr in `path(line,col): severity CODE: message` form.
//!
//! Exit status: 0 on success, 1 when an error diagnostic was raised (or, for
//! `check`, when output is out of date), 2 when the run itself failed.

mod args;

pub use args::{Args, Command, RunArgs};

use std::process::ExitCode;
use tombstone_core::{FileChange, Result, RunReport};

/// Exit status for a run with error diagnostics or stale output.
pub const EXIT_FAILED_CHECKS: u8 = 1;
/// Exit status for I/O and configuration failures.
pub const EXIT_ERROR: u8 = 2;

/// Run a parsed command line.
pub fn run(args: Args) -> ExitCode {
    let outcome = match args.command {
        Command::Generate(run) => generate(run),
        Command::Check(run) => check(run),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("tombstone: error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn generate(args: RunArgs) -> Result<ExitCode> {
    let (input, config) = args.into_config()?;
    let report = tombstone_core::generate(&input, &config)?;
    print_diagnostics(&report);
    summarize(&report);

    if report.analysis.has_errors() {
        Ok(ExitCode::from(EXIT_FAILED_CHECKS))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn check(args: RunArgs) -> Result<ExitCode> {
    let (input, config) = args.into_config()?;
    let report = tombstone_core::check(&input, &config)?;
    print_diagnostics(&report);

    for (file, change) in &report.changes {
        let action = match change {
            FileChange::Create => "missing",
            FileChange::Update => "out of date",
            FileChange::Remove => "stale",
            FileChange::Unchanged => continue,
        };
        println!("{}: {}", report.output_dir.join(file).display(), action);
    }
    if report.manifest_changed {
        println!("{}: out of date", report.manifest_path.display());
    }
    summarize(&report);

    if report.analysis.has_errors() || !report.is_up_to_date() {
        Ok(ExitCode::from(EXIT_FAILED_CHECKS))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn print_diagnostics(report: &RunReport) {
    for diagnostic in &report.analysis.diagnostics {
        eprintln!("{}", diagnostic);
    }
}

fn summarize(report: &RunReport) {
    let stats = &report.analysis.manifest.statistics;
    tracing::info!(
        tables = stats.tables,
        participating = stats.participating_tables,
        generated = stats.generated_objects,
        suppressed = stats.suppressed_objects,
        warnings = stats.warnings,
        errors = stats.errors,
        changed = report.changes.len(),
        "done"
    );
}
