//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tombstone_core::{Error, GeneratorConfig, Grammar, Result};

/// Soft-delete trigger, view and purge generator for T-SQL schemas.
#[derive(Parser, Debug)]
#[command(name = "tombstone")]
#[command(version, about = "Soft-delete object generator for T-SQL schemas", long_about = None)]
pub struct Args {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write generated objects and the manifest.
    Generate(RunArgs),
    /// Report diagnostics and out-of-date output without writing anything.
    Check(RunArgs),
}

/// Options shared by every command.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Root of the DDL tree.
    #[arg(default_value = ".")]
    pub input: PathBuf,

    /// Directory for generated files.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (default: tombstone.toml in the input root).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Manifest path (default: tombstone.manifest.json in the output directory).
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Schema assumed for unqualified names.
    #[arg(long)]
    pub default_schema: Option<String>,

    /// DDL grammar: sql160 or sql130.
    #[arg(long)]
    pub grammar: Option<Grammar>,

    /// Schema of the purge procedure.
    #[arg(long)]
    pub purge_schema: Option<String>,

    /// Default retention of the purge procedure, in days.
    #[arg(long)]
    pub retention_days: Option<u32>,
}

impl RunArgs {
    /// Load the configuration file and apply the flags on top of it.
    ///
    /// Paths given on the command line are taken relative to the working
    /// directory, not the input root.
    pub fn into_config(self) -> Result<(PathBuf, GeneratorConfig)> {
        let mut config = GeneratorConfig::discover(&self.input, self.config.as_deref())?;

        if let Some(output) = self.output {
            config = config.with_output_dir(absolute(&output)?);
        }
        if let Some(manifest) = self.manifest {
            config = config.with_manifest_path(absolute(&manifest)?);
        }
        if let Some(schema) = self.default_schema {
            config = config.with_default_schema(schema);
        }
        if let Some(grammar) = self.grammar {
            config = config.with_grammar(grammar);
        }
        if let Some(schema) = self.purge_schema {
            config = config.with_purge_schema(schema);
        }
        if let Some(days) = self.retention_days {
            config = config.with_retention_days(days);
        }

        config.validate()?;
        Ok((self.input, config))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::io(path, e))
}
