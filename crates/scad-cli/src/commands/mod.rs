//! CLI command definitions and dispatch.

pub mod build;
pub mod export;
pub mod hash;
pub mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use scad_core::error::AppError;
use scad_core::{PartialScadOptions, ScadOptions, SiteConfig};

/// scad: incremental OpenSCAD mesh export for static sites
#[derive(Debug, Parser)]
#[command(name = "scad", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ./scad.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one build pass over every model in the input directory
    Build(build::BuildArgs),
    /// Export a single model, ignoring the cache
    Export(export::ExportArgs),
    /// Resolve the launch path and show how OpenSCAD will be started
    Resolve(resolve::ResolveArgs),
    /// Print the content digest of a file
    Hash(hash::HashArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: SiteConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Build(args) => build::execute(args, &config, self.format).await,
            Commands::Export(args) => export::execute(args, &config, self.format).await,
            Commands::Resolve(args) => resolve::execute(args, &config, self.format).await,
            Commands::Hash(args) => hash::execute(args, self.format).await,
        }
    }
}

/// Helper: plugin options from environment, config file and command line,
/// in increasing precedence.
pub fn plugin_options(
    config: &SiteConfig,
    overrides: PartialScadOptions,
) -> Result<ScadOptions, AppError> {
    let from_env = PartialScadOptions::from_process_env()?;
    Ok(from_env.merge(config.scad.clone()).merge(overrides).resolve())
}
