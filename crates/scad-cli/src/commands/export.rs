//! Single-file export.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::output::{self, OutputFormat};
use plugin_scad_export::plugin::launch_spec;
use plugin_scad_export::{ExportFiles, ProcessInvoker};
use scad_core::error::AppError;
use scad_core::{PartialScadOptions, SiteConfig};

/// Arguments for the export command
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Model to compile, absolute or relative to --cwd
    pub input: PathBuf,
    /// Mesh to write, absolute or relative to --cwd
    pub output: PathBuf,
    /// Working directory for OpenSCAD (and the container mount)
    #[arg(long, default_value = ".")]
    pub cwd: PathBuf,
    /// How to launch OpenSCAD (path, auto, nightly, docker, docker:<tag>)
    #[arg(short, long)]
    pub launch_path: Option<String>,
}

/// Execute the export command
pub async fn execute(
    args: &ExportArgs,
    config: &SiteConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let overrides = PartialScadOptions {
        launch_path: args.launch_path.clone(),
        ..PartialScadOptions::default()
    };
    let options = super::plugin_options(config, overrides)?;
    let launch = launch_spec(&options)?;

    let files = ExportFiles::new(&args.cwd, &args.input, &args.output);
    let result = ProcessInvoker::new().run_export(&launch, &files).await?;

    match format {
        OutputFormat::Json => output::print_json(&result),
        OutputFormat::Table => {
            output::print_kv("Launch", &launch.to_string());
            output::print_kv("Input", &files.input_arg());
            output::print_kv("Output", &files.output_arg());
            output::print_kv(
                "Exit code",
                &result
                    .exit_code
                    .map_or_else(|| "none".to_string(), |c| c.to_string()),
            );
            output::print_kv("Duration", &format!("{:.2}s", result.duration_secs()));
            for line in result.lines() {
                println!("    {}", line);
            }
        }
    }

    if !result.ok {
        return Err(AppError::external_process(format!(
            "OpenSCAD failed to export {}",
            args.input.display()
        )));
    }

    info!("Wrote {} in {:.2} seconds", args.output.display(), result.duration_secs());
    Ok(())
}
