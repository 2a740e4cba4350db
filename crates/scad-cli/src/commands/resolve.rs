//! Launch path resolution.

use clap::Args;
use serde::Serialize;

use crate::output::{self, OutputFormat};
use plugin_scad_export::LaunchSpec;
use plugin_scad_export::discovery::{DiscoveryMethod, expand_alias, resolve_launch_path};
use scad_core::error::AppError;
use scad_core::{PartialScadOptions, SiteConfig};

/// Arguments for the resolve command
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Launch path to resolve instead of the configured one
    #[arg(short, long)]
    pub launch_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct Resolved {
    configured: String,
    spec: LaunchSpec,
    method: DiscoveryMethod,
    image: Option<String>,
}

/// Execute the resolve command
pub async fn execute(
    args: &ResolveArgs,
    config: &SiteConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let overrides = PartialScadOptions {
        launch_path: args.launch_path.clone(),
        ..PartialScadOptions::default()
    };
    let options = super::plugin_options(config, overrides)?;

    let expanded = expand_alias(&options.launch_path)?;
    let resolution = resolve_launch_path(&expanded)?;

    let resolved = Resolved {
        configured: options.launch_path,
        image: resolution.spec.image(),
        spec: resolution.spec,
        method: resolution.method,
    };

    match format {
        OutputFormat::Json => output::print_json(&resolved),
        OutputFormat::Table => {
            output::print_kv("Configured", &resolved.configured);
            output::print_kv("Launch", &resolved.spec.to_string());
            output::print_kv("Found via", &format!("{:?}", resolved.method));
            if let Some(ref image) = resolved.image {
                output::print_kv("Image", image);
            }
        }
    }
    Ok(())
}
