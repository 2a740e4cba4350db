//! Content digest of a file.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::output::{self, OutputFormat};
use plugin_scad_export::cache::digest_file;
use scad_core::error::AppError;

/// Arguments for the hash command
#[derive(Debug, Args)]
pub struct HashArgs {
    /// File to digest
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct Digest {
    file: PathBuf,
    digest: String,
}

/// Execute the hash command
pub async fn execute(args: &HashArgs, format: OutputFormat) -> Result<(), AppError> {
    let digest = digest_file(&args.file).await?;

    match format {
        OutputFormat::Json => output::print_json(&Digest {
            file: args.file.clone(),
            digest: digest.to_string(),
        }),
        OutputFormat::Table => println!("{}  {}", digest, args.file.display()),
    }
    Ok(())
}
