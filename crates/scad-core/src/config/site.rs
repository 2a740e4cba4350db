//! Site layout configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the host reads sources from and writes the built site to.
///
/// Both directories are interpreted relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDirs {
    /// Project root; the working directory handed to the compiler.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Directory scanned for `.scad` sources.
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Directory the built site (and exported meshes) are written to.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for SiteDirs {
    fn default() -> Self {
        Self {
            root: default_root(),
            input: default_input(),
            output: default_output(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_input() -> PathBuf {
    PathBuf::from(".")
}

fn default_output() -> PathBuf {
    PathBuf::from("_site")
}
