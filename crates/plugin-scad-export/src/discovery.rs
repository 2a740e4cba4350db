//! OpenSCAD installation discovery and launch path validation.
//!
//! Resolves a configured launch path before any file is processed:
//! 1. The `auto` / `nightly` aliases expand to the platform default binary
//! 2. Container launches require the container engine on PATH
//! 3. Native launches must exist on disk or be found on PATH
//!
//! Failures here are configuration errors and abort the build.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::launch::{CONTAINER_ENGINE, LaunchSpec};

/// Alias for the stable OpenSCAD build of the current platform.
pub const AUTO_ALIAS: &str = "auto";

/// Alias for the nightly OpenSCAD build of the current platform.
pub const NIGHTLY_ALIAS: &str = "nightly";

/// macOS application bundle binary, shared by stable and nightly.
const MACOS_BIN: &str = "/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD";

/// Which OpenSCAD release channel an alias refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinChannel {
    /// Released builds.
    Stable,
    /// Development snapshots.
    Nightly,
}

/// Default OpenSCAD location for `os` (a `std::env::consts::OS` value).
pub fn default_binary(os: &str, channel: BinChannel) -> Option<&'static str> {
    match (os, channel) {
        ("linux", BinChannel::Stable) => Some("openscad"),
        ("linux", BinChannel::Nightly) => Some("openscad-nightly"),
        ("macos", _) => Some(MACOS_BIN),
        ("windows", BinChannel::Stable) => Some("C:/Program Files/Openscad/openscad.exe"),
        ("windows", BinChannel::Nightly) => Some("C:/Program Files/Openscad/openscad-nightly.exe"),
        _ => None,
    }
}

/// Expand `auto` / `nightly` for the current platform.
pub fn expand_alias(launch_path: &str) -> Result<String, ExportError> {
    expand_alias_for(launch_path, std::env::consts::OS)
}

/// Expand `auto` / `nightly` for `os`; other values pass through unchanged.
pub fn expand_alias_for(launch_path: &str, os: &str) -> Result<String, ExportError> {
    let channel = match launch_path {
        AUTO_ALIAS => BinChannel::Stable,
        NIGHTLY_ALIAS => BinChannel::Nightly,
        _ => return Ok(launch_path.to_string()),
    };

    let bin = default_binary(os, channel).ok_or_else(|| ExportError::UnsupportedPlatform {
        platform: os.to_string(),
    })?;
    debug!(alias = launch_path, os, bin, "Expanded launch path alias");
    Ok(bin.to_string())
}

/// How the launch path was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// The configured path exists on disk.
    ExplicitPath,
    /// Found via the system PATH environment variable.
    SystemPath,
    /// Container engine found on PATH.
    ContainerEngine,
}

/// A validated launch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchResolution {
    /// What will be spawned; native executables are fully resolved.
    pub spec: LaunchSpec,
    /// How it was found.
    pub method: DiscoveryMethod,
}

/// Validate `launch_path` (after alias expansion).
pub fn resolve_launch_path(launch_path: &str) -> Result<LaunchResolution, ExportError> {
    if launch_path.trim().is_empty() {
        return Err(ExportError::LaunchPathMissing);
    }

    info!("Resolving OpenSCAD launch path '{}'", launch_path);

    match LaunchSpec::parse(launch_path) {
        spec @ LaunchSpec::Container { .. } => {
            let engine = which::which(CONTAINER_ENGINE).map_err(|e| {
                warn!(error = %e, "Container engine not found on PATH");
                ExportError::ContainerEngineNotFound {
                    engine: CONTAINER_ENGINE.to_string(),
                }
            })?;
            info!(
                engine = %engine.display(),
                image = ?spec.image(),
                "Using containerized OpenSCAD"
            );
            Ok(LaunchResolution {
                spec,
                method: DiscoveryMethod::ContainerEngine,
            })
        }
        LaunchSpec::Native { executable } => {
            let (path, method) = find_executable(&executable).ok_or_else(|| {
                ExportError::LaunchPathNotFound {
                    launch_path: launch_path.to_string(),
                }
            })?;
            info!(path = %path.display(), method = ?method, "Found OpenSCAD");
            Ok(LaunchResolution {
                spec: LaunchSpec::Native { executable: path },
                method,
            })
        }
    }
}

fn find_executable(executable: &Path) -> Option<(PathBuf, DiscoveryMethod)> {
    if executable.exists() {
        return Some((executable.to_path_buf(), DiscoveryMethod::ExplicitPath));
    }
    match which::which(executable) {
        Ok(path) => Some((path, DiscoveryMethod::SystemPath)),
        Err(e) => {
            debug!(executable = %executable.display(), error = %e, "PATH lookup failed");
            None
        }
    }
}
