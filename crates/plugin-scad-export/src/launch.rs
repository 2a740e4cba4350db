//! Launch specifications: how OpenSCAD gets started.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use scad_core::config::scad::DEFAULT_DOCKER_TAG;

/// Token that selects containerized execution, and the engine executable.
pub const CONTAINER_ENGINE: &str = "docker";

/// OpenSCAD container image.
pub const SCAD_IMAGE: &str = "openscad/openscad";

/// Mount point of the working directory inside the container.
pub const CONTAINER_WORKDIR: &str = "/openscad";

/// OpenSCAD executable inside the container.
pub const CONTAINER_SCAD_BIN: &str = "openscad";

/// Tag that maps to the untagged image.
const LATEST_TAG: &str = "latest";

/// How to start the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaunchSpec {
    /// Run a locally installed executable (path or bare name).
    Native {
        /// Executable path or name looked up on PATH.
        executable: PathBuf,
    },
    /// Run the OpenSCAD image through the container engine.
    Container {
        /// Image tag; `None` means [`DEFAULT_DOCKER_TAG`].
        tag: Option<String>,
    },
}

impl LaunchSpec {
    /// Parse a launch path string.
    ///
    /// Strings starting or ending with `docker` select the container; the
    /// text after the first `:` is the tag (empty means default). Anything
    /// else is the native executable.
    pub fn parse(launch_path: &str) -> Self {
        if is_container_launch(launch_path) {
            let tag = launch_path
                .split_once(':')
                .map(|(_, tag)| tag)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string);
            Self::Container { tag }
        } else {
            Self::Native {
                executable: PathBuf::from(launch_path),
            }
        }
    }

    /// Whether this runs inside a container.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container { .. })
    }

    /// Effective container tag, `None` for native launches.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Container { tag } => Some(tag.as_deref().unwrap_or(DEFAULT_DOCKER_TAG)),
            Self::Native { .. } => None,
        }
    }

    /// Container image reference, `None` for native launches.
    pub fn image(&self) -> Option<String> {
        self.tag().map(|tag| {
            if tag == LATEST_TAG {
                SCAD_IMAGE.to_string()
            } else {
                format!("{SCAD_IMAGE}:{tag}")
            }
        })
    }

    /// The program that gets spawned.
    pub fn program(&self) -> &Path {
        match self {
            Self::Native { executable } => executable,
            Self::Container { .. } => Path::new(CONTAINER_ENGINE),
        }
    }
}

impl From<&str> for LaunchSpec {
    fn from(launch_path: &str) -> Self {
        Self::parse(launch_path)
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native { executable } => write!(f, "{}", executable.display()),
            Self::Container { .. } => {
                write!(f, "{CONTAINER_ENGINE}:{}", self.tag().unwrap_or(DEFAULT_DOCKER_TAG))
            }
        }
    }
}

/// Whether `launch_path` selects containerized execution.
pub fn is_container_launch(launch_path: &str) -> bool {
    launch_path.starts_with(CONTAINER_ENGINE) || launch_path.ends_with(CONTAINER_ENGINE)
}
