//! Error type for the SCAD export plugin.
//!
//! Configuration problems (launch path) are fatal for a build and map to
//! `ErrorKind::Configuration`; everything else is a per-file failure.

use std::path::PathBuf;

use scad_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Unified error type for all export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    // --- Configuration errors ---
    /// No launch path configured.
    #[error("launchPath cannot be empty")]
    LaunchPathMissing,

    /// Native launch path neither exists nor resolves on PATH.
    #[error("The launchPath \"{launch_path}\" does not exist and could not be found on PATH")]
    LaunchPathNotFound {
        /// The configured launch path.
        launch_path: String,
    },

    /// Container launch requested but the engine is not on PATH.
    #[error("Container engine \"{engine}\" could not be found on PATH")]
    ContainerEngineNotFound {
        /// Engine executable name.
        engine: String,
    },

    /// `auto` / `nightly` alias has no default for this platform.
    #[error("No default OpenSCAD location for platform \"{platform}\"")]
    UnsupportedPlatform {
        /// `std::env::consts::OS` value.
        platform: String,
    },

    // --- Page errors ---
    /// The page has no permalink, so there is nowhere to write the mesh.
    #[error("{input} must have a permalink to export a mesh")]
    MissingPermalink {
        /// Source of the page.
        input: PathBuf,
    },

    // --- Filesystem errors ---
    /// A source file could not be read for hashing.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// The file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Whether this error must abort the whole build.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::LaunchPathMissing
                | Self::LaunchPathNotFound { .. }
                | Self::ContainerEngineNotFound { .. }
                | Self::UnsupportedPlatform { .. }
        )
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        let kind = match &err {
            ExportError::LaunchPathMissing
            | ExportError::LaunchPathNotFound { .. }
            | ExportError::ContainerEngineNotFound { .. }
            | ExportError::UnsupportedPlatform { .. } => ErrorKind::Configuration,
            ExportError::MissingPermalink { .. } => ErrorKind::Validation,
            ExportError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            ExportError::Read { .. } | ExportError::OutputDir { .. } => ErrorKind::Storage,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err: AppError = ExportError::LaunchPathNotFound {
            launch_path: "/nope/openscad".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.message.contains("/nope/openscad"));
    }

    #[test]
    fn test_read_not_found_maps_to_not_found() {
        let err: AppError = ExportError::Read {
            path: PathBuf::from("cube.scad"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_permalink_is_validation() {
        let err: AppError = ExportError::MissingPermalink {
            input: PathBuf::from("cube.scad"),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_kind_agrees_with_is_configuration() {
        let errors = [
            ExportError::LaunchPathMissing,
            ExportError::ContainerEngineNotFound {
                engine: "docker".to_string(),
            },
            ExportError::UnsupportedPlatform {
                platform: "haiku".to_string(),
            },
            ExportError::OutputDir {
                path: PathBuf::from("_site/cube"),
                source: std::io::Error::other("read-only"),
            },
        ];
        for err in errors {
            let fatal = err.is_configuration();
            let app: AppError = err.into();
            assert_eq!(app.is_fatal(), fatal, "{app}");
        }
    }
}
