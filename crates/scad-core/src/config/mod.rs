//! Application configuration schemas.
//!
//! The root [`SiteConfig`] is deserialized via the `config` crate from an
//! optional TOML file layered with `SCAD_SITE__*` environment variables.
//! Plugin options additionally honour the flat `SCAD_*` variables described
//! in [`scad`].

pub mod logging;
pub mod scad;
pub mod site;

use std::path::Path;

use serde::{Deserialize, Serialize};

use self::logging::LoggingConfig;
use self::scad::{PartialScadOptions, ScadOptions};
use self::site::SiteDirs;

use crate::error::AppError;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "scad.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Source and output directories.
    pub site: SiteDirs,
    /// Plugin options as written in the config file.
    pub scad: PartialScadOptions,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl SiteConfig {
    /// Load configuration from `path` (or [`DEFAULT_CONFIG_FILE`]) and
    /// `SCAD_SITE__*` environment variables.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), false),
        };

        let config = config::Config::builder()
            .add_source(config::File::from(file).required(required))
            .add_source(
                config::Environment::with_prefix("SCAD_SITE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Resolve plugin options: environment first, then the config file on
    /// top, then defaults for anything still unset.
    pub fn plugin_options(&self, from_env: PartialScadOptions) -> ScadOptions {
        from_env.merge(self.scad.clone()).resolve()
    }
}
