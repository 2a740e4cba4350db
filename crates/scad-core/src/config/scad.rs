//! OpenSCAD plugin options.
//!
//! Options come from three layers: built-in defaults, `SCAD_*` environment
//! variables, and explicit options (config file or command line). Explicit
//! options win over the environment, which wins over defaults.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::result::AppResult;

/// Default OpenSCAD container tag.
///
/// See <https://hub.docker.com/r/openscad/openscad>.
pub const DEFAULT_DOCKER_TAG: &str = "dev";

/// Default viewer theme.
pub const DEFAULT_THEME: &str = "Traditional";

/// Default layout used for generated viewer pages.
pub const DEFAULT_LAYOUT: &str = "scad.viewer.njk";

/// Environment variable names for each option.
pub mod env {
    /// `launch_path`
    pub const LAUNCH_PATH: &str = "SCAD_LAUNCH_PATH";
    /// `theme`
    pub const THEME: &str = "SCAD_THEME";
    /// `layout`
    pub const LAYOUT: &str = "SCAD_LAYOUT";
    /// `resolve_launch_path`
    pub const RESOLVE_LAUNCH_PATH: &str = "SCAD_RESOLVE_LAUNCH_PATH";
    /// `verbose`
    pub const VERBOSE: &str = "SCAD_VERBOSE";
    /// `no_stl`
    pub const NO_STL: &str = "SCAD_NO_STL";
    /// `silent`
    pub const SILENT: &str = "SCAD_SILENT";
}

/// Fully resolved plugin options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScadOptions {
    /// How to launch OpenSCAD: a binary path/name, `auto`, `nightly`,
    /// `docker`, or `docker:<tag>`.
    pub launch_path: String,
    /// Viewer page theme.
    pub theme: String,
    /// Layout used for viewer pages.
    pub layout: String,
    /// Verify the launch path exists when the plugin is registered.
    pub resolve_launch_path: bool,
    /// Echo compiler output after successful exports.
    pub verbose: bool,
    /// Skip mesh export entirely.
    pub no_stl: bool,
    /// Suppress progress output (errors are still reported).
    pub silent: bool,
}

impl Default for ScadOptions {
    fn default() -> Self {
        Self {
            launch_path: format!("docker:{DEFAULT_DOCKER_TAG}"),
            theme: DEFAULT_THEME.to_string(),
            layout: DEFAULT_LAYOUT.to_string(),
            resolve_launch_path: true,
            verbose: true,
            no_stl: false,
            silent: false,
        }
    }
}

/// Plugin options where every field is optional.
///
/// This is the deserialization target for config files and the result of
/// reading the environment; [`PartialScadOptions::resolve`] fills the gaps
/// with defaults. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialScadOptions {
    /// See [`ScadOptions::launch_path`].
    pub launch_path: Option<String>,
    /// See [`ScadOptions::theme`].
    pub theme: Option<String>,
    /// See [`ScadOptions::layout`].
    pub layout: Option<String>,
    /// See [`ScadOptions::resolve_launch_path`].
    pub resolve_launch_path: Option<bool>,
    /// See [`ScadOptions::verbose`].
    pub verbose: Option<bool>,
    /// See [`ScadOptions::no_stl`].
    pub no_stl: Option<bool>,
    /// See [`ScadOptions::silent`].
    pub silent: Option<bool>,
}

impl PartialScadOptions {
    /// Read options from `SCAD_*` variables through `lookup`.
    ///
    /// Unset and empty variables are ignored. A boolean variable holding an
    /// unrecognised value is a configuration error.
    pub fn from_env<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str| -> Option<String> {
            let value = lookup(name).filter(|v| !v.is_empty());
            if let Some(ref v) = value {
                debug!(var = name, value = %v, "Option from environment");
            }
            value
        };
        let boolean = |name: &str| -> AppResult<Option<bool>> {
            string(name).map(|v| parse_string_bool(name, &v)).transpose()
        };

        Ok(Self {
            launch_path: string(env::LAUNCH_PATH),
            theme: string(env::THEME),
            layout: string(env::LAYOUT),
            resolve_launch_path: boolean(env::RESOLVE_LAUNCH_PATH)?,
            verbose: boolean(env::VERBOSE)?,
            no_stl: boolean(env::NO_STL)?,
            silent: boolean(env::SILENT)?,
        })
    }

    /// Read options from the process environment.
    pub fn from_process_env() -> AppResult<Self> {
        Self::from_env(|name| std::env::var(name).ok())
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            launch_path: other.launch_path.or(self.launch_path),
            theme: other.theme.or(self.theme),
            layout: other.layout.or(self.layout),
            resolve_launch_path: other.resolve_launch_path.or(self.resolve_launch_path),
            verbose: other.verbose.or(self.verbose),
            no_stl: other.no_stl.or(self.no_stl),
            silent: other.silent.or(self.silent),
        }
    }

    /// Fill every unset field with its default.
    pub fn resolve(self) -> ScadOptions {
        let d = ScadOptions::default();
        ScadOptions {
            launch_path: self.launch_path.unwrap_or(d.launch_path),
            theme: self.theme.unwrap_or(d.theme),
            layout: self.layout.unwrap_or(d.layout),
            resolve_launch_path: self.resolve_launch_path.unwrap_or(d.resolve_launch_path),
            verbose: self.verbose.unwrap_or(d.verbose),
            no_stl: self.no_stl.unwrap_or(d.no_stl),
            silent: self.silent.unwrap_or(d.silent),
        }
    }
}

/// Parse a loose boolean string (`true/1/yes/on/y/enabled` and their
/// negatives), case-insensitively.
pub fn parse_string_bool(name: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "y" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "n" | "disabled" => Ok(false),
        other => Err(AppError::configuration(format!(
            "{name} must be a boolean string, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_no_env_leaves_everything_unset() {
        let opts = PartialScadOptions::from_env(lookup(&[])).expect("parse");
        assert_eq!(opts, PartialScadOptions::default());
    }

    #[test]
    fn test_env_sets_launch_path() {
        let opts = PartialScadOptions::from_env(lookup(&[(env::LAUNCH_PATH, "openscad-nightly")]))
            .expect("parse");
        assert_eq!(opts.launch_path.as_deref(), Some("openscad-nightly"));
    }

    #[test]
    fn test_env_string_options() {
        let opts = PartialScadOptions::from_env(lookup(&[
            (env::THEME, "dark"),
            (env::LAYOUT, "my-layout.njk"),
        ]))
        .expect("parse");
        assert_eq!(opts.theme.as_deref(), Some("dark"));
        assert_eq!(opts.layout.as_deref(), Some("my-layout.njk"));
    }

    #[test]
    fn test_env_boolean_options() {
        let opts = PartialScadOptions::from_env(lookup(&[
            (env::NO_STL, "true"),
            (env::SILENT, "1"),
            (env::VERBOSE, "YES"),
            (env::RESOLVE_LAUNCH_PATH, "0"),
        ]))
        .expect("parse");
        assert_eq!(opts.no_stl, Some(true));
        assert_eq!(opts.silent, Some(true));
        assert_eq!(opts.verbose, Some(true));
        assert_eq!(opts.resolve_launch_path, Some(false));
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let opts =
            PartialScadOptions::from_env(lookup(&[(env::LAUNCH_PATH, "")])).expect("parse");
        assert!(opts.launch_path.is_none());
    }

    #[test]
    fn test_invalid_boolean_is_configuration_error() {
        let err = PartialScadOptions::from_env(lookup(&[(env::SILENT, "maybe")]))
            .expect_err("should fail");
        assert!(err.is_fatal());
        assert!(err.message.contains("SCAD_SILENT"));
    }

    #[test]
    fn test_explicit_options_override_env() {
        let from_env = PartialScadOptions {
            launch_path: Some("openscad".to_string()),
            verbose: Some(false),
            ..Default::default()
        };
        let explicit = PartialScadOptions {
            launch_path: Some("docker:trixie".to_string()),
            ..Default::default()
        };
        let resolved = from_env.merge(explicit).resolve();
        assert_eq!(resolved.launch_path, "docker:trixie");
        assert!(!resolved.verbose);
    }

    #[test]
    fn test_defaults() {
        let opts = PartialScadOptions::default().resolve();
        assert_eq!(opts.launch_path, "docker:dev");
        assert_eq!(opts.theme, DEFAULT_THEME);
        assert!(opts.resolve_launch_path);
        assert!(opts.verbose);
        assert!(!opts.no_stl);
        assert!(!opts.silent);
    }

    #[test]
    fn test_unknown_config_keys_are_ignored() {
        let opts: PartialScadOptions = serde_json::from_str(
            r#"{"launch_path": "openscad", "collection_page": false, "thumbnail_color_scheme": "Monotone"}"#,
        )
        .expect("deserialize");
        assert_eq!(opts.launch_path.as_deref(), Some("openscad"));
        assert_eq!(
            opts,
            PartialScadOptions {
                launch_path: Some("openscad".to_string()),
                ..Default::default()
            }
        );
    }
}
