//! OpenSCAD command-line arguments.

use serde::{Deserialize, Serialize};

/// Default export format: binary STL.
pub const DEFAULT_EXPORT_FORMAT: &str = "binstl";

/// Geometry kernel selected with `--backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// The classic CGAL kernel.
    #[serde(rename = "CGAL")]
    Cgal,
    /// The newer, much faster Manifold kernel.
    Manifold,
}

impl Backend {
    /// Value passed on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cgal => "CGAL",
            Self::Manifold => "Manifold",
        }
    }
}

/// Options that shape the export command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArgs {
    /// `--export-format` value; omitted when `None`.
    pub export_format: Option<String>,
    /// `--backend` value; omitted when `None`.
    pub backend: Option<Backend>,
}

impl Default for ExportArgs {
    fn default() -> Self {
        Self {
            export_format: Some(DEFAULT_EXPORT_FORMAT.to_string()),
            backend: Some(Backend::Manifold),
        }
    }
}

impl ExportArgs {
    /// Only `--o <output> <input>`, leaving format and backend to OpenSCAD.
    pub fn bare() -> Self {
        Self {
            export_format: None,
            backend: None,
        }
    }

    /// Build the argument list. Output and input always come last, in that
    /// order.
    pub fn build(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(7);

        if let Some(ref format) = self.export_format {
            args.push("--export-format".to_string());
            args.push(format.clone());
        }
        if let Some(backend) = self.backend {
            args.push("--backend".to_string());
            args.push(backend.as_str().to_string());
        }

        args.push("--o".to_string());
        args.push(output.to_string());
        args.push(input.to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = ExportArgs::default().build("a.scad", "b.stl");
        assert_eq!(
            args,
            vec![
                "--export-format",
                "binstl",
                "--backend",
                "Manifold",
                "--o",
                "b.stl",
                "a.scad"
            ]
        );
    }

    #[test]
    fn test_output_and_input_trail_backend_flag() {
        let args = ExportArgs::default().build("a.scad", "b.stl");
        let backend = args.iter().position(|a| a == "--backend").expect("backend flag");
        let tail = &args[args.len() - 3..];
        assert_eq!(tail, ["--o", "b.stl", "a.scad"]);
        assert!(backend < args.len() - 3);
    }

    #[test]
    fn test_bare_args() {
        assert_eq!(
            ExportArgs::bare().build("./in.scad", "./out.stl"),
            vec!["--o", "./out.stl", "./in.scad"]
        );
    }

    #[test]
    fn test_cgal_backend() {
        let args = ExportArgs {
            export_format: None,
            backend: Some(Backend::Cgal),
        }
        .build("a.scad", "b.stl");
        assert_eq!(args[..2], ["--backend", "CGAL"]);
    }
}
