//! Source and artifact naming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Source template extension.
pub const SCAD_EXT: &str = "scad";

/// Source file suffix.
pub const DOT_SCAD: &str = ".scad";

/// Mesh extension.
pub const STL_EXT: &str = "stl";

/// Mesh file suffix.
pub const DOT_STL: &str = ".stl";

/// Tag attached to every model page.
pub const SCAD_TAG: &str = SCAD_EXT;

/// Whether `path` has the `.scad` extension.
pub fn is_scad_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCAD_EXT)
}

/// File name without its `.scad` suffix: `cube.scad` -> `cube`.
pub fn slug(file_name: &str) -> String {
    file_name.replace(DOT_SCAD, "")
}

/// Mesh file name for a source file name: `cube.scad` -> `cube.stl`.
pub fn stl_file_name(file_name: &str) -> String {
    file_name.replace(DOT_SCAD, DOT_STL)
}

/// Where the mesh for a page is written, relative to the project root.
///
/// `output_stem` is the output directory relative to the project root and
/// `url` the page permalink; its leading `/` is dropped so the result stays
/// relative.
pub fn artifact_path(output_stem: &Path, url: &str, stl_file: &str) -> PathBuf {
    output_stem
        .join(url.trim_start_matches('/'))
        .join(stl_file)
}

/// Data a model page exposes to its layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData {
    /// Page title, the source file name.
    pub title: String,
    /// Source file name without extension.
    pub slug: String,
    /// Source path as given by the host.
    pub scad_file: PathBuf,
    /// Mesh file name.
    pub stl_file: String,
    /// Layout to render with.
    pub layout: String,
    /// Viewer theme.
    pub theme: String,
    /// Collection tags.
    pub tags: Vec<String>,
}

impl TemplateData {
    /// Page data for `input_path`.
    pub fn for_source(input_path: &Path, layout: &str, theme: &str) -> Self {
        let file_name = input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            slug: slug(&file_name),
            stl_file: stl_file_name(&file_name),
            title: file_name,
            scad_file: input_path.to_path_buf(),
            layout: layout.to_string(),
            theme: theme.to_string(),
            tags: vec![SCAD_TAG.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming() {
        assert_eq!(slug("cube.scad"), "cube");
        assert_eq!(stl_file_name("cube.scad"), "cube.stl");
        assert!(is_scad_file(Path::new("models/cube.scad")));
        assert!(!is_scad_file(Path::new("models/cube.stl")));
        assert!(!is_scad_file(Path::new("scad")));
    }

    #[test]
    fn test_artifact_path_strips_leading_slash() {
        assert_eq!(
            artifact_path(Path::new("_site"), "/models/cube/", "cube.stl"),
            PathBuf::from("_site/models/cube/cube.stl")
        );
    }

    #[test]
    fn test_artifact_path_with_empty_output_stem() {
        assert_eq!(
            artifact_path(Path::new(""), "/cube/", "cube.stl"),
            PathBuf::from("cube/cube.stl")
        );
    }

    #[test]
    fn test_template_data() {
        let data = TemplateData::for_source(
            Path::new("./models/gear.scad"),
            "scad.viewer.njk",
            "Traditional",
        );
        assert_eq!(data.title, "gear.scad");
        assert_eq!(data.slug, "gear");
        assert_eq!(data.stl_file, "gear.stl");
        assert_eq!(data.tags, ["scad"]);

        let json = serde_json::to_value(&data).expect("serialize");
        assert_eq!(json["stlFile"], "gear.stl");
    }
}
