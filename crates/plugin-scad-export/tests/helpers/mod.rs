//! Shared helpers for build pass integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plugin_scad_export::ScadExportPlugin;
use scad_core::ScadOptions;
use scad_plugin::{ExtensionDispatcher, ExtensionRegistry, PageContext, RenderResult};

/// Stand-in compiler: fails on sources containing `syntax error`, otherwise
/// writes a small mesh to `$6` (the `--o` value).
const FAKE_OPENSCAD: &str = r#"#!/bin/sh
out="$6"
in="$7"
if grep -q "syntax error" "$in"; then
    echo "ERROR: Parser error in file $in, line 1" >&2
    exit 1
fi
echo "Geometries in cache: 1" >&2
printf 'solid model\nendsolid model\n' > "$out"
"#;

/// A throwaway site with a fake compiler and a registered plugin.
pub struct TestSite {
    /// Project root.
    pub dir: tempfile::TempDir,
    /// The plugin under test.
    pub plugin: Arc<ScadExportPlugin>,
    /// Dispatcher the host would use.
    pub dispatcher: ExtensionDispatcher,
}

impl TestSite {
    /// Create a site with a fake compiler on disk.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin/openscad");
        std::fs::create_dir_all(bin.parent().expect("bin dir")).expect("mkdir bin");
        std::fs::write(&bin, FAKE_OPENSCAD).expect("write fake compiler");
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let options = ScadOptions {
            launch_path: bin.to_string_lossy().into_owned(),
            verbose: true,
            ..ScadOptions::default()
        };
        let plugin = Arc::new(ScadExportPlugin::new(options).expect("plugin"));

        let registry = Arc::new(ExtensionRegistry::new());
        plugin.register(&registry).await;

        Self {
            dir,
            plugin,
            dispatcher: ExtensionDispatcher::new(registry),
        }
    }

    /// Write a model below the project root.
    pub fn write_model(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir model dir");
        }
        std::fs::write(path, content).expect("write model");
    }

    /// Page context for a model, with the permalink `/<stem>/`.
    pub fn page(&self, rel: &str) -> PageContext {
        let stem = rel.trim_end_matches(".scad");
        PageContext::new(rel, self.dir.path(), "_site").with_url(format!("/{stem}/"))
    }

    /// Render one model page.
    pub async fn render(&self, rel: &str) -> RenderResult {
        let content =
            std::fs::read_to_string(self.dir.path().join(rel)).expect("read model");
        self.dispatcher
            .render(content, &self.page(rel))
            .await
            .expect("render")
    }

    /// Path of the mesh produced for a model.
    pub fn mesh(&self, rel: &str) -> PathBuf {
        let stem = rel.trim_end_matches(".scad");
        let name = Path::new(rel)
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .replace(".scad", ".stl");
        self.dir.path().join("_site").join(stem).join(name)
    }
}
