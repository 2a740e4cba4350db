//! Page data handed to template extensions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What the host knows about one page during a build pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Source file of the page, relative to `project_root` or absolute.
    pub input_path: PathBuf,
    /// Permalink of the page (e.g. `/models/cube/`). `None` when the page
    /// is not written to the output directory.
    pub url: Option<String>,
    /// Root of the project; the working directory for external tools.
    pub project_root: PathBuf,
    /// Output directory of the built site, relative to `project_root` or
    /// absolute.
    pub output_dir: PathBuf,
}

impl PageContext {
    /// Creates a page context without a permalink.
    pub fn new(
        input_path: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            url: None,
            project_root: project_root.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Sets the permalink.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Extension of the source file without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        self.input_path.extension().and_then(|e| e.to_str())
    }

    /// File name of the source file.
    pub fn file_name(&self) -> Option<&str> {
        self.input_path.file_name().and_then(|n| n.to_str())
    }

    /// Source path resolved against the project root.
    pub fn absolute_input(&self) -> PathBuf {
        resolve(&self.project_root, &self.input_path)
    }

    /// Output directory resolved against the project root.
    pub fn absolute_output_dir(&self) -> PathBuf {
        resolve(&self.project_root, &self.output_dir)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
