//! Path helpers for building compiler command lines.

use std::path::{Component, Path, PathBuf};

use crate::error::ExportError;

/// Resolve `path` against `cwd` unless it is already absolute.
pub fn resolve_in(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Returns `file` relative to `cwd`, prefixed with `./`.
///
/// `file` may be absolute or relative to `cwd`. The `./` prefix keeps
/// file names that start with `-` from being read as flags. When no
/// relative path exists (different Windows drives) the absolute path is
/// returned without a prefix.
pub fn relative_to(cwd: &Path, file: &Path) -> String {
    let base = normalize(&absolute(cwd));
    let target = normalize(&absolute(&resolve_in(cwd, file)));

    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();

    if base_parts.first() != target_parts.first() {
        return target.to_string_lossy().into_owned();
    }

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }

    format!("./{}", relative.to_string_lossy())
}

/// Create every missing parent directory of `file`.
pub async fn ensure_parent_dir(file: &Path) -> Result<(), ExportError> {
    let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| ExportError::OutputDir {
            path: parent.to_path_buf(),
            source,
        })
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Lexically drop `.` and fold `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
