//! Built-in tools: `bash`, `str_replace_based_edit_tool`,
//! `memory`. Path handling follows the common workspace-scoped filesystem
//! tool pattern — normalize, reject absolute paths, canonicalize and verify
//! containment before touching disk.

pub mod bash;
pub mod edit;
pub mod memory;

use std::path::{Component, Path, PathBuf};

/// Resolves `requested` against `workspace_root`, redirecting a leading
/// `/shared/` (or `shared/`) prefix to `shared_workspace` instead
/// ("the designated shared workspace when prefixed
/// `/shared/`"). Returns an error if the resolved path would escape its
/// target root.
pub fn resolve_in_workspace(
    requested: &str,
    workspace_root: &Path,
    shared_workspace: &Path,
) -> Result<PathBuf, String> {
    let trimmed = requested.trim_start_matches('/');
    let (root, rest) = match trimmed.strip_prefix("shared/") {
        Some(rest) => (shared_workspace, rest),
        None if trimmed == "shared" => (shared_workspace, ""),
        None => (workspace_root, trimmed),
    };

    let mut normalized = PathBuf::new();
    for component in Path::new(rest).components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(format!("path escapes workspace: {requested}"));
                }
            }
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let candidate = root.join(&normalized);
    let root_canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let check = if candidate.exists() {
        candidate.canonicalize().map_err(|e| format!("cannot resolve path: {e}"))?
    } else {
        candidate.clone()
    };
    if candidate.exists() && !check.starts_with(&root_canonical) {
        return Err(format!("path escapes workspace: {requested}"));
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rejects_parent_dir_escape() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let err = resolve_in_workspace("../../etc/passwd", dir.path(), shared.path()).unwrap_err();
        assert!(err.contains("escapes workspace"));
    }

    #[test]
    fn redirects_shared_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        let resolved = resolve_in_workspace("/shared/notes.md", dir.path(), shared.path()).unwrap();
        assert!(resolved.starts_with(shared.path()));
    }

    #[test]
    fn plain_path_stays_in_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("file.txt"), "hi").unwrap();
        let resolved = resolve_in_workspace("file.txt", dir.path(), shared.path()).unwrap();
        assert!(resolved.starts_with(dir.path()));
    }
}
