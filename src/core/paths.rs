//! core::paths
//!
//! Repository-relative path routing.
//!
//! User-supplied paths arrive relative to an arbitrary working directory and
//! must be resolved to meta-repository-root-relative form before the engine
//! can classify them as meta-level paths or paths inside an open submodule.
//! All of that resolution lives here; no engine code joins paths by hand.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::core::types::SubmoduleName;

/// Errors from path resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path points outside the repository working directory.
    #[error("path '{0}' is outside the repository")]
    OutsideRepository(String),

    /// The path contains components that cannot be normalized.
    #[error("path '{0}' cannot be resolved")]
    Unresolvable(String),
}

/// Resolve a user-supplied path to repository-root-relative form.
///
/// `cwd` must itself be inside `workdir`. Relative paths are interpreted
/// against `cwd`; absolute paths are taken as-is. `.` and `..` components
/// are resolved lexically, and a result escaping `workdir` is an error.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use gitweave::core::paths::repo_relative;
///
/// let rel = repo_relative(
///     Path::new("/repo"),
///     Path::new("/repo/libs"),
///     Path::new("../src/main.rs"),
/// )
/// .unwrap();
/// assert_eq!(rel, Path::new("src/main.rs"));
/// ```
pub fn repo_relative(workdir: &Path, cwd: &Path, path: &Path) -> Result<PathBuf, PathError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let normalized = normalize(&absolute)
        .ok_or_else(|| PathError::Unresolvable(path.display().to_string()))?;
    let workdir = normalize(workdir)
        .ok_or_else(|| PathError::Unresolvable(workdir.display().to_string()))?;

    normalized
        .strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .map_err(|_| PathError::OutsideRepository(path.display().to_string()))
}

/// Lexically resolve `.` and `..` components.
///
/// Returns `None` when `..` would climb past the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Where a repository-root-relative path lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// The path belongs to the top-level meta tree.
    Meta(PathBuf),

    /// The path is the mount point of an open submodule, or inside one.
    /// `rest` is relative to the submodule root and empty for the mount
    /// point itself.
    Submodule {
        name: SubmoduleName,
        rest: PathBuf,
    },
}

/// Classify a root-relative path against the open submodule roots.
///
/// Longest-prefix match wins, so `libs/parser/src/lib.rs` resolves into a
/// `libs/parser` submodule even when `libs` is also a submodule name.
pub fn classify<'a>(
    rel: &Path,
    open_submodules: impl IntoIterator<Item = &'a SubmoduleName>,
) -> PathTarget {
    let mut best: Option<&SubmoduleName> = None;
    for name in open_submodules {
        let root = name.as_rel_path();
        if rel.starts_with(root) && best.map_or(true, |b| root.as_os_str().len() > b.as_str().len()) {
            best = Some(name);
        }
    }

    match best {
        Some(name) => {
            let rest = rel
                .strip_prefix(name.as_rel_path())
                .unwrap_or_else(|_| Path::new(""))
                .to_path_buf();
            PathTarget::Submodule {
                name: name.clone(),
                rest,
            }
        }
        None => PathTarget::Meta(rel.to_path_buf()),
    }
}
