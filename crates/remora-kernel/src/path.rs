//! Client path resolution.
//!
//! Without a root, client paths are used exactly as given. With a root, every
//! path is interpreted relative to it and may not leave it, either through
//! `..` or through a symlink.

use std::path::{Component, Path, PathBuf};

use tokio::fs;

use crate::error::{FsError, FsResult};

#[derive(Debug, Clone)]
pub enum PathResolver {
    /// Paths go to the local filesystem unchanged.
    Passthrough,
    /// Paths are confined beneath `root`.
    Rooted { root: PathBuf },
}

impl PathResolver {
    /// Build a resolver for an optional root.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: Option<&Path>) -> Self {
        match root {
            None => PathResolver::Passthrough,
            Some(root) => PathResolver::Rooted {
                root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            },
        }
    }

    pub fn root(&self) -> Option<&Path> {
        match self {
            PathResolver::Passthrough => None,
            PathResolver::Rooted { root } => Some(root),
        }
    }

    /// Map a client path to a local path that will be opened through any
    /// symlinks it contains.
    pub async fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        self.resolve_with(path, true).await
    }

    /// Map a client path that names a directory entry itself (unlink,
    /// lstat). A final symlink is not followed, so only its parent must stay
    /// beneath the root.
    pub async fn resolve_entry(&self, path: &str) -> FsResult<PathBuf> {
        self.resolve_with(path, false).await
    }

    async fn resolve_with(&self, path: &str, follow_final: bool) -> FsResult<PathBuf> {
        let root = match self {
            PathResolver::Passthrough => return Ok(PathBuf::from(path)),
            PathResolver::Rooted { root } => root,
        };
        let escapes = || FsError::permission_denied(format!("{path} escapes {}", root.display()));

        let rel = fold_components(path).ok_or_else(escapes)?;
        if rel.as_os_str().is_empty() {
            return Ok(root.clone());
        }

        let full = root.join(rel);
        let checked = if follow_final {
            full.as_path()
        } else {
            full.parent().unwrap_or(root)
        };
        if !stays_within(root, checked).await {
            return Err(escapes());
        }
        Ok(full)
    }
}

/// Lexically normalise `path` into a relative path. `..` is folded against
/// the components seen so far; `None` if it would climb above the start.
fn fold_components(path: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::Normal(name) => rel.push(name),
            Component::ParentDir => {
                if !rel.pop() {
                    return None;
                }
            }
        }
    }
    Some(rel)
}

/// Whether `path`, with symlinks resolved, lies beneath `root`.
///
/// Components that do not exist yet cannot be links, so the deepest existing
/// ancestor decides. An entry that exists but cannot be resolved (a dangling
/// link) is refused.
async fn stays_within(root: &Path, path: &Path) -> bool {
    let mut ancestor = path;
    loop {
        if let Ok(real) = fs::canonicalize(ancestor).await {
            return real.starts_with(root);
        }
        if fs::symlink_metadata(ancestor).await.is_ok() {
            return false;
        }
        match ancestor.parent() {
            Some(parent) => ancestor = parent,
            None => return false,
        }
    }
}
