//! Filesystem path confinement.
//!
//! Confines agent file access to declared allowed roots and keeps it out of
//! protected directories. The audit log directory is always protected, so
//! no agent can read or rewrite its own audit trail.

use std::path::{Component, Path, PathBuf};

use super::errors::PathAccessError;

/// Confines agent file operations to declared allowed roots.
///
/// Every filesystem tool resolves its target through [`check`](Self::check)
/// before touching the disk. Resolution expands symlinks on the existing
/// part of the path and normalizes `.` / `..` lexically on any trailing
/// not-yet-created part, so a traversal cannot escape through either route.
#[derive(Debug, Clone)]
pub struct PathEnforcer {
    allowed_roots: Vec<PathBuf>,
    protected_dirs: Vec<PathBuf>,
}

impl PathEnforcer {
    /// Build an enforcer from allowed roots and protected directories.
    ///
    /// Each allowed root must exist and be a directory; roots are resolved
    /// to absolute canonical paths up front.
    pub fn new(
        allowed_roots: Vec<PathBuf>,
        protected_dirs: Vec<PathBuf>,
    ) -> Result<Self, PathAccessError> {
        if allowed_roots.is_empty() {
            return Err(PathAccessError::NoRoots);
        }

        let mut roots = Vec::with_capacity(allowed_roots.len());
        for root in allowed_roots {
            let resolved =
                std::fs::canonicalize(&root).map_err(|e| PathAccessError::InvalidRoot {
                    path: root.clone(),
                    detail: e.to_string(),
                })?;
            if !resolved.is_dir() {
                return Err(PathAccessError::InvalidRoot {
                    path: root,
                    detail: "not a directory".to_string(),
                });
            }
            roots.push(resolved);
        }

        let protected = protected_dirs
            .into_iter()
            .map(|dir| resolve(&dir).unwrap_or(dir))
            .collect();

        Ok(Self {
            allowed_roots: roots,
            protected_dirs: protected,
        })
    }

    /// Build from agent config. An empty `allowed_paths` list falls back to
    /// the current working directory, logged as a least-privilege warning.
    pub fn from_config(
        allowed_paths: &[String],
        protected_dirs: Vec<PathBuf>,
    ) -> Result<Self, PathAccessError> {
        let roots: Vec<PathBuf> = if allowed_paths.is_empty() {
            let cwd = std::env::current_dir().map_err(|e| PathAccessError::InvalidRoot {
                path: PathBuf::from("."),
                detail: e.to_string(),
            })?;
            tracing::warn!(
                cwd = %cwd.display(),
                "no allowed_paths configured; defaulting to current directory"
            );
            vec![cwd]
        } else {
            allowed_paths.iter().map(PathBuf::from).collect()
        };
        Self::new(roots, protected_dirs)
    }

    /// Validate that `path` resolves inside an allowed root and outside
    /// every protected directory. Returns the resolved path if allowed.
    pub fn check(
        &self,
        path: impl AsRef<Path>,
        operation: &str,
    ) -> Result<PathBuf, PathAccessError> {
        let path = path.as_ref();
        if path.as_os_str().to_string_lossy().contains('\0') {
            return Err(PathAccessError::Unresolvable {
                operation: operation.to_string(),
                detail: "path contains null bytes".to_string(),
            });
        }

        let resolved = resolve(path).map_err(|detail| PathAccessError::Unresolvable {
            operation: operation.to_string(),
            detail,
        })?;

        // Protected directories win over allowed roots.
        for protected in &self.protected_dirs {
            if resolved == *protected || resolved.starts_with(protected) {
                return Err(PathAccessError::ProtectedDir {
                    operation: operation.to_string(),
                    path: resolved,
                    protected: protected.clone(),
                });
            }
        }

        for root in &self.allowed_roots {
            if resolved.starts_with(root) {
                return Ok(resolved);
            }
        }

        let roots = self
            .allowed_roots
            .iter()
            .map(|root| format!("'{}'", root.display()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(PathAccessError::OutsideRoots {
            operation: operation.to_string(),
            path: resolved,
            roots,
        })
    }

    pub fn allowed_roots(&self) -> &[PathBuf] {
        &self.allowed_roots
    }

    /// First allowed root; used as the working directory for subprocesses.
    pub fn first_root(&self) -> &Path {
        &self.allowed_roots[0]
    }
}

/// Resolve a path to an absolute form with symlink expansion.
///
/// `std::fs::canonicalize` fails on paths that do not exist yet (a write
/// target, for example), so the longest existing ancestor is canonicalized
/// and the remaining components are appended after lexical normalization.
fn resolve(path: &Path) -> Result<PathBuf, String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| e.to_string())?
            .join(path)
    };

    let normalized = normalize(&absolute);

    // Longest existing prefix gets true symlink resolution.
    let mut existing = normalized.clone();
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            break;
        }
        match existing.file_name() {
            Some(name) => {
                tail.push(name.to_os_string());
                existing = existing
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("/"));
            }
            None => break,
        }
    }

    let mut resolved = std::fs::canonicalize(&existing).map_err(|e| e.to_string())?;
    for component in tail.into_iter().rev() {
        resolved.push(component);
    }
    Ok(resolved)
}

/// Lexically normalize `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
