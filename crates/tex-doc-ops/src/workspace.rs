//! Workspace root handling and path confinement.
//!
//! Every caller-supplied path is relative to a single workspace root. The
//! guard normalises traversal segments lexically, joins to the root, then
//! canonicalises through the deepest existing ancestor so that paths for
//! files which do not exist yet still validate. The final check is a
//! component-boundary prefix match against the canonical root, which keeps
//! sibling directories like `workspace-evil` outside even though their raw
//! string form shares a prefix.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::Builder;

use crate::OperationError;

/// Holder for the confined workspace root.
///
/// The root is set once at construction and replaced only through
/// [`Workspace::set_root`], which validates the candidate before swapping.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace rooted at `root`, creating the directory when absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, OperationError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    /// Canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace the workspace root. The candidate must exist, be a directory
    /// and be writable; on any failure the previous root stays in place.
    pub fn set_root(&mut self, candidate: impl AsRef<Path>) -> Result<(), OperationError> {
        let candidate = candidate.as_ref();
        if !candidate.exists() {
            return Err(OperationError::NotFound {
                path: candidate.to_path_buf(),
            });
        }
        let canonical = fs::canonicalize(candidate)?;
        if !canonical.is_dir() {
            return Err(OperationError::NotADirectory { path: canonical });
        }
        // Writability probe: the tempfile is removed on drop.
        Builder::new().prefix(".tex-doc-probe").tempfile_in(&canonical)?;

        tracing::info!(old = %self.root.display(), new = %canonical.display(), "workspace root changed");
        self.root = canonical;
        Ok(())
    }

    /// Resolve a caller-supplied relative path against the workspace root.
    ///
    /// Fails with [`OperationError::PathEscape`] when the input is absolute
    /// and outside the root, climbs out via `..`, or reaches outside through
    /// a symlink. The returned path is absolute and confined; it need not
    /// exist.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, OperationError> {
        let relative = relative.as_ref();

        let joined = if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        };
        let normalized = normalize(&joined);

        if !is_within(&normalized, &self.root) {
            return Err(OperationError::PathEscape {
                path: relative.to_path_buf(),
            });
        }

        // Re-check after resolving symlinks along the existing portion.
        let real = canonicalize_existing_prefix(&normalized)?;
        if !is_within(&real, &self.root) {
            return Err(OperationError::PathEscape {
                path: relative.to_path_buf(),
            });
        }

        Ok(real)
    }

    /// Resolve a path and require that it exists.
    pub fn resolve_existing(&self, relative: impl AsRef<Path>) -> Result<PathBuf, OperationError> {
        let relative = relative.as_ref();
        let resolved = self.resolve(relative)?;
        if !resolved.exists() {
            return Err(OperationError::NotFound {
                path: relative.to_path_buf(),
            });
        }
        Ok(resolved)
    }
}

/// Collapse `.` and `..` segments without touching the filesystem. A `..`
/// that would climb above the root component is preserved by `pop` becoming
/// a no-op, which the containment check then rejects via the canonical pass.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if depth == 0 {
                    // Climbing above the filesystem root: keep the segment so
                    // the containment check sees the escape.
                    normalized.push("..");
                } else {
                    normalized.pop();
                    depth -= 1;
                }
            }
            Component::CurDir => {}
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Canonicalise the deepest existing ancestor of `path`, then re-append the
/// non-existing tail. Resolves symlinks on the existing portion only.
fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, OperationError> {
    let mut existing = path;
    let mut tail = Vec::new();
    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(path.to_path_buf()),
        }
    }

    let mut real = fs::canonicalize(existing)?;
    for part in tail.iter().rev() {
        real.push(part);
    }
    Ok(real)
}

/// Component-boundary descendant check.
fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let temp = TempDir::new().expect("tempdir");
        let ws = Workspace::open(temp.path()).expect("open workspace");
        (temp, ws)
    }

    #[test]
    fn resolves_simple_relative_path() {
        let (_temp, ws) = workspace();
        let resolved = ws.resolve("paper/main.tex").expect("resolve");
        assert!(resolved.starts_with(ws.root()));
        assert!(resolved.ends_with("paper/main.tex"));
    }

    #[test]
    fn collapses_internal_traversal() {
        let (_temp, ws) = workspace();
        let resolved = ws.resolve("paper/../notes/./draft.tex").expect("resolve");
        assert_eq!(resolved, ws.root().join("notes/draft.tex"));
    }

    #[test]
    fn rejects_parent_escape() {
        let (_temp, ws) = workspace();
        let err = ws.resolve("../../etc/passwd").expect_err("must escape");
        assert!(matches!(err, OperationError::PathEscape { .. }));
    }

    #[test]
    fn rejects_absolute_path_outside_root() {
        let (_temp, ws) = workspace();
        let err = ws.resolve("/etc/passwd").expect_err("must escape");
        assert!(matches!(err, OperationError::PathEscape { .. }));
    }

    #[test]
    fn accepts_absolute_path_inside_root() {
        let (_temp, ws) = workspace();
        let inside = ws.root().join("main.tex");
        let resolved = ws.resolve(&inside).expect("resolve");
        assert_eq!(resolved, inside);
    }

    #[test]
    fn sibling_directory_with_shared_prefix_is_outside() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path().join("project");
        let evil = temp.path().join("project-evil");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&evil).unwrap();

        let ws = Workspace::open(&root).expect("open workspace");
        let err = ws.resolve("../project-evil/file.tex").expect_err("escape");
        assert!(matches!(err, OperationError::PathEscape { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let temp = TempDir::new().expect("tempdir");
        let root = temp.path().join("project");
        let outside = temp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let ws = Workspace::open(&root).expect("open workspace");
        let err = ws.resolve("link/secret.tex").expect_err("symlink escape");
        assert!(matches!(err, OperationError::PathEscape { .. }));
    }

    #[test]
    fn set_root_rejects_missing_directory_and_keeps_previous() {
        let (_temp, mut ws) = workspace();
        let before = ws.root().to_path_buf();
        let err = ws
            .set_root(before.join("does-not-exist"))
            .expect_err("missing dir");
        assert!(matches!(err, OperationError::NotFound { .. }));
        assert_eq!(ws.root(), before);
    }

    #[test]
    fn set_root_rejects_file_target() {
        let (_temp, mut ws) = workspace();
        let file = ws.root().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let err = ws.set_root(&file).expect_err("not a directory");
        assert!(matches!(err, OperationError::NotADirectory { .. }));
    }

    #[test]
    fn set_root_swaps_on_success() {
        let (_temp, mut ws) = workspace();
        let next = ws.root().join("nested");
        fs::create_dir_all(&next).unwrap();
        ws.set_root(&next).expect("swap root");
        assert_eq!(ws.root(), next);
    }
}
