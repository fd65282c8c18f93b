//! Workspace-scoped file operations.
//!
//! Every entry point resolves its path arguments through the workspace guard
//! before touching the filesystem. Writes go through a tempfile-and-rename
//! in the target directory so readers never observe partial content.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::Builder;
use walkdir::WalkDir;

use crate::workspace::Workspace;
use crate::OperationError;

/// Source extensions the toolchain treats as editable inputs.
pub const SOURCE_EXTENSIONS: [&str; 5] = ["tex", "bib", "cls", "sty", "bst"];

/// Final outputs produced by an engine run.
pub const OUTPUT_EXTENSIONS: [&str; 3] = ["pdf", "dvi", "ps"];

/// Category assigned to a listed entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    Source,
    Output,
    Auxiliary,
    Other,
}

/// One directory listing entry, ordered by relative path.
#[derive(Clone, Debug, Serialize)]
pub struct DirEntry {
    /// Path relative to the listed directory.
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
}

/// Flags accepted by [`write_document`].
#[derive(Clone, Copy, Debug)]
pub struct WriteOptions {
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// Create a new file with the given content. Fails with `AlreadyExists`
/// unless `overwrite` is set; parent directories are created as needed.
pub fn create_document(
    workspace: &Workspace,
    path: &Path,
    content: &str,
    overwrite: bool,
) -> Result<PathBuf, OperationError> {
    let resolved = workspace.resolve(path)?;
    if resolved.exists() && !overwrite {
        return Err(OperationError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    write_atomic(&resolved, content)?;
    tracing::debug!(path = %resolved.display(), "created document");
    Ok(resolved)
}

/// Read a document's content. Fails with `NotFound` when absent.
pub fn read_document(workspace: &Workspace, path: &Path) -> Result<String, OperationError> {
    let resolved = workspace.resolve_existing(path)?;
    Ok(fs::read_to_string(resolved)?)
}

/// Write (by default overwrite) a document's content atomically.
pub fn write_document(
    workspace: &Workspace,
    path: &Path,
    content: &str,
    options: WriteOptions,
) -> Result<PathBuf, OperationError> {
    create_document(workspace, path, content, options.overwrite)
}

/// List a directory's contents ordered by name. Non-recursive unless asked.
pub fn list_directory(
    workspace: &Workspace,
    path: &Path,
    recursive: bool,
) -> Result<Vec<DirEntry>, OperationError> {
    let resolved = workspace.resolve_existing(path)?;
    if !resolved.is_dir() {
        return Err(OperationError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    if recursive {
        for entry in WalkDir::new(&resolved).min_depth(1) {
            let entry = entry.map_err(|err| {
                OperationError::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
                }))
            })?;
            entries.push(describe(entry.path(), &resolved)?);
        }
    } else {
        for entry in fs::read_dir(&resolved)? {
            let entry = entry?;
            entries.push(describe(&entry.path(), &resolved)?);
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Move or rename a file. Fails when the destination is occupied and
/// `overwrite` is not set.
pub fn move_document(
    workspace: &Workspace,
    source: &Path,
    destination: &Path,
    overwrite: bool,
) -> Result<PathBuf, OperationError> {
    let from = workspace.resolve_existing(source)?;
    let to = workspace.resolve(destination)?;
    if to.exists() && !overwrite {
        return Err(OperationError::AlreadyExists {
            path: destination.to_path_buf(),
        });
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&from, &to)?;
    tracing::debug!(from = %from.display(), to = %to.display(), "moved document");
    Ok(to)
}

/// Delete a file. With `missing_ok`, a missing target is not an error.
pub fn delete_document(
    workspace: &Workspace,
    path: &Path,
    missing_ok: bool,
) -> Result<bool, OperationError> {
    let resolved = workspace.resolve(path)?;
    if !resolved.exists() {
        if missing_ok {
            return Ok(false);
        }
        return Err(OperationError::NotFound {
            path: path.to_path_buf(),
        });
    }
    fs::remove_file(&resolved)?;
    tracing::debug!(path = %resolved.display(), "deleted document");
    Ok(true)
}

fn describe(path: &Path, base: &Path) -> Result<DirEntry, OperationError> {
    let metadata = fs::symlink_metadata(path)?;
    let relative = path.strip_prefix(base).unwrap_or(path).to_path_buf();
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else {
        classify(path)
    };
    Ok(DirEntry {
        path: relative,
        kind,
        size: if metadata.is_dir() { 0 } else { metadata.len() },
    })
}

fn classify(path: &Path) -> EntryKind {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_ascii_lowercase(),
        None => return EntryKind::Other,
    };
    if crate::clean::AUXILIARY_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{ext}")))
    {
        return EntryKind::Auxiliary;
    }
    let extension = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => return EntryKind::Other,
    };
    if SOURCE_EXTENSIONS.contains(&extension.as_str()) {
        EntryKind::Source
    } else if OUTPUT_EXTENSIONS.contains(&extension.as_str()) {
        EntryKind::Output
    } else {
        EntryKind::Other
    }
}

/// Write via a sibling tempfile followed by an atomic rename.
fn write_atomic(path: &Path, contents: &str) -> Result<(), OperationError> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let mut tmp = Builder::new().prefix(".tex-doc").tempfile_in(&parent)?;
    tmp.as_file_mut().write_all(contents.as_bytes())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path)
        .map(|_| ())
        .map_err(|err| OperationError::Io(err.error))
}
