//! Removal of compiler-generated auxiliary files.
//!
//! Cleaning is allow-list driven: only files sharing the document's base
//! name with a known auxiliary extension are touched. The source document,
//! final outputs and anything unrecognised stay in place.

use std::fs;
use std::path::{Path, PathBuf};

use crate::workspace::Workspace;
use crate::OperationError;

/// Extensions an engine run may leave behind. Multi-dot entries (e.g.
/// `synctex.gz`) are matched against the full suffix, not the last segment.
pub const AUXILIARY_EXTENSIONS: [&str; 19] = [
    "aux",
    "log",
    "toc",
    "lof",
    "lot",
    "out",
    "bbl",
    "blg",
    "bcf",
    "run.xml",
    "synctex.gz",
    "fls",
    "fdb_latexmk",
    "idx",
    "ind",
    "ilg",
    "nav",
    "snm",
    "vrb",
];

/// Delete the auxiliary files belonging to `document` and return the paths
/// actually removed. A second call finds nothing and returns an empty list.
pub fn clean(workspace: &Workspace, document: &Path) -> Result<Vec<PathBuf>, OperationError> {
    let resolved = workspace.resolve_existing(document)?;
    let artifacts = artifacts_for(&resolved)?;

    let mut removed = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        fs::remove_file(&artifact)?;
        tracing::debug!(path = %artifact.display(), "removed artifact");
        removed.push(artifact);
    }
    Ok(removed)
}

/// Enumerate the auxiliary files currently on disk for a resolved document
/// path. Shared with the compilation pipeline's artifact report.
pub(crate) fn artifacts_for(resolved: &Path) -> Result<Vec<PathBuf>, OperationError> {
    let directory = match resolved.parent() {
        Some(parent) => parent,
        None => return Ok(Vec::new()),
    };
    let base = match resolved.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem,
        None => return Ok(Vec::new()),
    };

    let mut artifacts = Vec::new();
    for extension in AUXILIARY_EXTENSIONS {
        let candidate = directory.join(format!("{base}.{extension}"));
        if candidate.is_file() {
            artifacts.push(candidate);
        }
    }
    artifacts.sort();
    Ok(artifacts)
}
