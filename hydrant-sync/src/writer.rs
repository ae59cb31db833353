//! Changeset application under a local output root.
//!
//! The comparator has already minimized the changeset, so the writer applies
//! it verbatim: no hashing, no skip logic. Every file lands via the same
//! protocol: write to a `.hydrant.tmp` sibling, then rename over the final
//! path (atomic on POSIX). A failed rename cleans the sibling up and leaves
//! the previous file intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hydrant_core::{Change, Changeset, HydratedArtifactSet};
use hydrant_core::store;

use crate::error::{io_err, SyncError};

const TMP_SUFFIX: &str = ".hydrant.tmp";

/// Outcome of applying one change to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// File was created or rewritten.
    Written { path: PathBuf },
    /// File was deleted.
    Removed { path: PathBuf },
    /// Dry-run: the file *would* have been written.
    WouldWrite { path: PathBuf },
    /// Dry-run: the file *would* have been removed.
    WouldRemove { path: PathBuf },
}

impl ApplyResult {
    pub fn path(&self) -> &Path {
        match self {
            ApplyResult::Written { path }
            | ApplyResult::Removed { path }
            | ApplyResult::WouldWrite { path }
            | ApplyResult::WouldRemove { path } => path,
        }
    }
}

/// Apply a changeset beneath `root`, one result per change, in path order.
pub fn apply_changeset(
    root: &Path,
    changeset: &Changeset,
    dry_run: bool,
) -> Result<Vec<ApplyResult>, SyncError> {
    let mut results = Vec::with_capacity(changeset.len());
    for change in changeset.changes() {
        let target = root.join(change.path());
        match change {
            Change::Added { contents, .. } | Change::Modified { contents, .. } => {
                if dry_run {
                    log::info!("[dry-run] would write: {}", target.display());
                    results.push(ApplyResult::WouldWrite { path: target });
                    continue;
                }
                atomic_write_bytes(&target, contents).map_err(|e| io_err(&target, e))?;
                log::info!("wrote: {}", target.display());
                results.push(ApplyResult::Written { path: target });
            }
            Change::Removed { .. } => {
                if dry_run {
                    log::info!("[dry-run] would remove: {}", target.display());
                    results.push(ApplyResult::WouldRemove { path: target });
                    continue;
                }
                match std::fs::remove_file(&target) {
                    Ok(()) => log::info!("removed: {}", target.display()),
                    // Already absent is fine; the desired state holds.
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        log::debug!("already absent: {}", target.display());
                    }
                    Err(e) => return Err(io_err(&target, e)),
                }
                results.push(ApplyResult::Removed { path: target });
            }
        }
    }
    Ok(results)
}

/// Write bytes via a temp sibling plus rename. Creates parent directories.
pub(crate) fn atomic_write_bytes(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = PathBuf::from(format!("{}{}", path.display(), TMP_SUFFIX));
    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Read the artifacts currently present under `root`.
///
/// `None` when the root does not exist yet, which the comparator treats as
/// "no previous artifacts" rather than "everything was removed".
pub fn read_artifacts(root: &Path) -> Result<Option<HydratedArtifactSet>, SyncError> {
    if !root.exists() {
        return Ok(None);
    }
    let files = store::read_tree(root).map_err(SyncError::Store)?;
    Ok(Some(files.into_iter().collect()))
}
