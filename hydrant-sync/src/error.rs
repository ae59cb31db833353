//! Error types for hydrant-sync.

use std::path::{Path, PathBuf};

use thiserror::Error;

use hydrant_core::{BranchName, SourceError, StoreError};
use hydrant_engine::EngineError;

use crate::host::HostError;

/// All errors that can arise while running the hydration pipeline.
///
/// The variants preserve which stage failed; the CLI maps them onto its
/// exit-code classes without re-parsing messages.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source of truth could not be loaded or a selector did not resolve.
    #[error("source of truth error: {0}")]
    Source(#[from] SourceError),

    /// Template store could not be loaded.
    #[error("template store error: {0}")]
    Store(#[from] StoreError),

    /// Hydration failed.
    #[error("hydration error: {0}")]
    Engine(#[from] EngineError),

    /// The review host rejected or failed an operation.
    #[error("review host error: {0}")]
    Host(#[from] HostError),

    /// The trigger event named a branch that is not the one the unit reads
    /// from or merges into; committing would land artifacts on the wrong
    /// review.
    #[error("trigger branch '{trigger}' does not match review unit branch '{unit}'")]
    BranchMismatch { trigger: BranchName, unit: BranchName },

    /// Filesystem failure while reading or writing the output root.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl AsRef<Path>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}
