//! Error types for source-of-truth and template store loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::EntityName;

/// Failures while loading or querying the source of truth. These are data
/// errors: the document is missing, unreadable, or structurally wrong.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse source of truth at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("entity '{entity}' has no group; every entity must carry a non-empty 'group' key")]
    MissingGroup { entity: EntityName },

    #[error("entity '{entity}' is malformed: {detail}")]
    MalformedEntity { entity: EntityName, detail: String },

    #[error("no entity named '{name}' in the source of truth")]
    UnknownEntity { name: EntityName },
}

pub(crate) fn source_io_err(path: &Path, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Failures while loading template layers from disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template root {path} does not exist")]
    MissingRoot { path: PathBuf },

    #[error("template root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    /// Two overlay directories name the same group. Groups match
    /// case-insensitively, so at most one layer may exist per group.
    #[error("overlay directories '{first}' and '{second}' both name one group")]
    DuplicateOverlay { first: String, second: String },
}

pub(crate) fn store_io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
