//! Review host interface and the directory-backed local host.
//!
//! A review host owns review units, their branch heads, and their metadata
//! streams. The synchronizer only ever talks to the [`ReviewHost`] trait;
//! which concrete host sits behind it (the local one below, or an HTTP one)
//! is the caller's business.
//!
//! Commits are compare-and-set: the caller names the parent it based its
//! changeset on, and the host refuses with [`HostError::HeadMoved`] when the
//! unit's head is anything else. That refusal is the conflict signal; it is
//! never retried within a run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hydrant_core::hash;
use hydrant_core::store;
use hydrant_core::{
    BranchName, Change, Changeset, CommitId, HydratedArtifactSet, ProvenanceRecord, ReviewUnit,
    ReviewUnitId, ReviewUnitState,
};

use crate::writer::atomic_write_bytes;

// ---------------------------------------------------------------------------
// Automation identity
// ---------------------------------------------------------------------------

/// Committer name used for every automated sync commit.
pub const AUTOMATION_NAME: &str = "hydrant-bot";
/// Committer address; `.invalid` is reserved and never routes.
pub const AUTOMATION_EMAIL: &str = "hydrant-bot@invalid";
/// Leading tag on every automated commit message.
pub const MESSAGE_TAG: &str = "[hydrant]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    /// The automation identity every sync commit is attributed to.
    pub fn automation() -> Self {
        CommitAuthor {
            name: AUTOMATION_NAME.to_string(),
            email: AUTOMATION_EMAIL.to_string(),
        }
    }
}

impl std::fmt::Display for CommitAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// True when a commit was produced by the synchronizer rather than a human.
/// Either signal suffices; tooling that rewrites authors still leaves the
/// message tag in place.
pub fn is_automation_commit(author: &CommitAuthor, message: &str) -> bool {
    author.name == AUTOMATION_NAME || message.starts_with(MESSAGE_TAG)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// All errors a review host can report.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unit state at {path} is malformed: {source}")]
    State {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no review unit '{unit}' on this host")]
    UnknownUnit { unit: ReviewUnitId },

    #[error("review unit '{unit}' already exists")]
    UnitExists { unit: ReviewUnitId },

    #[error("review unit '{unit}' is closed")]
    UnitClosed { unit: ReviewUnitId },

    /// The compare-and-set parent check failed: someone else advanced the
    /// head since this run snapshotted it.
    #[error("head moved: expected {expected}, found {actual}")]
    HeadMoved {
        expected: CommitId,
        actual: CommitId,
    },

    /// Transport-level failure from a remote host implementation.
    #[error("host request failed: {detail}")]
    Http { detail: String },
}

fn host_io_err(path: &Path, source: std::io::Error) -> HostError {
    HostError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// ReviewHost trait
// ---------------------------------------------------------------------------

/// The operations the synchronizer needs from a review host.
pub trait ReviewHost {
    /// Fetch the unit's current record, including its head commit.
    fn review_unit(&self, id: &ReviewUnitId) -> Result<ReviewUnit, HostError>;

    /// Current head of the unit's source branch.
    fn get_head(&self, id: &ReviewUnitId) -> Result<CommitId, HostError> {
        self.review_unit(id).map(|unit| unit.head)
    }

    /// Commit a changeset onto the unit's source branch, with `parent` as
    /// the compare-and-set guard. Returns the new commit id.
    fn commit(
        &self,
        id: &ReviewUnitId,
        parent: &CommitId,
        changeset: &Changeset,
        author: &CommitAuthor,
        message: &str,
    ) -> Result<CommitId, HostError>;

    /// Append one provenance record to the unit's metadata stream.
    fn append_metadata(&self, id: &ReviewUnitId, record: &ProvenanceRecord)
        -> Result<(), HostError>;

    /// All provenance records for the unit, oldest first.
    fn list_metadata(&self, id: &ReviewUnitId) -> Result<Vec<ProvenanceRecord>, HostError>;
}

// ---------------------------------------------------------------------------
// Local host
// ---------------------------------------------------------------------------

/// One commit as the local host records it. Contents live in the unit's
/// materialized tree; the entry only keeps the touched paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEntry {
    pub id: CommitId,
    pub parent: CommitId,
    pub author: CommitAuthor,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnitState {
    unit: ReviewUnit,
    commits: Vec<CommitEntry>,
    metadata: Vec<ProvenanceRecord>,
}

/// Directory-backed review host for local runs, CI fixtures, and tests.
///
/// ```text
/// <root>/units/<unit-id>/unit.json   unit record, commit log, metadata
/// <root>/units/<unit-id>/tree/       artifacts as of the current head
/// ```
///
/// State saves use the same `.tmp` + rename pattern as the output writer.
pub struct LocalHost {
    root: PathBuf,
}

impl LocalHost {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        LocalHost { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_dir(&self, id: &ReviewUnitId) -> PathBuf {
        self.root.join("units").join(&id.0)
    }

    fn state_path(&self, id: &ReviewUnitId) -> PathBuf {
        self.unit_dir(id).join("unit.json")
    }

    fn tree_dir(&self, id: &ReviewUnitId) -> PathBuf {
        self.unit_dir(id).join("tree")
    }

    /// Create a unit with the given branches and initial head.
    pub fn init_unit(
        &self,
        id: impl Into<ReviewUnitId>,
        source_branch: impl Into<BranchName>,
        target_branch: impl Into<BranchName>,
        head: impl Into<CommitId>,
    ) -> Result<ReviewUnit, HostError> {
        let id = id.into();
        let path = self.state_path(&id);
        if path.exists() {
            return Err(HostError::UnitExists { unit: id });
        }
        let unit = ReviewUnit {
            id: id.clone(),
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
            head: head.into(),
            state: ReviewUnitState::Open,
        };
        let state = UnitState {
            unit: unit.clone(),
            commits: Vec::new(),
            metadata: Vec::new(),
        };
        self.save_state(&id, &state)?;
        Ok(unit)
    }

    /// Mark a unit closed; later commits are refused.
    pub fn close_unit(&self, id: &ReviewUnitId) -> Result<(), HostError> {
        let mut state = self.load_state(id)?;
        state.unit.state = ReviewUnitState::Closed;
        self.save_state(id, &state)
    }

    /// Artifacts as of the unit's head, or `None` before the first commit.
    pub fn artifact_tree(
        &self,
        id: &ReviewUnitId,
    ) -> Result<Option<HydratedArtifactSet>, HostError> {
        // Distinguish "unit missing" from "no commits yet".
        self.load_state(id)?;
        let tree = self.tree_dir(id);
        if !tree.exists() {
            return Ok(None);
        }
        let files = store::read_tree(&tree).map_err(|e| HostError::Io {
            path: tree.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;
        Ok(Some(files.into_iter().collect()))
    }

    /// Full commit log, oldest first.
    pub fn commit_log(&self, id: &ReviewUnitId) -> Result<Vec<CommitEntry>, HostError> {
        Ok(self.load_state(id)?.commits)
    }

    fn load_state(&self, id: &ReviewUnitId) -> Result<UnitState, HostError> {
        let path = self.state_path(id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(HostError::UnknownUnit { unit: id.clone() })
            }
            Err(e) => return Err(host_io_err(&path, e)),
        };
        serde_json::from_str(&contents).map_err(|e| HostError::State { path, source: e })
    }

    fn save_state(&self, id: &ReviewUnitId, state: &UnitState) -> Result<(), HostError> {
        let path = self.state_path(id);
        let json = serde_json::to_string_pretty(state).map_err(|e| HostError::State {
            path: path.clone(),
            source: e,
        })?;
        atomic_write_bytes(&path, json.as_bytes()).map_err(|e| host_io_err(&path, e))
    }
}

fn commit_id_for(parent: &CommitId, author: &CommitAuthor, message: &str, changeset: &Changeset) -> CommitId {
    let author = author.to_string();
    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("parent".to_string(), parent.0.as_bytes().to_vec()),
        ("author".to_string(), author.into_bytes()),
        ("message".to_string(), message.as_bytes().to_vec()),
    ];
    for change in changeset.changes() {
        let label = format!("{}:{}", change.label(), change.path().display());
        let contents = match change {
            Change::Added { contents, .. } | Change::Modified { contents, .. } => contents.clone(),
            Change::Removed { .. } => Vec::new(),
        };
        parts.push((label, contents));
    }
    let digest = hash::sha256_hex_parts(parts.iter().map(|(l, b)| (l.as_str(), b.as_slice())));
    CommitId(digest[..40].to_string())
}

impl ReviewHost for LocalHost {
    fn review_unit(&self, id: &ReviewUnitId) -> Result<ReviewUnit, HostError> {
        Ok(self.load_state(id)?.unit)
    }

    fn commit(
        &self,
        id: &ReviewUnitId,
        parent: &CommitId,
        changeset: &Changeset,
        author: &CommitAuthor,
        message: &str,
    ) -> Result<CommitId, HostError> {
        let mut state = self.load_state(id)?;
        if !state.unit.is_open() {
            return Err(HostError::UnitClosed { unit: id.clone() });
        }
        if &state.unit.head != parent {
            return Err(HostError::HeadMoved {
                expected: parent.clone(),
                actual: state.unit.head.clone(),
            });
        }

        let commit_id = commit_id_for(parent, author, message, changeset);
        state.commits.push(CommitEntry {
            id: commit_id.clone(),
            parent: parent.clone(),
            author: author.clone(),
            message: message.to_string(),
            committed_at: Utc::now(),
            paths: changeset.changes().iter().map(|c| c.path().to_path_buf()).collect(),
        });
        state.unit.head = commit_id.clone();
        // The head advance must land before any tree write. A tree write
        // failing afterwards leaves a residual diff the next run re-derives
        // against the new head; a tree materialized ahead of the head would
        // read back as an empty changeset and the change would never land.
        self.save_state(id, &state)?;

        let tree = self.tree_dir(id);
        for change in changeset.changes() {
            let target = tree.join(change.path());
            match change {
                Change::Added { contents, .. } | Change::Modified { contents, .. } => {
                    atomic_write_bytes(&target, contents).map_err(|e| host_io_err(&target, e))?;
                }
                Change::Removed { .. } => match std::fs::remove_file(&target) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(host_io_err(&target, e)),
                },
            }
        }

        log::debug!("unit '{id}' advanced to {commit_id}");
        Ok(commit_id)
    }

    fn append_metadata(
        &self,
        id: &ReviewUnitId,
        record: &ProvenanceRecord,
    ) -> Result<(), HostError> {
        // Metadata stays writable after close; the stream is append-only
        // history, not review content.
        let mut state = self.load_state(id)?;
        state.metadata.push(record.clone());
        self.save_state(id, &state)
    }

    fn list_metadata(&self, id: &ReviewUnitId) -> Result<Vec<ProvenanceRecord>, HostError> {
        Ok(self.load_state(id)?.metadata)
    }
}
