//! Comparison, synchronization, and provenance for hydrated artifacts.
//!
//! The flow this crate owns, after `hydrant-engine` has produced an
//! artifact set:
//!
//! 1. [`compare`] derives the minimal changeset against the previous
//!    artifacts, or decides the run is a no-op.
//! 2. [`writer`] reconciles a local output root with that changeset.
//! 3. [`sync`] lands the changeset on a review unit through a
//!    compare-and-set commit against a [`host::ReviewHost`].
//! 4. [`provenance`] records what happened, best-effort, after the commit.
//!
//! [`pipeline`] wires those stages into the two run modes the CLI exposes.

pub mod compare;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod provenance;
pub mod sync;
pub mod writer;

pub use error::SyncError;
pub use host::{
    is_automation_commit, CommitAuthor, CommitEntry, HostError, LocalHost, ReviewHost,
    AUTOMATION_EMAIL, AUTOMATION_NAME, MESSAGE_TAG,
};
pub use pipeline::{
    run_render, run_sync, PipelineConfig, RenderReport, SyncReport, TriggerEvent, TriggerKind,
};
pub use sync::{commit_message, sync_review_unit, SyncOutcome};
pub use writer::ApplyResult;
