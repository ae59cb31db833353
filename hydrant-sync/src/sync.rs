//! Review-unit synchronizer.
//!
//! One sync attempt per run, fail-closed: the changeset was derived against
//! a snapshotted head, and the commit names that head as its parent. If the
//! head moved in the meantime the host refuses, the run reports
//! [`SyncOutcome::Conflict`], and nothing is written. The next triggered run
//! re-reads the head and re-derives the changeset; there is no in-run retry.

use hydrant_core::{Changeset, CommitId, Fingerprint, HydrationRun, ReviewUnitId, RunOutcome};

use crate::error::SyncError;
use crate::host::{CommitAuthor, HostError, ReviewHost, MESSAGE_TAG};
use crate::provenance;

/// How a sync attempt ended. `Failed` has no variant here: failures are
/// errors and travel through `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The changeset was empty; nothing was committed and no metadata was
    /// written.
    NoOp,
    /// The changeset landed as `commit`. `metadata_recorded` is false when
    /// the commit succeeded but the provenance append did not.
    Committed {
        commit: CommitId,
        metadata_recorded: bool,
    },
    /// The unit's head was no longer the snapshotted parent.
    Conflict {
        expected: CommitId,
        actual: CommitId,
    },
}

impl SyncOutcome {
    pub fn as_run_outcome(&self) -> RunOutcome {
        match self {
            SyncOutcome::NoOp => RunOutcome::NoOp,
            SyncOutcome::Committed { .. } => RunOutcome::Committed,
            SyncOutcome::Conflict { .. } => RunOutcome::Conflict,
        }
    }
}

/// Commit message for a sync commit: tagged subject line plus git-style
/// trailers carrying the run identity.
pub fn commit_message(run: &HydrationRun, changeset: &Changeset) -> String {
    let (added, modified, removed) = changeset.counts();
    format!(
        "{tag} hydrate {total} artifact(s): {added} added, {modified} modified, {removed} removed\n\
         \n\
         Hydration-Run: {run_id}\n\
         Trigger-Commit: {trigger}\n\
         Template-Version: {template}\n\
         Source-Hash: {source}\n\
         Artifact-Fingerprint: {fingerprint}\n",
        tag = MESSAGE_TAG,
        total = changeset.len(),
        added = added,
        modified = modified,
        removed = removed,
        run_id = run.id,
        trigger = run.trigger_commit,
        template = run.template_version,
        source = run.source_hash,
        fingerprint = run.fingerprint,
    )
}

/// Land a changeset on a review unit.
///
/// * Empty changeset: [`SyncOutcome::NoOp`], the host is not contacted.
/// * Head moved: [`SyncOutcome::Conflict`], nothing written, not retried.
/// * Commit landed: provenance is appended best-effort; a metadata failure
///   never rolls back or fails the sync.
/// * Anything else (closed unit, transport, io): `Err`, the run failed.
pub fn sync_review_unit(
    host: &dyn ReviewHost,
    unit_id: &ReviewUnitId,
    run: &HydrationRun,
    snapshot_head: &CommitId,
    changeset: &Changeset,
    fingerprint_before: Option<&Fingerprint>,
) -> Result<SyncOutcome, SyncError> {
    if changeset.is_empty() {
        log::info!(
            "run {}: artifacts already match (fingerprint {}), nothing to sync",
            run.id,
            run.fingerprint.short()
        );
        return Ok(SyncOutcome::NoOp);
    }

    let message = commit_message(run, changeset);
    let author = CommitAuthor::automation();

    let commit = match host.commit(unit_id, snapshot_head, changeset, &author, &message) {
        Ok(commit) => commit,
        Err(HostError::HeadMoved { expected, actual }) => {
            log::warn!(
                "run {}: head of '{unit_id}' moved from {} to {}, conflict",
                run.id,
                expected.short(),
                actual.short()
            );
            return Ok(SyncOutcome::Conflict { expected, actual });
        }
        Err(e) => return Err(SyncError::Host(e)),
    };
    log::info!(
        "run {}: committed {} change(s) to '{unit_id}' as {}",
        run.id,
        changeset.len(),
        commit.short()
    );

    let record = provenance::build_record(
        run,
        RunOutcome::Committed,
        fingerprint_before.cloned(),
        Some(commit.clone()),
        None,
    );
    let metadata_recorded = match provenance::record(host, unit_id, &record) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "run {}: commit {} landed but provenance append failed: {e}",
                run.id,
                commit.short()
            );
            false
        }
    };

    Ok(SyncOutcome::Committed {
        commit,
        metadata_recorded,
    })
}
