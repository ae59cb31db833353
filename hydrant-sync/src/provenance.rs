//! Change-provenance recording.
//!
//! Provenance is an append-only stream of [`ProvenanceRecord`]s attached to
//! a review unit, written after a successful commit and never as a
//! precondition for one. A lost record costs audit detail, not correctness:
//! the artifacts and the commit they rode in on are already safe.

use chrono::Utc;

use hydrant_core::{
    CommitId, Fingerprint, HydrationRun, ProvenanceRecord, ReviewUnitId, RunOutcome,
};

use crate::host::{HostError, ReviewHost};

/// Assemble the record for one finished run.
pub fn build_record(
    run: &HydrationRun,
    outcome: RunOutcome,
    fingerprint_before: Option<Fingerprint>,
    sync_commit: Option<CommitId>,
    detail: Option<String>,
) -> ProvenanceRecord {
    ProvenanceRecord {
        run_id: run.id.clone(),
        recorded_at: Utc::now(),
        trigger_commit: run.trigger_commit.clone(),
        template_version: run.template_version.clone(),
        source_hash: run.source_hash.clone(),
        outcome,
        fingerprint_before,
        fingerprint_after: run.fingerprint.clone(),
        sync_commit,
        detail,
    }
}

/// Append one record to the unit's stream.
pub fn record(
    host: &dyn ReviewHost,
    unit_id: &ReviewUnitId,
    record: &ProvenanceRecord,
) -> Result<(), HostError> {
    host.append_metadata(unit_id, record)?;
    log::debug!(
        "recorded run {} ({}) on '{unit_id}'",
        record.run_id,
        record.outcome
    );
    Ok(())
}

/// Every recorded run for the unit, oldest first.
pub fn history(
    host: &dyn ReviewHost,
    unit_id: &ReviewUnitId,
) -> Result<Vec<ProvenanceRecord>, HostError> {
    host.list_metadata(unit_id)
}
