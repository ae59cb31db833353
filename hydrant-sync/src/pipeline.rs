//! End-to-end hydration pipeline.
//!
//! Two entry points, one per trigger mode:
//!
//! * [`run_render`] — template-change flow: hydrate, diff against the output
//!   root, write the changeset there.
//! * [`run_sync`] — review-unit flow: snapshot the unit's head, hydrate,
//!   diff against the previously committed artifacts, and land the changeset
//!   through the compare-and-set commit.
//!
//! Both flows share the same loading, selection, and hydration steps, so a
//! given template set and source of truth produce the same fingerprint no
//! matter which flow observes them.

use std::path::PathBuf;

use chrono::Utc;

use hydrant_core::{
    source, store, BranchName, Changeset, CommitId, EntitySelector, Fingerprint,
    HydratedArtifactSet, HydrationRun, ReviewUnit, ReviewUnitId, SourceOfTruth, TemplateSet,
};
use hydrant_engine::{HydrationEngine, OutputLayout};

use crate::compare;
use crate::error::SyncError;
use crate::host::{HostError, ReviewHost};
use crate::sync::{sync_review_unit, SyncOutcome};
use crate::writer::{self, ApplyResult};

// ---------------------------------------------------------------------------
// Configuration and triggers
// ---------------------------------------------------------------------------

/// Filesystem inputs and run options shared by both flows.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_root: PathBuf,
    pub overlays_root: PathBuf,
    pub source_path: PathBuf,
    pub output_root: PathBuf,
    pub selector: EntitySelector,
    pub layout: OutputLayout,
    pub dry_run: bool,
}

/// What kicked a run off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// A commit landed on a watched branch; artifacts are refreshed locally.
    BranchPushed,
    /// A review unit changed; artifacts are synced onto it.
    ReviewUnitUpdated,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::BranchPushed => "branch-pushed",
            TriggerKind::ReviewUnitUpdated => "review-unit-updated",
        }
    }
}

/// The event a run answers to. Branch names are optional cross-checks; when
/// present they must match the review unit being synced.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub commit: CommitId,
    pub source_branch: Option<BranchName>,
    pub target_branch: Option<BranchName>,
}

impl TriggerEvent {
    pub fn review_unit_updated(commit: impl Into<CommitId>) -> Self {
        TriggerEvent {
            kind: TriggerKind::ReviewUnitUpdated,
            commit: commit.into(),
            source_branch: None,
            target_branch: None,
        }
    }

    pub fn branch_pushed(commit: impl Into<CommitId>) -> Self {
        TriggerEvent {
            kind: TriggerKind::BranchPushed,
            commit: commit.into(),
            source_branch: None,
            target_branch: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What a render-only run did.
#[derive(Debug)]
pub struct RenderReport {
    pub entity_count: usize,
    pub template_version: String,
    pub source_hash: String,
    pub fingerprint: Fingerprint,
    pub changeset: Changeset,
    pub applied: Vec<ApplyResult>,
}

/// What a sync run did. `outcome` is `None` for dry runs, which stop after
/// deriving the changeset.
#[derive(Debug)]
pub struct SyncReport {
    pub run: HydrationRun,
    pub unit: ReviewUnit,
    pub fingerprint_before: Option<Fingerprint>,
    pub changeset: Changeset,
    pub outcome: Option<SyncOutcome>,
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

fn load_inputs(config: &PipelineConfig) -> Result<(TemplateSet, SourceOfTruth), SyncError> {
    let set = store::load_template_set(&config.base_root, &config.overlays_root)?;
    let sot = source::load(&config.source_path)?;
    log::debug!(
        "loaded template set {} and {} entit(ies) from {}",
        &set.version()[..8.min(set.version().len())],
        sot.len(),
        config.source_path.display()
    );
    Ok((set, sot))
}

fn hydrate(
    config: &PipelineConfig,
    set: &TemplateSet,
    sot: &SourceOfTruth,
) -> Result<(usize, HydratedArtifactSet), SyncError> {
    let selected = sot.select(&config.selector)?;
    if selected.is_empty() {
        log::warn!("{} matched no entities; producing an empty artifact set", config.selector);
    }
    let engine = HydrationEngine::new(config.layout);
    let artifacts = engine.hydrate_entities(set, &selected)?;
    log::debug!(
        "hydrated {} artifact(s) for {} entit(ies)",
        artifacts.len(),
        selected.len()
    );
    Ok((selected.len(), artifacts))
}

// ---------------------------------------------------------------------------
// Render flow
// ---------------------------------------------------------------------------

/// Hydrate and reconcile the output root with the result.
pub fn run_render(config: &PipelineConfig) -> Result<RenderReport, SyncError> {
    let (set, sot) = load_inputs(config)?;
    let (entity_count, next) = hydrate(config, &set, &sot)?;

    let previous = writer::read_artifacts(&config.output_root)?;
    let changeset = compare::diff(previous.as_ref(), &next);
    if changeset.is_empty() {
        log::info!("output root already matches, nothing to write");
    }
    let applied = writer::apply_changeset(&config.output_root, &changeset, config.dry_run)?;

    Ok(RenderReport {
        entity_count,
        template_version: set.version().to_string(),
        source_hash: sot.content_hash().to_string(),
        fingerprint: next.fingerprint(),
        changeset,
        applied,
    })
}

// ---------------------------------------------------------------------------
// Sync flow
// ---------------------------------------------------------------------------

/// Hydrate and land the result on a review unit.
///
/// `previous` carries the artifacts currently at the unit's head when the
/// caller can supply them (the local host materializes them); otherwise the
/// output root, assumed to be a checkout of the unit's branch, is read.
pub fn run_sync(
    config: &PipelineConfig,
    host: &dyn ReviewHost,
    unit_id: &ReviewUnitId,
    trigger: &TriggerEvent,
    previous: Option<HydratedArtifactSet>,
) -> Result<SyncReport, SyncError> {
    let unit = host.review_unit(unit_id)?;
    if !unit.is_open() {
        return Err(SyncError::Host(HostError::UnitClosed {
            unit: unit_id.clone(),
        }));
    }
    if let Some(branch) = &trigger.source_branch {
        if branch != &unit.source_branch {
            return Err(SyncError::BranchMismatch {
                trigger: branch.clone(),
                unit: unit.source_branch.clone(),
            });
        }
    }
    if let Some(branch) = &trigger.target_branch {
        if branch != &unit.target_branch {
            return Err(SyncError::BranchMismatch {
                trigger: branch.clone(),
                unit: unit.target_branch.clone(),
            });
        }
    }

    // This is the run's one head read; the commit below CASes against it.
    let snapshot_head = unit.head.clone();
    log::debug!(
        "run for '{unit_id}' ({}) snapshotting head {}",
        trigger.kind.as_str(),
        snapshot_head.short()
    );

    let (set, sot) = load_inputs(config)?;
    let (_, next) = hydrate(config, &set, &sot)?;

    let previous = match previous {
        Some(previous) => Some(previous),
        None => writer::read_artifacts(&config.output_root)?,
    };
    let fingerprint_before = previous.as_ref().map(|p| p.fingerprint());
    let changeset = compare::diff(previous.as_ref(), &next);

    let run = HydrationRun::new(
        trigger.commit.clone(),
        set.version(),
        sot.content_hash(),
        next.fingerprint(),
        Utc::now(),
    );

    let outcome = if config.dry_run {
        let (added, modified, removed) = changeset.counts();
        log::info!(
            "[dry-run] run {}: would sync {added} added, {modified} modified, {removed} removed",
            run.id
        );
        None
    } else {
        Some(sync_review_unit(
            host,
            unit_id,
            &run,
            &snapshot_head,
            &changeset,
            fingerprint_before.as_ref(),
        )?)
    };

    Ok(SyncReport {
        run,
        unit,
        fingerprint_before,
        changeset,
        outcome,
    })
}
