//! `hydrant sync` — land hydrated artifacts on a review unit.

use anyhow::{Context, Result};
use clap::Args;

use hydrant_core::{BranchName, ReviewUnitId};
use hydrant_sync::{run_sync, HostError, SyncError, SyncOutcome, SyncReport, TriggerEvent};

use super::{HostArgs, InputArgs, SelectorArgs};

/// Arguments for `hydrant sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub selector: SelectorArgs,

    #[command(flatten)]
    pub host: HostArgs,

    /// Review unit to sync onto.
    #[arg(long, value_name = "ID")]
    pub unit: String,

    /// Commit id of the triggering event.
    #[arg(long, value_name = "SHA")]
    pub trigger_commit: String,

    /// Branch the trigger claims the unit is on; refused when it is not.
    #[arg(long, value_name = "BRANCH")]
    pub source_branch: Option<String>,

    /// Branch the trigger claims the unit merges into; refused when it is not.
    #[arg(long, value_name = "BRANCH")]
    pub target_branch: Option<String>,

    /// Derive and print the changeset without committing.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let handle = self.host.connect()?;
        let unit_id = ReviewUnitId::from(self.unit.as_str());

        let mut trigger = TriggerEvent::review_unit_updated(self.trigger_commit.as_str());
        trigger.source_branch = self
            .source_branch
            .as_deref()
            .map(BranchName::from);
        trigger.target_branch = self
            .target_branch
            .as_deref()
            .map(BranchName::from);

        let config = self
            .inputs
            .to_config(self.selector.to_selector(), self.dry_run);
        let previous = handle.previous_artifacts(&unit_id)?;

        let report = run_sync(
            &config,
            handle.as_review_host(),
            &unit_id,
            &trigger,
            previous,
        )
        .with_context(|| format!("sync failed for '{unit_id}'"))?;

        print_report(&unit_id, &report);

        // Conflict leaves nothing behind; surface it as the run's error so
        // the exit code distinguishes it from success.
        if let Some(SyncOutcome::Conflict { expected, actual }) = report.outcome {
            return Err(SyncError::Host(HostError::HeadMoved { expected, actual }).into());
        }
        Ok(())
    }
}

fn print_report(unit_id: &ReviewUnitId, report: &SyncReport) {
    let (added, modified, removed) = report.changeset.counts();

    match &report.outcome {
        None => {
            println!(
                "[dry-run] ✓ '{unit_id}' would sync {} change(s) ({added} added, {modified} modified, {removed} removed)",
                report.changeset.len()
            );
            for change in report.changeset.changes() {
                println!("  ~  {} ({})", change.path().display(), change.label());
            }
        }
        Some(SyncOutcome::NoOp) => {
            println!(
                "✓ '{unit_id}' already in sync (fingerprint {})",
                report.run.fingerprint.short()
            );
        }
        Some(SyncOutcome::Committed {
            commit,
            metadata_recorded,
        }) => {
            println!(
                "✓ '{unit_id}' synced as {} ({added} added, {modified} modified, {removed} removed)",
                commit.short()
            );
            println!("  run: {}", report.run.id);
            println!("  fingerprint: {}", report.run.fingerprint.short());
            if !*metadata_recorded {
                println!("  provenance: not recorded (commit is authoritative)");
            }
        }
        Some(SyncOutcome::Conflict { expected, actual }) => {
            println!(
                "✗ '{unit_id}' head moved {} -> {}; changeset abandoned, re-run to retry",
                expected.short(),
                actual.short()
            );
        }
    }
}
