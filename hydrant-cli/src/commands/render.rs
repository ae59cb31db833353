//! `hydrant render` — hydrate templates and reconcile the output root.

use anyhow::Result;
use clap::Args;

use hydrant_sync::{run_render, ApplyResult, RenderReport};

use super::{InputArgs, SelectorArgs};

/// Arguments for `hydrant render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Show what would change without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let config = self
            .inputs
            .to_config(self.selector.to_selector(), self.dry_run);
        let report = run_render(&config)?;
        print_report(&report, self.dry_run);
        Ok(())
    }
}

fn print_report(report: &RenderReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    if report.changeset.is_empty() {
        println!(
            "{prefix}✓ output already matches ({} entities, fingerprint {})",
            report.entity_count,
            report.fingerprint.short()
        );
        return;
    }

    let (added, modified, removed) = report.changeset.counts();
    println!(
        "{prefix}✓ hydrated {} entities ({added} added, {modified} modified, {removed} removed)",
        report.entity_count
    );
    for result in &report.applied {
        match result {
            ApplyResult::Written { path } => println!("  ✎  {}", path.display()),
            ApplyResult::Removed { path } => println!("  ✗  {}", path.display()),
            ApplyResult::WouldWrite { path } => println!("  ~  {}", path.display()),
            ApplyResult::WouldRemove { path } => println!("  ~  {} (remove)", path.display()),
        }
    }
    println!("  fingerprint: {}", report.fingerprint.short());
}
