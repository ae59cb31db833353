//! `hydrant runs` — provenance history for a review unit.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use hydrant_core::{ProvenanceRecord, ReviewUnitId, RunOutcome};
use hydrant_sync::SyncError;

use super::HostArgs;

/// Arguments for `hydrant runs`.
#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Review unit to inspect.
    #[arg(long, value_name = "ID")]
    pub unit: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunsArgs {
    pub fn run(self) -> Result<()> {
        let handle = self.host.connect()?;
        let unit_id = ReviewUnitId::from(self.unit.as_str());

        let records = handle
            .as_review_host()
            .list_metadata(&unit_id)
            .map_err(SyncError::Host)
            .with_context(|| format!("cannot list runs for '{unit_id}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("failed to serialize runs JSON")?
            );
            return Ok(());
        }

        print_table(&unit_id, &records);
        Ok(())
    }
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "recorded at")]
    recorded_at: String,
    #[tabled(rename = "run")]
    run: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "trigger")]
    trigger: String,
    #[tabled(rename = "commit")]
    commit: String,
    #[tabled(rename = "fingerprint")]
    fingerprint: String,
}

fn print_table(unit_id: &ReviewUnitId, records: &[ProvenanceRecord]) {
    println!(
        "hydrant v{} | unit '{unit_id}' | {} run(s)",
        env!("CARGO_PKG_VERSION"),
        records.len()
    );
    if records.is_empty() {
        println!("No recorded runs.");
        return;
    }

    let rows: Vec<RunRow> = records
        .iter()
        .map(|record| RunRow {
            recorded_at: record.recorded_at.format("%Y-%m-%d %H:%M:%SZ").to_string(),
            run: record.run_id.clone(),
            outcome: outcome_label(record.outcome),
            trigger: record.trigger_commit.short().to_string(),
            commit: record
                .sync_commit
                .as_ref()
                .map(|c| c.short().to_string())
                .unwrap_or_else(|| "-".to_string()),
            fingerprint: record.fingerprint_after.short().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn outcome_label(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Committed => "committed".green().bold().to_string(),
        RunOutcome::Conflict => "conflict".yellow().bold().to_string(),
        RunOutcome::Failed => "failed".red().bold().to_string(),
        RunOutcome::NoOp => "no-op".bright_black().to_string(),
    }
}
