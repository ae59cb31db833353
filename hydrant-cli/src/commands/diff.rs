//! `hydrant diff` — show what render would change, without writing.

use anyhow::Result;
use clap::Args;

use hydrant_sync::{compare, run_render};

use super::{InputArgs, SelectorArgs};

/// Arguments for `hydrant diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub selector: SelectorArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        // Dry-run render derives the changeset and writes nothing.
        let config = self.inputs.to_config(self.selector.to_selector(), true);
        let report = run_render(&config)?;

        if report.changeset.is_empty() {
            println!("No differences.");
            return Ok(());
        }

        let diff = compare::unified_diff(&report.changeset);
        print!("{diff}");
        if !diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
