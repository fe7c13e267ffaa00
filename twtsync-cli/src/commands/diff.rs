//! `twtsync diff <id>`: show what syncing one performance would change.

use anyhow::{Context, Result};
use clap::Args;

use twtsync_core::PerformanceId;
use twtsync_sync::pipeline;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Performance id.
    #[arg(value_parser = super::parse_performance_id)]
    pub id: PerformanceId,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let id = self.id;
        let manager = pipeline::connect_at(&home).context("settings are not usable")?;
        let preview = manager
            .preview_performance(&id)
            .with_context(|| format!("diff failed for performance {id}"))?;

        if preview.is_unchanged() {
            println!("No differences for performance {id}.");
            return Ok(());
        }
        print!("{}", preview.unified_diff);
        if !preview.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
