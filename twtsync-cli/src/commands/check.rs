//! `twtsync check`: validate settings before any sync is attempted.

use anyhow::{Context, Result};
use clap::Args;

use twtsync_core::settings;
use twtsync_sync::pipeline;

#[derive(Args, Debug)]
pub struct CheckArgs {}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let settings = settings::load_at(&home)
            .context("failed to load settings — run `twtsync init` first")?;
        let manager =
            pipeline::connect_with(&home, &settings).context("settings are not usable")?;

        println!("✓ Settings are valid");
        println!("  api mode:   {}", manager.api().api_mode());
        println!("  api url:    {}", manager.api().api_url());
        println!("  container:  {}", manager.options().container);
        println!(
            "  schedule:   list every {} min, availability every {} min",
            settings.schedule.list_interval_minutes, settings.schedule.availability_interval_minutes
        );
        println!("  window:     {}", manager.default_window());
        Ok(())
    }
}
