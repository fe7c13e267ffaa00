//! `twtsync init [--mode test|prod]`

use anyhow::{Context, Result};
use clap::Args;

use twtsync_core::settings::{self, ApiMode};

/// Scaffold the settings file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// API environment to use: test | prod.
    #[arg(long, default_value = "test")]
    pub mode: ApiMode,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let path = settings::settings_path_at(&home);
        if path.exists() {
            println!("Settings already exist at {}", path.display());
            return Ok(());
        }

        settings::init_at(&home, self.mode)
            .with_context(|| format!("failed to create {}", path.display()))?;
        println!("✓ Created {} (api mode: {})", path.display(), self.mode);
        println!("  Fill in the test and prod url and api_key, then run `twtsync check`.");
        Ok(())
    }
}
