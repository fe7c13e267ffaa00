//! `twtsync daemon`: periodic syncs in the foreground until ctrl-c.

use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        twtsync_daemon::start_blocking(&home, self.json_logs).context("daemon exited with error")
    }
}
