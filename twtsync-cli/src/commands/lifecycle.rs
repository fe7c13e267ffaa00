//! `twtsync unpublish <id>` and `twtsync delete <id>`.

use anyhow::Result;
use clap::Args;

use twtsync_core::PerformanceId;
use twtsync_sync::SyncRequest;

#[derive(Args, Debug)]
pub struct UnpublishArgs {
    /// Performance id.
    #[arg(value_parser = super::parse_performance_id)]
    pub id: PerformanceId,
}

impl UnpublishArgs {
    pub fn run(self) -> Result<()> {
        super::trigger(SyncRequest::Unpublish(self.id))
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Performance id.
    #[arg(value_parser = super::parse_performance_id)]
    pub id: PerformanceId,
}

impl DeleteArgs {
    pub fn run(self) -> Result<()> {
        super::trigger(SyncRequest::Delete(self.id))
    }
}
