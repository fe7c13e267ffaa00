//! twtsync daemon: periodic list and availability syncs.
//!
//! Two interval timers feed one sequential processor, so sync runs never
//! overlap. Each run goes through [`twtsync_sync::pipeline::run`], the same
//! entrypoint the `twtsync` commands use.

mod error;
pub mod paths;
mod runtime;
pub mod status;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, run, run_with, start_blocking, DaemonConfig, JobKind, JobRunner, LiveRunner,
};
pub use status::{DaemonStatus, RunSummary};
