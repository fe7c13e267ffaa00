pub mod check;
pub mod daemon;
pub mod diff;
pub mod init;
pub mod lifecycle;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use twtsync_core::PerformanceId;
use twtsync_sync::{SyncReport, SyncRequest};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// clap value parser: trims the id and rejects blank ones.
pub(crate) fn parse_performance_id(raw: &str) -> Result<PerformanceId, String> {
    PerformanceId::from_value(&serde_json::Value::String(raw.to_owned()))
        .ok_or_else(|| "performance id must not be blank".to_string())
}

/// Run one trigger and print its status line.
///
/// Item failures are listed on stderr and turn the exit code non-zero.
pub(crate) fn trigger(request: SyncRequest) -> Result<()> {
    let home = home()?;
    let report = twtsync_sync::pipeline::run(&home, request.clone())
        .context("sync could not start — run `twtsync check`")?;
    finish(&request, &report)
}

pub(crate) fn finish(request: &SyncRequest, report: &SyncReport) -> Result<()> {
    let message = request.status_message(report);
    for outcome in &report.outcomes {
        if let Err(err) = &outcome.result {
            eprintln!("  {} {} ({}): {err}", "✗".red(), outcome.id, outcome.action);
        }
    }
    if !report.excluded.is_empty() {
        eprintln!(
            "  {} {} record(s) without a usable performance id were skipped",
            "!".yellow(),
            report.excluded.len()
        );
    }
    if report.is_success() {
        println!("{} {message}", "✓".green());
        Ok(())
    } else {
        bail!(message)
    }
}
