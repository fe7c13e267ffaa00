//! Daemon status file at `<home>/.twtsync/run/daemon-status.json`.
//!
//! Written by the processor after every run; read by `twtsync status`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, status_path};
use crate::runtime::JobKind;

/// Outcome of one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job: JobKind,
    pub finished_at_unix: u64,
    pub duration_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub excluded: usize,
    /// The one-line status message, or the fatal error.
    pub message: String,
    /// False when the whole run was aborted before item work started.
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub pid: u32,
    pub started_at_unix: u64,
    pub runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_list: Option<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_availability: Option<RunSummary>,
}

impl DaemonStatus {
    pub fn starting_now() -> Self {
        DaemonStatus {
            pid: std::process::id(),
            started_at_unix: unix_seconds_now(),
            ..DaemonStatus::default()
        }
    }

    pub fn record(&mut self, summary: RunSummary) {
        self.runs += 1;
        match summary.job {
            JobKind::List => self.last_list = Some(summary),
            JobKind::Availability => self.last_availability = Some(summary),
        }
    }

    /// Most recent run of either kind.
    pub fn last_run_at_unix(&self) -> u64 {
        [&self.last_list, &self.last_availability]
            .into_iter()
            .flatten()
            .map(|s| s.finished_at_unix)
            .max()
            .unwrap_or(0)
    }
}

/// `None` when the daemon has never written a status file.
pub fn load_at(home: &Path) -> Result<Option<DaemonStatus>, DaemonError> {
    let path = status_path(home);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(&path, err)),
    }
}

/// Save atomically (`.tmp` sibling, then rename).
pub fn save_at(home: &Path, status: &DaemonStatus) -> Result<(), DaemonError> {
    let dir = run_dir(home);
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let path = status_path(home);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(status)?;
    fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

pub(crate) fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
