use std::path::{Path, PathBuf};

use twtsync_core::settings::root_at;

pub const DAEMON_STATUS_FILE: &str = "daemon-status.json";

pub fn run_dir(home: &Path) -> PathBuf {
    root_at(home).join("run")
}

pub fn status_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_STATUS_FILE)
}
