//! `twtsync sync one|list|availability`

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};

use twtsync_core::{settings, PerformanceId};
use twtsync_sync::{SyncRequest, SyncWindow};

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Full field sync of one existing performance.
    One {
        /// Performance id.
        #[arg(value_parser = super::parse_performance_id)]
        id: PerformanceId,
    },

    /// Sync every performance listed for the window.
    List {
        #[command(flatten)]
        window: WindowArgs,

        /// Create missing performances and unpublish ones no longer listed.
        #[arg(long)]
        create_missing: bool,
    },

    /// Refresh on-sale state of performances whose availability changed.
    Availability {
        #[command(flatten)]
        window: WindowArgs,
    },
}

/// Date window; both bounds inclusive, `YYYY-MM-DD`.
#[derive(Args, Debug, Default)]
pub struct WindowArgs {
    /// First day (default: today).
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day (default: first day + configured window years).
    #[arg(long, value_name = "DATE")]
    pub until: Option<NaiveDate>,
}

impl WindowArgs {
    /// `None` when neither bound is given, so the sync uses its default window.
    pub fn resolve(&self, today: NaiveDate, window_years: u32) -> Result<Option<SyncWindow>> {
        let window = match (self.from, self.until) {
            (None, None) => return Ok(None),
            (Some(from), None) => SyncWindow::starting(from, window_years),
            (from, Some(until)) => SyncWindow::new(from.unwrap_or(today), until)?,
        };
        Ok(Some(window))
    }
}

pub fn run(command: SyncCommand) -> Result<()> {
    let request = match command {
        SyncCommand::One { id } => SyncRequest::One(id),
        SyncCommand::List {
            window,
            create_missing,
        } => SyncRequest::List {
            window: resolve_window(&window)?,
            create_and_retire: create_missing,
        },
        SyncCommand::Availability { window } => SyncRequest::Availability {
            window: resolve_window(&window)?,
        },
    };
    super::trigger(request)
}

fn resolve_window(args: &WindowArgs) -> Result<Option<SyncWindow>> {
    if args.from.is_none() && args.until.is_none() {
        return Ok(None);
    }
    let home = super::home()?;
    let settings = settings::load_at(&home)
        .context("failed to load settings — run `twtsync init` first")?;
    args.resolve(Local::now().date_naive(), settings.schedule.window_years)
}
