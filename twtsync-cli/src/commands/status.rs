//! `twtsync status`: synced performances and daemon activity.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use twtsync_core::{hash_store, settings, ContentItem, FileContentStore, PublicationState};
use twtsync_daemon::{status as daemon_status, DaemonStatus, RunSummary};

/// Arguments for `twtsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let report = build_report(&home)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&report, Utc::now());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    summary: StatusSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    daemon: Option<DaemonStatus>,
    performances: Vec<PerformanceRow>,
}

#[derive(Debug, Serialize)]
struct StatusSummary {
    performances: usize,
    published: usize,
    onsale: usize,
    last_write_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct PerformanceRow {
    id: String,
    title: String,
    state: PublicationState,
    start: Option<String>,
    onsale: bool,
    modified_at: Option<DateTime<Utc>>,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "start")]
    start: String,
    #[tabled(rename = "on sale")]
    onsale: String,
    #[tabled(rename = "modified")]
    modified: String,
}

fn build_report(home: &Path) -> Result<StatusReport> {
    let items = FileContentStore::open_at(home)
        .list_all()
        .context("failed to read the content store")?;
    let hashes = hash_store::load_at(&settings::root_at(home))
        .context("failed to read the hash store")?;
    let daemon = daemon_status::load_at(home).context("failed to read daemon status")?;

    let performances: Vec<PerformanceRow> = items.iter().map(row_for).collect();
    Ok(StatusReport {
        summary: StatusSummary {
            performances: performances.len(),
            published: items.iter().filter(|i| i.is_published()).count(),
            onsale: items.iter().filter(|i| i.onsale()).count(),
            last_write_at: hashes.synced_at,
        },
        daemon,
        performances,
    })
}

fn row_for(item: &ContentItem) -> PerformanceRow {
    PerformanceRow {
        id: item.performance_id.to_string(),
        title: item.title.clone(),
        state: item.state,
        start: item
            .dates
            .start()
            .map(|s| s.format("%Y-%m-%d %H:%M").to_string()),
        onsale: item.onsale(),
        modified_at: item.modified_at,
    }
}

fn print_table(report: &StatusReport, now: DateTime<Utc>) {
    println!(
        "twtsync v{} | {} performances | {} published | {} on sale",
        env!("CARGO_PKG_VERSION"),
        report.summary.performances,
        report.summary.published,
        report.summary.onsale,
    );
    println!(
        "Last write: {}",
        report
            .summary
            .last_write_at
            .map(|at| format_age(now, at))
            .unwrap_or_else(|| "never".to_string())
    );
    match &report.daemon {
        Some(daemon) => {
            println!("Daemon list sync:         {}", run_line(daemon.last_list.as_ref(), now));
            println!(
                "Daemon availability sync: {}",
                run_line(daemon.last_availability.as_ref(), now)
            );
        }
        None => println!("Daemon: never ran"),
    }

    if report.performances.is_empty() {
        println!("No performances synced yet. Run `twtsync sync list --create-missing`.");
        return;
    }

    let rows: Vec<TableRow> = report
        .performances
        .iter()
        .map(|p| TableRow {
            id: p.id.clone(),
            title: p.title.clone(),
            state: match p.state {
                PublicationState::Published => "published".green().to_string(),
                PublicationState::Private => "private".bright_black().to_string(),
            },
            start: p.start.clone().unwrap_or_else(|| "-".to_string()),
            onsale: if p.onsale { "yes".to_string() } else { "no".to_string() },
            modified: p
                .modified_at
                .map(|at| format_age(now, at))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn run_line(summary: Option<&RunSummary>, now: DateTime<Utc>) -> String {
    let Some(summary) = summary else {
        return "never".to_string();
    };
    let when = i64::try_from(summary.finished_at_unix)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|at| format_age(now, at))
        .unwrap_or_else(|| "unknown".to_string());
    let mark = if summary.completed && summary.failed == 0 {
        "✓".green()
    } else {
        "✗".red()
    };
    format!("{when} {mark} {}", summary.message)
}

fn format_age(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
