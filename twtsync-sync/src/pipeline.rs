//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::path::Path;

use twtsync_api::ApiConnection;
use twtsync_core::ports::{ContentStore, TicketingApi};
use twtsync_core::settings::{self, Settings};
use twtsync_core::store::{FileContentStore, FileProductCatalog};
use twtsync_core::types::{ContentItem, PerformanceId};
use twtsync_renderer::HtmlRenderer;

use crate::manager::{ItemAction, Operation, SyncOptions, SyncReport, SyncWindow};
use crate::mapping::FieldMappingTable;
use crate::{SyncError, SyncManager};

/// Manager wired to the live API and the file-backed store.
pub type LiveManager = SyncManager<ApiConnection, FileContentStore>;

/// One trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    One(PerformanceId),
    /// `None` window means the default window.
    List {
        window: Option<SyncWindow>,
        create_and_retire: bool,
    },
    Availability { window: Option<SyncWindow> },
    Unpublish(PerformanceId),
    Delete(PerformanceId),
}

impl SyncRequest {
    /// The single status line shown for a finished trigger.
    pub fn status_message(&self, report: &SyncReport) -> String {
        let ok = report.is_success();
        match self {
            SyncRequest::One(id) if ok => format!("Performance ID {id} is now synced."),
            SyncRequest::One(id) => format!("Performance ID {id} failed to sync with the api."),
            SyncRequest::List { .. } if ok => format!(
                "Performance list is now synced ({} item(s)).",
                report.succeeded()
            ),
            SyncRequest::List { .. } => format!(
                "Performance list failed to sync with the api ({} of {} item(s) failed).",
                report.failed(),
                report.outcomes.len()
            ),
            SyncRequest::Availability { .. } if ok => format!(
                "Availability is now synced ({} item(s) updated).",
                report.succeeded()
            ),
            SyncRequest::Availability { .. } => format!(
                "Availability failed to sync with the api ({} of {} item(s) failed).",
                report.failed(),
                report.outcomes.len()
            ),
            SyncRequest::Unpublish(id) if ok => format!("Performance ID {id} is now unpublished."),
            SyncRequest::Unpublish(id) => format!("Performance ID {id} could not be unpublished."),
            SyncRequest::Delete(id) if ok => format!("Performance ID {id} is now deleted."),
            SyncRequest::Delete(id) => format!("Performance ID {id} could not be deleted."),
        }
    }
}

/// Build a [`LiveManager`] from the settings under `home`.
///
/// Invalid API settings fail here, before any request is made.
pub fn connect_at(home: &Path) -> Result<LiveManager, SyncError> {
    let settings = settings::load_at(home)?;
    connect_with(home, &settings)
}

pub fn connect_with(home: &Path, settings: &Settings) -> Result<LiveManager, SyncError> {
    let api = ApiConnection::new(&settings.api_settings()?);
    let renderer = HtmlRenderer::with_options(
        settings.template_dir.as_deref(),
        &settings.purchase_url_template,
    )?;
    let mapping = match &settings.mapping {
        Some(entries) => FieldMappingTable::from_entries(entries)?,
        None => FieldMappingTable::default(),
    };

    Ok(
        SyncManager::new(api, FileContentStore::open_at(home), renderer)
            .with_mapping(mapping)
            .with_products(Box::new(FileProductCatalog::open_at(home)))
            .with_options(SyncOptions::from(settings)),
    )
}

/// Run one trigger against the live API.
///
/// This is the canonical sync entrypoint for both the `twtsync` commands and
/// the daemon processor.
pub fn run(home: &Path, request: SyncRequest) -> Result<SyncReport, SyncError> {
    let mut manager = connect_at(home)?;
    run_with(&mut manager, request)
}

/// Run one trigger with an existing manager.
///
/// Only fatal errors are returned as `Err`; per-item failures are in the report.
pub fn run_with<A: TicketingApi, S: ContentStore>(
    manager: &mut SyncManager<A, S>,
    request: SyncRequest,
) -> Result<SyncReport, SyncError> {
    match request {
        SyncRequest::One(id) => {
            let result = manager.sync_one(&id);
            single(Operation::SyncOne, ItemAction::Updated, id, result)
        }
        SyncRequest::List {
            window,
            create_and_retire,
        } => {
            let window = window.unwrap_or_else(|| manager.default_window());
            manager.sync_list(window, create_and_retire)
        }
        SyncRequest::Availability { window } => {
            let window = window.unwrap_or_else(|| manager.default_window());
            manager.sync_availability(window)
        }
        SyncRequest::Unpublish(id) => {
            let result = manager.unpublish_performance(&id);
            single(Operation::Unpublish, ItemAction::Unpublished, id, result)
        }
        SyncRequest::Delete(id) => {
            let result = manager.delete_performance(&id);
            single(Operation::Delete, ItemAction::Deleted, id, result)
        }
    }
}

fn single(
    operation: Operation,
    action: ItemAction,
    id: PerformanceId,
    result: Result<ContentItem, SyncError>,
) -> Result<SyncReport, SyncError> {
    let result = match result {
        Err(e) if e.is_fatal() => return Err(e),
        other => other,
    };
    let mut report = SyncReport::new(operation);
    report.push(id, action, result);
    Ok(report)
}
