//! Sync manager: the top-level sync operations.
//!
//! ## Full field sync
//!
//! 1. Reset every attribute to its empty value (the id is never touched,
//!    pinned subjects survive).
//! 2. Map and transform each upstream field.
//! 3. Regenerate the availability block.
//! 4. Regenerate the arrangement block.
//! 5. Validate dates: a lone start date becomes the end date too; no start
//!    date at all fails validation and nothing is committed.
//! 6. Commit.
//!
//! Every item is committed on its own. A failing item is rolled back and
//! recorded in the [`SyncReport`]; the rest of the batch carries on.

use std::fmt;

use chrono::{Local, Months, NaiveDate};
use serde_json::Value;

use twtsync_core::ports::{ContentStore, NoProducts, ProductCatalog, TicketingApi};
use twtsync_core::settings::{Settings, DEFAULT_CONTAINER};
use twtsync_core::types::{
    ContentItem, PerformanceId, PublicationState, UpstreamRecord, ID_FIELD, ONSALE_FIELD,
};
use twtsync_renderer::engine::STATUS_FIELD;
use twtsync_renderer::HtmlRenderer;

use crate::error::SyncError;
use crate::mapping::{FieldMappingTable, Resolution};
use crate::reconcile::{index_upstream, reconcile, Excluded, Reconciliation};
use crate::transform::{coerce, TransformContext, TransformRegistry, TransformResult};

/// Content type of created items.
pub const PORTAL_TYPE: &str = "Performance";

/// Upstream field with the human status text.
pub const STATUS_MESSAGE_FIELD: &str = "statusMessage";

/// Upstream field with the performance title.
pub const TITLE_FIELD: &str = "title";

// ---------------------------------------------------------------------------
// Window and options
// ---------------------------------------------------------------------------

/// Inclusive date window of a list or availability sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub from: NaiveDate,
    pub until: NaiveDate,
}

impl SyncWindow {
    pub fn new(from: NaiveDate, until: NaiveDate) -> Result<Self, SyncError> {
        if until < from {
            return Err(SyncError::RequestSetup(format!(
                "dateUntil {until} is before dateFrom {from}"
            )));
        }
        Ok(SyncWindow { from, until })
    }

    /// `from` → `from` + `years` years.
    pub fn starting(from: NaiveDate, years: u32) -> Self {
        let until = from
            .checked_add_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MAX);
        SyncWindow { from, until }
    }

    pub fn from_today(years: u32) -> Self {
        Self::starting(Local::now().date_naive(), years)
    }

    /// Whether an item's start date falls inside the window.
    pub fn contains(&self, item: &ContentItem) -> bool {
        matches!(item.dates.start(), Some(start) if start.date() >= self.from && start.date() <= self.until)
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from, self.until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Container new items are created in.
    pub container: String,
    /// Subjects that survive a field reset and a genre update.
    pub pinned_subjects: Vec<String>,
    /// Length of the default window.
    pub window_years: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions::from(&Settings::default())
    }
}

impl From<&Settings> for SyncOptions {
    fn from(settings: &Settings) -> Self {
        let container = if settings.container.trim().is_empty() {
            DEFAULT_CONTAINER.to_string()
        } else {
            settings.container.clone()
        };
        SyncOptions {
            container,
            pinned_subjects: settings.pinned_subjects.clone(),
            window_years: settings.schedule.window_years,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SyncOne,
    SyncList,
    SyncAvailability,
    Unpublish,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::SyncOne => "sync-one",
            Operation::SyncList => "sync-list",
            Operation::SyncAvailability => "sync-availability",
            Operation::Unpublish => "unpublish",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Created,
    Updated,
    Retired,
    AvailabilityUpdated,
    Unpublished,
    Deleted,
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemAction::Created => "created",
            ItemAction::Updated => "updated",
            ItemAction::Retired => "retired",
            ItemAction::AvailabilityUpdated => "availability updated",
            ItemAction::Unpublished => "unpublished",
            ItemAction::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Result for one performance inside a trigger.
#[derive(Debug)]
pub struct ItemOutcome {
    pub id: PerformanceId,
    pub action: ItemAction,
    pub result: Result<ContentItem, SyncError>,
}

/// Everything one trigger did.
#[derive(Debug)]
pub struct SyncReport {
    pub operation: Operation,
    pub outcomes: Vec<ItemOutcome>,
    /// Upstream records or website items without a usable id.
    pub excluded: Vec<Excluded>,
}

impl SyncReport {
    pub fn new(operation: Operation) -> Self {
        SyncReport {
            operation,
            outcomes: Vec::new(),
            excluded: Vec::new(),
        }
    }

    pub(crate) fn push(
        &mut self,
        id: PerformanceId,
        action: ItemAction,
        result: Result<ContentItem, SyncError>,
    ) {
        match &result {
            Ok(_) => tracing::info!("performance {id}: {action}"),
            Err(e) => tracing::error!("performance {id}: {action} failed: {e}"),
        }
        self.outcomes.push(ItemOutcome { id, action, result });
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Ids with `action` that succeeded, in processing order.
    pub fn ids_with(&self, action: ItemAction) -> Vec<&PerformanceId> {
        self.outcomes
            .iter()
            .filter(|o| o.action == action && o.result.is_ok())
            .map(|o| &o.id)
            .collect()
    }

    pub fn outcome(&self, id: &PerformanceId) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| &o.id == id)
    }
}

// ---------------------------------------------------------------------------
// SyncManager
// ---------------------------------------------------------------------------

/// Runs sync operations against a ticketing API and a content store.
pub struct SyncManager<A, S> {
    api: A,
    store: S,
    products: Box<dyn ProductCatalog>,
    renderer: HtmlRenderer,
    mapping: FieldMappingTable,
    transforms: TransformRegistry,
    options: SyncOptions,
}

impl<A: TicketingApi, S: ContentStore> SyncManager<A, S> {
    /// Default mapping table, transforms and options; no product lookup.
    pub fn new(api: A, store: S, renderer: HtmlRenderer) -> Self {
        SyncManager {
            api,
            store,
            products: Box::new(NoProducts),
            renderer,
            mapping: FieldMappingTable::default(),
            transforms: TransformRegistry::default(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_mapping(mut self, mapping: FieldMappingTable) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn with_products(mut self, products: Box<dyn ProductCatalog>) -> Self {
        self.products = products;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn renderer(&self) -> &HtmlRenderer {
        &self.renderer
    }

    /// Today → today + `window_years`.
    pub fn default_window(&self) -> SyncWindow {
        SyncWindow::from_today(self.options.window_years)
    }

    // -- field sync ----------------------------------------------------------

    /// Empty every attribute except the id; keep pinned subjects.
    pub fn reset_fields(&self, item: &mut ContentItem) {
        for value in item.attributes.values_mut() {
            *value = empty_like(value);
        }
        item.title.clear();
        item.subjects
            .retain(|s| self.options.pinned_subjects.contains(s));
        item.price.clear();
        item.availability.clear();
        item.arrangements.clear();
        item.dates.clear();
    }

    /// Steps 1–5 of a full field sync, in memory only.
    pub fn apply_all_fields(
        &self,
        item: &mut ContentItem,
        record: &UpstreamRecord,
        arrangements: &[UpstreamRecord],
    ) -> Result<(), SyncError> {
        let id = item.performance_id.clone();
        self.reset_fields(item);

        let ctx = TransformContext {
            renderer: &self.renderer,
            pinned_subjects: &self.options.pinned_subjects,
        };
        for (field, raw) in record {
            self.apply_field(&ctx, item, field, raw);
        }

        item.availability = self.renderer.render_availability_for(&id, record)?;
        item.arrangements = self
            .renderer
            .render_arrangements(arrangements, self.products.as_ref())?;

        validate_dates(item)
    }

    fn apply_field(
        &self,
        ctx: &TransformContext<'_>,
        item: &mut ContentItem,
        field: &str,
        raw: &Value,
    ) {
        let id = item.performance_id.clone();
        if field == ID_FIELD {
            return;
        }
        let attribute = match self.mapping.resolve(field) {
            Resolution::Mapped(attribute) => attribute,
            Resolution::Ignored => {
                tracing::debug!("performance {id}: field '{field}' is ignored");
                return;
            }
            Resolution::Unmapped => {
                tracing::debug!("performance {id}: field '{field}' is not mapped; dropped");
                return;
            }
        };

        let result = match self.transforms.transform_for(field) {
            Some(transform) => transform.apply(ctx, item, field, raw),
            None => Ok(TransformResult::NotApplicable),
        };
        match result {
            Ok(TransformResult::Assign(value)) => {
                item.attributes.insert(attribute.to_string(), value);
            }
            Ok(TransformResult::Handled) => {}
            Ok(TransformResult::NotApplicable) => {
                item.attributes.insert(attribute.to_string(), coerce(raw));
            }
            Err(e) => tracing::warn!("performance {id}: skipping field '{field}': {e}"),
        }
    }

    /// Full field sync of `item`, committed. Rolled back on any failure.
    pub fn update_all_fields(
        &mut self,
        item: &mut ContentItem,
        record: &UpstreamRecord,
        arrangements: &[UpstreamRecord],
    ) -> Result<ContentItem, SyncError> {
        let staged = self.stage_full_sync(item, record, arrangements, false);
        self.commit_or_abort(staged)
    }

    // -- operations ----------------------------------------------------------

    /// Fetch one performance and run a full field sync on its item.
    pub fn sync_one(&mut self, id: &PerformanceId) -> Result<ContentItem, SyncError> {
        let window = self.default_window();
        let record = self.api.performance_availability(id)?;
        let arrangements = self
            .api
            .arrangement_list_by_performance_id(id, window.from, window.until)?;
        let mut item = self
            .store
            .find_by_external_id(id)?
            .ok_or_else(|| SyncError::PerformanceNotFound { id: id.clone() })?;
        self.update_all_fields(&mut item, &record, &arrangements)
    }

    /// Sync every performance listed upstream for `window`.
    ///
    /// With `create_and_retire`, missing items are created and published and
    /// items no longer listed are made private. Without it, only items that
    /// already exist are updated.
    pub fn sync_list(
        &mut self,
        window: SyncWindow,
        create_and_retire: bool,
    ) -> Result<SyncReport, SyncError> {
        let upstream = self.api.performance_list_by_date(window.from, window.until)?;
        let mut report = SyncReport::new(Operation::SyncList);

        if create_and_retire {
            let (website, unreadable) = self.items_in_window(&window)?;
            let Reconciliation {
                upstream,
                mut website,
                plan,
            } = reconcile(upstream, website);
            report.excluded = plan.excluded;
            report.excluded.extend(unreadable);

            for (id, record) in upstream.iter() {
                if let Some(item) = website.remove(id) {
                    let result = self.update_from_list(item, record, &window, true);
                    report.push(id.clone(), ItemAction::Updated, result);
                    continue;
                }
                // Stored with a start date outside the window.
                match self.store.find_by_external_id(id) {
                    Ok(Some(item)) => {
                        let result = self.update_from_list(item, record, &window, true);
                        report.push(id.clone(), ItemAction::Updated, result);
                    }
                    Ok(None) => {
                        let result = self.create_performance(id, record, &window);
                        report.push(id.clone(), ItemAction::Created, result);
                    }
                    Err(e) => report.push(id.clone(), ItemAction::Created, Err(e.into())),
                }
            }
            for id in plan.to_retire {
                if let Some(item) = website.remove(&id) {
                    let result = self.retire_performance(item);
                    report.push(id, ItemAction::Retired, result);
                }
            }
        } else {
            let (upstream, excluded) = index_upstream(upstream);
            report.excluded = excluded;

            for (id, record) in upstream.iter() {
                match self.store.find_by_external_id(id) {
                    Ok(Some(item)) => {
                        let result = self.update_from_list(item, record, &window, false);
                        report.push(id.clone(), ItemAction::Updated, result);
                    }
                    Ok(None) => tracing::debug!("performance {id}: not on the website; skipped"),
                    Err(e) => report.push(id.clone(), ItemAction::Updated, Err(e.into())),
                }
            }
        }

        tracing::info!(
            "sync-list {window}: {} ok, {} failed, {} excluded",
            report.succeeded(),
            report.failed(),
            report.excluded.len()
        );
        Ok(report)
    }

    /// Refresh on-sale state of website items whose flag changed upstream.
    pub fn sync_availability(&mut self, window: SyncWindow) -> Result<SyncReport, SyncError> {
        let (website, unreadable) = self.items_in_window(&window)?;
        let upstream = self.api.performance_list_by_date(window.from, window.until)?;
        let rec = reconcile(upstream, website);

        let mut report = SyncReport::new(Operation::SyncAvailability);
        for id in rec.availability_updates() {
            let (Some(item), Some(record)) = (rec.website.get(&id), rec.upstream.get(&id)) else {
                continue;
            };
            let result = self.update_availability(item.clone(), record);
            report.push(id, ItemAction::AvailabilityUpdated, result);
        }
        report.excluded = rec.plan.excluded;
        report.excluded.extend(unreadable);

        tracing::info!(
            "sync-availability {window}: {} updated, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Make one item private.
    pub fn unpublish_performance(&mut self, id: &PerformanceId) -> Result<ContentItem, SyncError> {
        let item = self.find_required(id)?;
        self.retire_performance(item)
    }

    /// Remove one item from the content store.
    pub fn delete_performance(&mut self, id: &PerformanceId) -> Result<ContentItem, SyncError> {
        let item = self.find_required(id)?;
        if let Err(e) = self.store.delete(&item) {
            self.store.abort();
            return Err(e.into());
        }
        self.store.commit().map_err(|e| {
            self.store.abort();
            SyncError::from(e)
        })?;
        tracing::info!("performance {id}: deleted");
        Ok(item)
    }

    // -- internals -----------------------------------------------------------

    pub(crate) fn find_required(&self, id: &PerformanceId) -> Result<ContentItem, SyncError> {
        self.store
            .find_by_external_id(id)?
            .ok_or_else(|| SyncError::PerformanceNotFound { id: id.clone() })
    }

    /// Website items inside `window`. Unreadable content files come back as
    /// exclusions so one broken file never stops a batch.
    fn items_in_window(
        &self,
        window: &SyncWindow,
    ) -> Result<(Vec<ContentItem>, Vec<Excluded>), SyncError> {
        let scan = self.store.find_all_in_window(window.from)?;
        let items = scan
            .items
            .into_iter()
            .filter(|item| window.contains(item))
            .collect();
        let unreadable = scan
            .unreadable
            .into_iter()
            .map(|skipped| Excluded::WebsiteUnreadable {
                path: skipped.path,
                reason: skipped.reason,
            })
            .collect();
        Ok((items, unreadable))
    }

    fn stage_full_sync(
        &mut self,
        item: &mut ContentItem,
        record: &UpstreamRecord,
        arrangements: &[UpstreamRecord],
        publish: bool,
    ) -> Result<ContentItem, SyncError> {
        self.apply_all_fields(item, record, arrangements)?;
        self.store.save(item)?;
        if publish && !item.is_published() {
            self.store.transition(item, PublicationState::Published)?;
        }
        Ok(item.clone())
    }

    fn update_from_list(
        &mut self,
        mut item: ContentItem,
        record: &UpstreamRecord,
        window: &SyncWindow,
        republish: bool,
    ) -> Result<ContentItem, SyncError> {
        let arrangements = self.api.arrangement_list_by_performance_id(
            &item.performance_id,
            window.from,
            window.until,
        )?;
        let staged = self.stage_full_sync(&mut item, record, &arrangements, republish);
        self.commit_or_abort(staged)
    }

    fn create_performance(
        &mut self,
        id: &PerformanceId,
        record: &UpstreamRecord,
        window: &SyncWindow,
    ) -> Result<ContentItem, SyncError> {
        let arrangements =
            self.api
                .arrangement_list_by_performance_id(id, window.from, window.until)?;
        let title = record
            .get(TITLE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        let staged = self
            .store
            .create(&self.options.container, PORTAL_TYPE, id, title, "")
            .map_err(SyncError::from)
            .and_then(|mut item| self.stage_full_sync(&mut item, record, &arrangements, true));
        self.commit_or_abort(staged)
    }

    fn retire_performance(&mut self, mut item: ContentItem) -> Result<ContentItem, SyncError> {
        let staged = self
            .store
            .transition(&mut item, PublicationState::Private)
            .map(|()| item)
            .map_err(SyncError::from);
        self.commit_or_abort(staged)
    }

    fn update_availability(
        &mut self,
        mut item: ContentItem,
        record: &UpstreamRecord,
    ) -> Result<ContentItem, SyncError> {
        for field in [ONSALE_FIELD, STATUS_FIELD, STATUS_MESSAGE_FIELD] {
            let Resolution::Mapped(attribute) = self.mapping.resolve(field) else {
                continue;
            };
            let value = match record.get(field) {
                Some(raw) => coerce(raw),
                None => item
                    .attributes
                    .get(attribute)
                    .map(empty_like)
                    .unwrap_or(Value::Null),
            };
            item.attributes.insert(attribute.to_string(), value);
        }
        let staged = self
            .renderer
            .render_availability_for(&item.performance_id, record)
            .map_err(SyncError::from)
            .and_then(|html| {
                item.availability = html;
                self.store.save(&item)?;
                Ok(item)
            });
        self.commit_or_abort(staged)
    }

    /// Commit a staged change, or discard everything staged on error.
    ///
    /// Returns the item as stored after the commit.
    fn commit_or_abort(
        &mut self,
        staged: Result<ContentItem, SyncError>,
    ) -> Result<ContentItem, SyncError> {
        let item = match staged {
            Ok(item) => item,
            Err(e) => {
                self.store.abort();
                return Err(e);
            }
        };
        if let Err(e) = self.store.commit() {
            self.store.abort();
            return Err(e.into());
        }
        Ok(self
            .store
            .find_by_external_id(&item.performance_id)?
            .unwrap_or(item))
    }
}

/// Step 5 of a full field sync.
fn validate_dates(item: &mut ContentItem) -> Result<(), SyncError> {
    match (item.dates.start(), item.dates.end()) {
        (Some(start), None) => {
            item.dates.set_end(start);
            Ok(())
        }
        (Some(_), Some(_)) => Ok(()),
        (None, _) => Err(SyncError::Validation {
            id: item.performance_id.clone(),
            message: "performance has no start date".to_string(),
        }),
    }
}

/// The empty value of the same JSON type.
fn empty_like(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Bool(_) => Value::Bool(false),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => Value::Object(serde_json::Map::new()),
        Value::Number(_) | Value::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use chrono::NaiveDateTime;
    use serde_json::json;
    use twtsync_core::error::{ApiError, StoreError};
    use twtsync_core::store::{ItemScan, WriteResult};

    struct NoApi;

    impl TicketingApi for NoApi {
        fn performance_list_by_date(
            &self,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<UpstreamRecord>, ApiError> {
            Ok(Vec::new())
        }

        fn performance_availability(&self, id: &PerformanceId) -> Result<UpstreamRecord, ApiError> {
            Err(ApiError::PerformanceNotFound(id.clone()))
        }

        fn arrangement_list_by_performance_id(
            &self,
            _: &PerformanceId,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<UpstreamRecord>, ApiError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        items: BTreeMap<PerformanceId, ContentItem>,
        staged: Vec<ContentItem>,
        commits: usize,
    }

    impl ContentStore for MemoryStore {
        fn find_by_external_id(&self, id: &PerformanceId) -> Result<Option<ContentItem>, StoreError> {
            Ok(self.items.get(id).cloned())
        }

        fn find_all_in_window(&self, from: NaiveDate) -> Result<ItemScan, StoreError> {
            Ok(ItemScan {
                items: self
                    .items
                    .values()
                    .filter(|i| matches!(i.dates.start(), Some(s) if s.date() >= from))
                    .cloned()
                    .collect(),
                unreadable: Vec::new(),
            })
        }

        fn create(
            &mut self,
            container: &str,
            portal_type: &str,
            id: &PerformanceId,
            title: &str,
            description: &str,
        ) -> Result<ContentItem, StoreError> {
            Ok(ContentItem::new(container, portal_type, id.clone(), title, description))
        }

        fn save(&mut self, item: &ContentItem) -> Result<(), StoreError> {
            self.staged.push(item.clone());
            Ok(())
        }

        fn transition(
            &mut self,
            item: &mut ContentItem,
            state: PublicationState,
        ) -> Result<(), StoreError> {
            item.state = state;
            self.save(item)
        }

        fn delete(&mut self, item: &ContentItem) -> Result<(), StoreError> {
            self.items.remove(&item.performance_id);
            Ok(())
        }

        fn commit(&mut self) -> Result<Vec<WriteResult>, StoreError> {
            self.commits += 1;
            let mut results = Vec::new();
            for item in self.staged.drain(..) {
                results.push(WriteResult::Written { id: item.performance_id.clone() });
                self.items.insert(item.performance_id.clone(), item);
            }
            Ok(results)
        }

        fn abort(&mut self) {
            self.staged.clear();
        }
    }

    fn manager() -> SyncManager<NoApi, MemoryStore> {
        SyncManager::new(NoApi, MemoryStore::default(), HtmlRenderer::new().unwrap())
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn record(value: Value) -> UpstreamRecord {
        value.as_object().unwrap().clone()
    }

    fn item(id: &str) -> ContentItem {
        ContentItem::new("performances", PORTAL_TYPE, PerformanceId::from(id), "old", "")
    }

    #[test]
    fn unmapped_and_ignored_fields_write_nothing() {
        let m = manager();
        let mut it = item("1");
        m.apply_all_fields(
            &mut it,
            &record(json!({
                "id": "1", "startDateTime": "2024-05-01 20:00",
                "facilityCode": "GZ", "ticketBuyerNotes": "x", "season": 2024
            })),
            &[],
        )
        .unwrap();
        assert!(!it.attributes.contains_key("facilityCode"));
        assert!(!it.attributes.contains_key("ticketBuyerNotes"));
        assert!(!it.attributes.contains_key("performance_id"));
        assert_eq!(it.attributes["season"], json!("2024"));
    }

    #[test]
    fn lone_start_date_becomes_end_date() {
        let m = manager();
        let mut it = item("1");
        m.apply_all_fields(&mut it, &record(json!({ "startDateTime": "2024-05-01 20:00" })), &[])
            .unwrap();
        assert_eq!(it.dates.end(), Some(at("2024-05-01 20:00")));
    }

    #[test]
    fn missing_dates_fail_validation_and_nothing_is_committed() {
        let mut m = manager();
        let mut it = item("1");
        let err = m
            .update_all_fields(&mut it, &record(json!({ "title": "x" })), &[])
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert_eq!(m.store().commits, 0);
        assert!(m.store().staged.is_empty());
        assert!(m.store().items.is_empty());
    }

    #[test]
    fn end_only_fails_validation() {
        let m = manager();
        let mut it = item("1");
        let err = m
            .apply_all_fields(&mut it, &record(json!({ "endDateTime": "2024-05-01 22:00" })), &[])
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }

    #[test]
    fn reset_empties_attributes_but_keeps_pinned_subjects() {
        let m = manager();
        let mut it = item("1");
        it.subjects = vec!["featured".into(), "Opera".into()];
        it.attributes.insert("subtitle".into(), json!("old subtitle"));
        it.attributes.insert("onsale".into(), json!(true));
        it.price = "<ul></ul>".into();
        m.reset_fields(&mut it);
        assert_eq!(it.subjects, vec!["featured"]);
        assert_eq!(it.attributes["subtitle"], json!(""));
        assert_eq!(it.attributes["onsale"], json!(false));
        assert_eq!(it.price, "");
        assert_eq!(it.title, "");
        assert_eq!(it.performance_id.as_str(), "1");
    }

    #[test]
    fn malformed_field_is_skipped_not_fatal() {
        let m = manager();
        let mut it = item("1");
        m.apply_all_fields(
            &mut it,
            &record(json!({
                "startDateTime": "2024-05-01 20:00",
                "endDateTime": "tomorrow",
                "subtitle": "Een avond"
            })),
            &[],
        )
        .unwrap();
        assert_eq!(it.attributes["subtitle"], json!("Een avond"));
        assert_eq!(it.dates.end(), Some(at("2024-05-01 20:00")));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = SyncWindow::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        )
        .unwrap();
        let mut it = item("1");
        it.dates.set_start(at("2024-05-31 23:30"));
        assert!(window.contains(&it));
        it.dates.set_start(at("2024-06-01 00:00"));
        assert!(!window.contains(&it));
        assert!(SyncWindow::new(window.until, window.from).is_err());
    }

    #[test]
    fn sync_one_unknown_id_is_not_found() {
        let mut m = manager();
        let err = m.sync_one(&PerformanceId::from("404")).unwrap_err();
        assert!(matches!(err, SyncError::PerformanceNotFound { .. }));
    }
}
