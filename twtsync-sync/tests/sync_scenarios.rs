use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use tempfile::TempDir;

use twtsync_core::error::ApiError;
use twtsync_core::ports::{ContentStore, TicketingApi};
use twtsync_core::store::{FileContentStore, FileProductCatalog};
use twtsync_core::types::{ContentItem, PerformanceId, PublicationState, UpstreamRecord};
use twtsync_renderer::HtmlRenderer;
use twtsync_sync::pipeline::{run_with, SyncRequest};
use twtsync_sync::{Excluded, ItemAction, SyncError, SyncManager, SyncWindow};

// ---------------------------------------------------------------------------
// Stub API
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubApi {
    list: Vec<UpstreamRecord>,
    details: HashMap<String, UpstreamRecord>,
    arrangements: HashMap<String, Vec<UpstreamRecord>>,
    broken_arrangements: HashSet<String>,
    list_fails: bool,
    calls: RefCell<Vec<String>>,
}

impl TicketingApi for StubApi {
    fn performance_list_by_date(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError> {
        self.calls.borrow_mut().push(format!("list {from} {until}"));
        if self.list_fails {
            return Err(ApiError::Request("connection reset".into()));
        }
        Ok(self.list.clone())
    }

    fn performance_availability(&self, id: &PerformanceId) -> Result<UpstreamRecord, ApiError> {
        self.calls.borrow_mut().push(format!("detail {id}"));
        self.details
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ApiError::PerformanceNotFound(id.clone()))
    }

    fn arrangement_list_by_performance_id(
        &self,
        id: &PerformanceId,
        _from: NaiveDate,
        _until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError> {
        self.calls.borrow_mut().push(format!("arrangements {id}"));
        if self.broken_arrangements.contains(id.as_str()) {
            return Err(ApiError::ResponseHandling("arrangements is not a list".into()));
        }
        Ok(self.arrangements.get(id.as_str()).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(value: Value) -> UpstreamRecord {
    value.as_object().expect("object").clone()
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("timestamp")
}

fn window_2024() -> SyncWindow {
    SyncWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    )
    .unwrap()
}

fn performance(id: &str, title: &str, start: &str) -> UpstreamRecord {
    record(json!({
        "id": id,
        "title": title,
        "startDateTime": start,
        "onsale": true,
        "performanceStatus": "ONSALE",
        "facility": "Grote Zaal",
        "code": "ignored"
    }))
}

fn seed(home: &TempDir, id: &str, start: &str, onsale: bool, published: bool) {
    let mut store = FileContentStore::open_at(home.path());
    let mut item = store
        .create("performances", "Performance", &id.into(), &format!("old {id}"), "")
        .expect("create");
    item.dates.set_start(at(start));
    item.attributes.insert("onsale".into(), json!(onsale));
    store.save(&item).expect("save");
    if published {
        store
            .transition(&mut item, PublicationState::Published)
            .expect("publish");
    }
    store.commit().expect("commit");
}

fn manager(home: &TempDir, api: StubApi) -> SyncManager<StubApi, FileContentStore> {
    let _ = env_logger::builder().is_test(true).try_init();
    let renderer =
        HtmlRenderer::with_options(None, "https://tickets.example.nl/shop/{id}").expect("renderer");
    SyncManager::new(api, FileContentStore::open_at(home.path()), renderer)
        .with_products(Box::new(FileProductCatalog::open_at(home.path())))
}

fn stored(m: &SyncManager<StubApi, FileContentStore>, id: &str) -> Option<ContentItem> {
    m.store().find_by_external_id(&id.into()).expect("find")
}

// ---------------------------------------------------------------------------
// sync-list
// ---------------------------------------------------------------------------

#[test]
fn list_sync_creates_updates_and_retires() {
    let home = TempDir::new().unwrap();
    seed(&home, "B", "2024-03-01 20:00", false, true);
    seed(&home, "C", "2024-07-01 20:00", false, true);

    let api = StubApi {
        list: vec![
            performance("A", "Nieuw stuk", "2024-05-01 20:15"),
            performance("B", "Bestaand stuk", "2024-03-01 20:00"),
        ],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_list(window_2024(), true).expect("sync-list");

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.ids_with(ItemAction::Created), vec![&PerformanceId::from("A")]);
    assert_eq!(report.ids_with(ItemAction::Updated), vec![&PerformanceId::from("B")]);
    assert_eq!(report.ids_with(ItemAction::Retired), vec![&PerformanceId::from("C")]);

    let a = stored(&m, "A").expect("A created");
    assert_eq!(a.title, "Nieuw stuk");
    assert_eq!(a.container, "performances");
    assert_eq!(a.portal_type, "Performance");
    assert!(a.is_published());
    assert_eq!(a.attributes["location"], json!("Grote Zaal"));
    assert!(!a.attributes.contains_key("code"));

    let b = stored(&m, "B").expect("B kept");
    assert_eq!(b.title, "Bestaand stuk");
    assert!(b.onsale());
    assert!(b.is_published());

    let c = stored(&m, "C").expect("C never deleted");
    assert_eq!(c.state, PublicationState::Private);
}

#[test]
fn list_sync_republishes_private_matches() {
    let home = TempDir::new().unwrap();
    seed(&home, "B", "2024-03-01 20:00", false, false);

    let api = StubApi {
        list: vec![performance("B", "Terug", "2024-03-01 20:00")],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    m.sync_list(window_2024(), true).unwrap();
    assert!(stored(&m, "B").unwrap().is_published());
}

#[test]
fn list_sync_updates_item_stored_outside_the_window() {
    let home = TempDir::new().unwrap();
    seed(&home, "A", "2023-06-01 20:00", false, false);

    let api = StubApi {
        list: vec![performance("A", "Verplaatst", "2024-03-01 20:00")],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_list(window_2024(), true).expect("sync-list");

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.ids_with(ItemAction::Updated), vec![&PerformanceId::from("A")]);
    assert!(report.ids_with(ItemAction::Created).is_empty());

    let a = stored(&m, "A").expect("A kept");
    assert_eq!(a.title, "Verplaatst");
    assert_eq!(a.dates.start(), Some(at("2024-03-01 20:00")));
    assert!(a.is_published());
}

#[test]
fn corrupt_content_file_is_excluded_not_fatal() {
    let home = TempDir::new().unwrap();
    seed(&home, "100", "2024-06-01 20:00", false, true);
    std::fs::write(home.path().join(".twtsync/content/999.yaml"), "not: [valid").unwrap();

    let api = StubApi {
        list: vec![performance("100", "Carmen", "2024-06-01 20:00")],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);

    let report = m.sync_availability(window_2024()).expect("availability runs");
    assert_eq!(
        report.ids_with(ItemAction::AvailabilityUpdated),
        vec![&PerformanceId::from("100")]
    );
    assert!(matches!(
        report.excluded.as_slice(),
        [Excluded::WebsiteUnreadable { path, .. }] if path.ends_with("999.yaml")
    ));
    assert!(stored(&m, "100").unwrap().onsale());

    let report = m.sync_list(window_2024(), true).expect("list runs");
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.ids_with(ItemAction::Updated), vec![&PerformanceId::from("100")]);
    assert_eq!(stored(&m, "100").unwrap().title, "Carmen");
    assert!(report
        .excluded
        .iter()
        .any(|e| matches!(e, Excluded::WebsiteUnreadable { .. })));
}

#[test]
fn one_failing_item_does_not_abort_the_batch() {
    let home = TempDir::new().unwrap();
    seed(&home, "B", "2024-03-01 20:00", false, true);
    seed(&home, "D", "2024-04-01 20:00", false, true);

    let mut no_dates = performance("A", "Zonder datum", "");
    no_dates.remove("startDateTime");
    let api = StubApi {
        list: vec![
            no_dates,
            performance("B", "Goed", "2024-03-01 20:00"),
            performance("D", "Kapotte arrangementen", "2024-04-01 20:00"),
        ],
        broken_arrangements: ["D".to_string()].into_iter().collect(),
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_list(window_2024(), true).expect("batch runs to completion");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);
    assert!(matches!(
        report.outcome(&"A".into()).unwrap().result,
        Err(SyncError::Validation { .. })
    ));
    assert!(matches!(
        report.outcome(&"D".into()).unwrap().result,
        Err(SyncError::ResponseHandling(_))
    ));
    assert!(stored(&m, "A").is_none(), "failed create must be rolled back");
    assert_eq!(stored(&m, "B").unwrap().title, "Goed");
    assert_eq!(stored(&m, "D").unwrap().title, "old D");
}

#[test]
fn update_only_list_sync_skips_unknown_ids() {
    let home = TempDir::new().unwrap();
    seed(&home, "B", "2024-03-01 20:00", false, true);
    seed(&home, "C", "2024-07-01 20:00", false, true);

    let api = StubApi {
        list: vec![
            performance("X", "Onbekend", "2024-05-01 20:00"),
            performance("B", "Bijgewerkt", "2024-03-01 20:00"),
        ],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_list(window_2024(), false).unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].id.as_str(), "B");
    assert!(stored(&m, "X").is_none());
    assert!(stored(&m, "C").unwrap().is_published(), "no retire without create mode");
}

#[test]
fn upstream_records_without_id_are_excluded() {
    let home = TempDir::new().unwrap();
    let api = StubApi {
        list: vec![
            record(json!({ "title": "no id", "startDateTime": "2024-05-01 20:00" })),
            performance("A", "Met id", "2024-05-01 20:00"),
        ],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_list(window_2024(), true).unwrap();
    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(m.store().list_all().unwrap().len(), 1);
}

#[test]
fn list_fetch_failure_is_returned() {
    let home = TempDir::new().unwrap();
    let api = StubApi {
        list_fails: true,
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    assert!(matches!(
        m.sync_list(window_2024(), true),
        Err(SyncError::Request(_))
    ));
}

// ---------------------------------------------------------------------------
// sync-availability
// ---------------------------------------------------------------------------

#[test]
fn availability_sync_updates_changed_items_only() {
    let home = TempDir::new().unwrap();
    seed(&home, "100", "2024-06-01 20:00", false, true);
    seed(&home, "200", "2024-06-02 20:00", false, true);

    let api = StubApi {
        list: vec![
            record(json!({ "id": "100", "onsale": true, "performanceStatus": "ONSALE" })),
            record(json!({ "id": "200", "onsale": false, "performanceStatus": "SOLDOUT" })),
        ],
        ..StubApi::default()
    };
    let mut m = manager(&home, api);
    let report = m.sync_availability(window_2024()).unwrap();

    assert_eq!(
        report.ids_with(ItemAction::AvailabilityUpdated),
        vec![&PerformanceId::from("100")]
    );
    let hundred = stored(&m, "100").unwrap();
    assert!(hundred.onsale());
    assert_eq!(hundred.attributes["performanceStatus"], json!("ONSALE"));
    assert!(hundred
        .availability
        .contains("href=\"https://tickets.example.nl/shop/100\""));
    assert_eq!(hundred.title, "old 100", "availability sync leaves other fields alone");

    let sold_out = record(json!({ "id": "200", "onsale": false, "performanceStatus": "SOLDOUT" }));
    let html = m
        .renderer()
        .render_availability_for(&"200".into(), &sold_out)
        .unwrap();
    assert!(html.contains("disabled=\"disabled\""));
    assert!(html.contains("Sold out"));
    assert_eq!(stored(&m, "200").unwrap().availability, "", "unchanged item is not written");
}

// ---------------------------------------------------------------------------
// sync-one, unpublish, delete, preview
// ---------------------------------------------------------------------------

fn detail_api() -> StubApi {
    let mut details = HashMap::new();
    details.insert(
        "1409".to_string(),
        record(json!({
            "id": 1409,
            "title": "De Notenkraker",
            "eventGenre": ["Dans", "Klassiek"],
            "startDateTime": "2024-12-20 19:30",
            "onsale": false,
            "performanceStatus": "SOLDOUT",
            "percentageTaken": 100,
            "ranks": [{
                "description": "Rang 1",
                "prices": [
                    { "price": 42.5, "currency": "EUR", "priceTypeDescription": "Volwassene" },
                    { "price": 25, "currency": "EUR", "priceTypeDescription": "Kind", "isDefault": true }
                ]
            }]
        })),
    );
    let mut arrangements = HashMap::new();
    arrangements.insert(
        "1409".to_string(),
        vec![record(json!({ "id": 9, "title": "Diner", "productId": "p-1", "price": 35 }))],
    );
    StubApi {
        details,
        arrangements,
        ..StubApi::default()
    }
}

#[test]
fn sync_one_runs_a_full_field_sync() {
    let home = TempDir::new().unwrap();
    seed(&home, "1409", "2024-01-01 10:00", true, true);
    std::fs::create_dir_all(home.path().join(".twtsync/products")).unwrap();
    std::fs::write(
        home.path().join(".twtsync/products/p-1.yaml"),
        "image_url: https://cdn.example.nl/diner.jpg\ndescription: Drie gangen\n",
    )
    .unwrap();

    let mut m = manager(&home, detail_api());
    {
        let mut item = stored(&m, "1409").unwrap();
        item.subjects = vec!["featured".into(), "Opera".into()];
        m.store_mut().save(&item).unwrap();
        m.store_mut().commit().unwrap();
    }

    let item = m.sync_one(&"1409".into()).expect("sync-one");

    assert_eq!(item.title, "De Notenkraker");
    assert_eq!(item.attributes["performance_title"], json!("De Notenkraker"));
    assert_eq!(item.subjects, vec!["featured", "Dans", "Klassiek"]);
    assert_eq!(item.dates.start(), Some(at("2024-12-20 19:30")));
    assert_eq!(item.dates.end(), Some(at("2024-12-20 19:30")));
    assert_eq!(item.attributes["percentageTaken"], json!("100"));
    assert!(!item.onsale());
    assert!(item.price.find("Kind").unwrap() < item.price.find("Volwassene").unwrap());
    assert!(item.availability.contains("Sold out"));
    assert!(item.arrangements.contains("https://cdn.example.nl/diner.jpg"));
    assert!(item.arrangements.contains("Drie gangen"));
    assert!(item.modified_at.is_some());
}

#[test]
fn repeated_sync_one_does_not_rewrite() {
    let home = TempDir::new().unwrap();
    seed(&home, "1409", "2024-01-01 10:00", true, true);
    let mut m = manager(&home, detail_api());

    let first = m.sync_one(&"1409".into()).unwrap();
    let second = m.sync_one(&"1409".into()).unwrap();
    assert_eq!(first.modified_at, second.modified_at);
}

#[test]
fn sync_one_for_unknown_item_is_not_found() {
    let home = TempDir::new().unwrap();
    let mut m = manager(&home, detail_api());
    assert!(matches!(
        m.sync_one(&"1409".into()),
        Err(SyncError::PerformanceNotFound { .. })
    ));
    assert!(matches!(
        m.sync_one(&"7".into()),
        Err(SyncError::PerformanceNotFound { .. })
    ));
}

#[test]
fn pipeline_reports_item_failures_without_erroring() {
    let home = TempDir::new().unwrap();
    let mut m = manager(&home, detail_api());
    let request = SyncRequest::One("1409".into());
    let report = run_with(&mut m, request.clone()).expect("not fatal");
    assert_eq!(report.failed(), 1);
    assert_eq!(
        request.status_message(&report),
        "Performance ID 1409 failed to sync with the api."
    );
}

#[test]
fn unpublish_and_delete() {
    let home = TempDir::new().unwrap();
    seed(&home, "5", "2024-02-01 20:00", false, true);
    let mut m = manager(&home, StubApi::default());

    let item = m.unpublish_performance(&"5".into()).unwrap();
    assert_eq!(item.state, PublicationState::Private);

    m.delete_performance(&"5".into()).unwrap();
    assert!(stored(&m, "5").is_none());
    assert!(!home.path().join(".twtsync/content/5.yaml").exists());

    assert!(matches!(
        m.delete_performance(&"5".into()),
        Err(SyncError::PerformanceNotFound { .. })
    ));
}

#[test]
fn preview_shows_changes_without_writing() {
    let home = TempDir::new().unwrap();
    seed(&home, "1409", "2024-01-01 10:00", true, true);
    let m = manager(&home, detail_api());

    let preview = m.preview_performance(&"1409".into()).unwrap();
    assert!(preview.unified_diff.contains("-title: old 1409"));
    assert!(preview.unified_diff.contains("+title: De Notenkraker"));
    assert_eq!(stored(&m, "1409").unwrap().title, "old 1409");
}
