//! Record reconciler: classifies upstream records against website items.
//!
//! Both sides are keyed by the canonical [`PerformanceId`]. Records without a
//! readable id are excluded from every class, never merged under a default key.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde_json::Value;

use twtsync_core::types::{ContentItem, PerformanceId, UpstreamRecord, ONSALE_FIELD};

/// A record or item left out of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Excluded {
    /// Upstream record at this list position has no readable id.
    UpstreamWithoutId { index: usize },
    /// A later upstream record repeating an id; the first occurrence wins.
    UpstreamDuplicate { index: usize, id: PerformanceId },
    /// Website item at this position has a blank id.
    WebsiteWithoutId { index: usize },
    /// A later website item repeating an id; the first occurrence wins.
    WebsiteDuplicate { index: usize, id: PerformanceId },
    /// Content file that could not be read.
    WebsiteUnreadable { path: PathBuf, reason: String },
}

/// Ids classified by a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Upstream only, in upstream order.
    pub to_create: Vec<PerformanceId>,
    /// On both sides, in upstream order.
    pub to_update: Vec<PerformanceId>,
    /// Website only, in id order.
    pub to_retire: Vec<PerformanceId>,
    pub excluded: Vec<Excluded>,
}

/// Keyed upstream records, first occurrence per id, upstream order kept.
#[derive(Debug, Clone, Default)]
pub struct UpstreamIndex {
    records: Vec<(PerformanceId, UpstreamRecord)>,
    positions: HashMap<PerformanceId, usize>,
}

impl UpstreamIndex {
    fn push(&mut self, id: PerformanceId, record: UpstreamRecord) {
        self.positions.insert(id.clone(), self.records.len());
        self.records.push((id, record));
    }


    pub fn iter(&self) -> impl Iterator<Item = (&PerformanceId, &UpstreamRecord)> {
        self.records.iter().map(|(id, r)| (id, r))
    }

    pub fn get(&self, id: &PerformanceId) -> Option<&UpstreamRecord> {
        self.positions.get(id).map(|&at| &self.records[at].1)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PerformanceId> {
        self.records.iter().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Key upstream records by id. Unreadable ids and repeats are reported.
pub fn index_upstream(records: Vec<UpstreamRecord>) -> (UpstreamIndex, Vec<Excluded>) {
    let mut index = UpstreamIndex::default();
    let mut excluded = Vec::new();

    for (position, record) in records.into_iter().enumerate() {
        match PerformanceId::from_record(&record) {
            None => {
                tracing::warn!("upstream record #{position} has no readable id; excluded");
                excluded.push(Excluded::UpstreamWithoutId { index: position });
            }
            Some(id) if index.positions.contains_key(&id) => {
                tracing::warn!("performance {id}: repeated in upstream list at #{position}; excluded");
                excluded.push(Excluded::UpstreamDuplicate { index: position, id });
            }
            Some(id) => index.push(id, record),
        }
    }
    (index, excluded)
}

/// Key website items by id. Blank ids and repeats are reported.
pub fn index_website(items: Vec<ContentItem>) -> (BTreeMap<PerformanceId, ContentItem>, Vec<Excluded>) {
    let mut keyed = BTreeMap::new();
    let mut excluded = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        match item.external_id().cloned() {
            Some(id) if keyed.contains_key(&id) => {
                tracing::warn!("performance {id}: repeated on the website at #{position}; excluded");
                excluded.push(Excluded::WebsiteDuplicate { index: position, id });
            }
            Some(id) => {
                keyed.insert(id, item);
            }
            None => {
                tracing::warn!("website item #{position} has no performance id; excluded");
                excluded.push(Excluded::WebsiteWithoutId { index: position });
            }
        }
    }
    (keyed, excluded)
}

/// Both keyed sides plus the resulting plan.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub upstream: UpstreamIndex,
    pub website: BTreeMap<PerformanceId, ContentItem>,
    pub plan: ReconciliationPlan,
}

pub fn reconcile(upstream: Vec<UpstreamRecord>, website: Vec<ContentItem>) -> Reconciliation {
    let (upstream, mut excluded) = index_upstream(upstream);
    let (website, website_excluded) = index_website(website);
    excluded.extend(website_excluded);

    let mut plan = ReconciliationPlan {
        excluded,
        ..ReconciliationPlan::default()
    };
    for id in upstream.ids() {
        if website.contains_key(id) {
            plan.to_update.push(id.clone());
        } else {
            plan.to_create.push(id.clone());
        }
    }
    let upstream_ids: HashSet<&PerformanceId> = upstream.ids().collect();
    plan.to_retire = website
        .keys()
        .filter(|id| !upstream_ids.contains(id))
        .cloned()
        .collect();

    Reconciliation {
        upstream,
        website,
        plan,
    }
}

/// Whether the fresh on-sale flag differs from the stored one.
///
/// A record without a boolean `onsale` counts as unchanged.
pub fn availability_changed(item: &ContentItem, record: &UpstreamRecord) -> bool {
    match record.get(ONSALE_FIELD) {
        Some(Value::Bool(onsale)) => *onsale != item.onsale(),
        _ => false,
    }
}

impl Reconciliation {
    /// Matched ids whose availability changed, in upstream order.
    pub fn availability_updates(&self) -> Vec<PerformanceId> {
        self.plan
            .to_update
            .iter()
            .filter(|id| match (self.website.get(id), self.upstream.get(id)) {
                (Some(item), Some(record)) => availability_changed(item, record),
                _ => false,
            })
            .cloned()
            .collect()
    }
}
