//! Dry-run unified diff support for `twtsync diff`.

use similar::TextDiff;

use twtsync_core::ports::{ContentStore, TicketingApi};
use twtsync_core::types::{ContentItem, PerformanceId};

use crate::{SyncError, SyncManager};

/// What a full field sync would change on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformancePreview {
    pub id: PerformanceId,
    /// Empty when the sync would change nothing.
    pub unified_diff: String,
}

impl PerformancePreview {
    pub fn is_unchanged(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

impl<A: TicketingApi, S: ContentStore> SyncManager<A, S> {
    /// Run a full field sync in memory and diff it against the stored item.
    ///
    /// Nothing is staged or committed.
    pub fn preview_performance(&self, id: &PerformanceId) -> Result<PerformancePreview, SyncError> {
        let window = self.default_window();
        let record = self.api().performance_availability(id)?;
        let arrangements = self
            .api()
            .arrangement_list_by_performance_id(id, window.from, window.until)?;
        let current = self.find_required(id)?;

        let mut updated = current.clone();
        self.apply_all_fields(&mut updated, &record, &arrangements)?;

        let old = item_yaml(&current)?;
        let new = item_yaml(&updated)?;
        if old == new {
            return Ok(PerformancePreview {
                id: id.clone(),
                unified_diff: String::new(),
            });
        }

        let old_header = format!("a/{id}.yaml");
        let new_header = format!("b/{id}.yaml");
        let unified_diff = TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();

        Ok(PerformancePreview {
            id: id.clone(),
            unified_diff,
        })
    }
}

/// YAML form of an item without its write stamp.
fn item_yaml(item: &ContentItem) -> Result<String, SyncError> {
    let mut unstamped = item.clone();
    unstamped.modified_at = None;
    serde_yaml::to_string(&unstamped).map_err(|e| SyncError::Unknown(e.to_string()))
}
