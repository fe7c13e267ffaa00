//! Collaborator seams: the ticketing API, the content store and the product
//! catalog. The sync engine only ever talks to these traits.

use chrono::NaiveDate;

use crate::error::{ApiError, StoreError};
use crate::store::{ItemScan, WriteResult};
use crate::types::{ContentItem, PerformanceId, Product, PublicationState, UpstreamRecord};

/// Read access to the ticketing provider.
pub trait TicketingApi {
    /// All performances scheduled between `date_from` and `date_until`, in
    /// the provider's response order.
    fn performance_list_by_date(
        &self,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError>;

    /// Full availability detail for one performance.
    fn performance_availability(&self, id: &PerformanceId) -> Result<UpstreamRecord, ApiError>;

    /// Arrangements bundled with a performance inside the window.
    fn arrangement_list_by_performance_id(
        &self,
        id: &PerformanceId,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<UpstreamRecord>, ApiError>;
}

/// Transactional access to the website's content tree.
///
/// Mutations are staged and only become durable on [`ContentStore::commit`].
pub trait ContentStore {
    /// Find the item for `id`, including staged changes.
    fn find_by_external_id(&self, id: &PerformanceId) -> Result<Option<ContentItem>, StoreError>;

    /// Items whose start date is on or after `date_from`.
    ///
    /// Items that cannot be read are listed in [`ItemScan::unreadable`]
    /// instead of failing the whole scan.
    fn find_all_in_window(&self, date_from: NaiveDate) -> Result<ItemScan, StoreError>;

    /// Create and stage a new private item.
    fn create(
        &mut self,
        container: &str,
        portal_type: &str,
        id: &PerformanceId,
        title: &str,
        description: &str,
    ) -> Result<ContentItem, StoreError>;

    /// Stage an in-memory mutation of `item`.
    fn save(&mut self, item: &ContentItem) -> Result<(), StoreError>;

    /// Move `item` to `state` and stage it.
    fn transition(
        &mut self,
        item: &mut ContentItem,
        state: PublicationState,
    ) -> Result<(), StoreError>;

    /// Stage removal of `item`.
    fn delete(&mut self, item: &ContentItem) -> Result<(), StoreError>;

    /// Persist all staged changes.
    fn commit(&mut self) -> Result<Vec<WriteResult>, StoreError>;

    /// Discard all staged changes.
    fn abort(&mut self);
}

/// Optional lookup of add-on product details for arrangement cards.
pub trait ProductCatalog {
    fn product(&self, product_id: &str) -> Option<Product>;
}

/// Catalog that knows no products.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProducts;

impl ProductCatalog for NoProducts {
    fn product(&self, _product_id: &str) -> Option<Product> {
        None
    }
}
