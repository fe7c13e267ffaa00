//! twtsync core library: domain types, collaborator traits, settings, and the
//! file-backed content store.
//!
//! - [`types`]: performance ids, content items, date ranges
//! - [`ports`]: [`TicketingApi`], [`ContentStore`], [`ProductCatalog`]
//! - [`settings`]: load / save / validate `settings.yaml`
//! - [`store`]: [`FileContentStore`] and [`FileProductCatalog`]
//! - [`error`]: [`SettingsError`], [`StoreError`], [`ApiError`]

pub mod error;
pub mod hash_store;
pub mod ports;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{ApiError, SettingsError, StoreError};
pub use ports::{ContentStore, NoProducts, ProductCatalog, TicketingApi};
pub use settings::{ApiMode, ApiSettings, Settings};
pub use store::{FileContentStore, FileProductCatalog, ItemScan, UnreadableItem, WriteResult};
pub use types::{
    ContentItem, DateRange, PerformanceId, Product, PublicationState, UpstreamRecord,
};
