//! # twtsync-sync
//!
//! Field mapping, value transforms, reconciliation and the sync manager that
//! mirrors ticketing API performances into the content store.
//!
//! Call [`pipeline::run`] with a [`SyncRequest`] for a one-shot trigger, or
//! build a [`SyncManager`] directly to plug in other collaborators.

pub mod error;
pub mod manager;
pub mod mapping;
pub mod pipeline;
pub mod preview;
pub mod reconcile;
pub mod transform;

pub use error::SyncError;
pub use manager::{
    ItemAction, ItemOutcome, Operation, SyncManager, SyncOptions, SyncReport, SyncWindow,
};
pub use mapping::{FieldMappingTable, MappingError, MappingTarget, Resolution};
pub use pipeline::{LiveManager, SyncRequest};
pub use preview::PerformancePreview;
pub use reconcile::{reconcile, Excluded, Reconciliation, ReconciliationPlan};
pub use transform::{FieldTransform, TransformRegistry, TransformResult};
