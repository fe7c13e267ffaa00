//! Error types for twtsync-sync.

use thiserror::Error;

use twtsync_core::error::{ApiError, SettingsError, StoreError};
use twtsync_core::types::PerformanceId;
use twtsync_renderer::RenderError;

use crate::mapping::MappingError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad configuration. Fatal: no sync work is started.
    #[error("request setup error: {0}")]
    RequestSetup(String),

    /// Transport failure talking to the ticketing API.
    #[error("request error: {0}")]
    Request(String),

    /// Unparseable or malformed API payload.
    #[error("response handling error: {0}")]
    ResponseHandling(String),

    #[error("performance {id} not found")]
    PerformanceNotFound { id: PerformanceId },

    /// Date coherence check failed; the item was not committed.
    #[error("performance {id} failed validation: {message}")]
    Validation { id: PerformanceId, message: String },

    #[error("unexpected error: {0}")]
    Unknown(String),

    /// An error from the content store.
    #[error("content store error: {0}")]
    Store(#[from] StoreError),

    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

impl SyncError {
    /// Setup errors abort a whole trigger instead of a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::RequestSetup(_))
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RequestSetup(m) => SyncError::RequestSetup(m),
            ApiError::Request(m) => SyncError::Request(m),
            ApiError::ResponseHandling(m) => SyncError::ResponseHandling(m),
            ApiError::PerformanceNotFound(id) => SyncError::PerformanceNotFound { id },
        }
    }
}

impl From<SettingsError> for SyncError {
    fn from(err: SettingsError) -> Self {
        SyncError::RequestSetup(err.to_string())
    }
}

impl From<MappingError> for SyncError {
    fn from(err: MappingError) -> Self {
        SyncError::RequestSetup(err.to_string())
    }
}
