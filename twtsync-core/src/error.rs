//! Error types for twtsync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PerformanceId;

/// Errors from loading, saving, or validating the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("settings not found at {path}; run `twtsync init` first")]
    NotFound { path: PathBuf },

    #[error("details for the environment '{0}' are not available in the API settings")]
    MissingEnvironment(String),

    #[error("required URL for the environment '{0}' cannot be found")]
    MissingUrl(String),

    #[error("URL '{0}' is not valid")]
    InvalidUrl(String),

    #[error("required API key for the environment '{0}' cannot be found")]
    MissingApiKey(String),

    #[error("API key '{0}' is not valid")]
    InvalidApiKey(String),

    #[error("API mode '{0}' is not valid; expected: test, prod")]
    InvalidMode(String),

    #[error("required API mode cannot be found in the settings")]
    MissingMode,
}

/// Errors from the file-backed content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse content item at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("hash store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("a content item for performance {id} already exists")]
    AlreadyExists { id: PerformanceId },

    #[error("no content item for performance {id}")]
    NotFound { id: PerformanceId },

    #[error("performance id '{id}' cannot be used as a content key")]
    InvalidId { id: PerformanceId },
}

/// Errors surfaced by a [`crate::ports::TicketingApi`] implementation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad configuration; fatal before any request is made.
    #[error("request setup error: {0}")]
    RequestSetup(String),

    /// Transport failure.
    #[error("unable to communicate with the ticketing API: {0}")]
    Request(String),

    /// Unparseable or malformed payload.
    #[error("response handling error: {0}")]
    ResponseHandling(String),

    #[error("performance {0} not found")]
    PerformanceNotFound(PerformanceId),
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        ApiError::RequestSetup(err.to_string())
    }
}

pub(crate) fn settings_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn store_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
