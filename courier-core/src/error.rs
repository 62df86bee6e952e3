//! Error types for courier-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{EntityId, EntityTypeId};

/// Errors raised by repository, codec and watermark collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure in a codec or a persisted store.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raw bytes did not decode into a snapshot document.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Storage refused to persist a record.
    #[error("storage rejected {entity_type} record: {reason}")]
    Rejected {
        entity_type: EntityTypeId,
        reason: String,
    },

    /// An entity expected to exist was not found by id.
    #[error("{entity_type} {id} not found")]
    NotFound {
        entity_type: EntityTypeId,
        id: EntityId,
    },
}

/// Errors from loading `~/.courier/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.courier/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
