//! Error types for courier-import.

use std::path::PathBuf;

use thiserror::Error;

use courier_core::{EntityTypeId, StoreError};

/// All errors that can arise while preparing or running an import.
///
/// Only [`ImportError::Configuration`] and scan failures abort a run; every
/// other variant is caught at the file boundary and reported as a per-file
/// diagnostic.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No source folder could be resolved.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot bytes did not decode into a document.
    #[error("unable to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// No capability entry exists for the entity type.
    #[error("unknown entity type '{0}'")]
    UnknownEntityType(EntityTypeId),

    /// A field required to process the snapshot is missing.
    #[error("snapshot {path} has no {field}")]
    MissingField { path: PathBuf, field: String },

    /// Storage or another collaborator failed (including rejected saves).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization error (diff rendering, suspended batches).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A suspended batch blob could not be resumed.
    #[error("cannot resume batch: {0}")]
    Resume(String),
}

/// Convenience constructor for [`ImportError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ImportError {
    ImportError::Io {
        path: path.into(),
        source,
    }
}
