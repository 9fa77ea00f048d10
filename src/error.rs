use crate::value::ValueKind;
use std::sync::{Arc, PoisonError};
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot convert column '{column}' ({source_kind:?}) into {target}: {reason}")]
    Mapping { column: String, source_kind: ValueKind, target: String, reason: String },

    #[error("schema mismatch: shape '{shape}' member '{member}' has no matching column")]
    SchemaMismatch { shape: &'static str, member: String },

    #[error("cannot compile mapping routine: {0}")]
    Compilation(String),

    #[error("dispatch configuration error in contract '{contract}', method '{method}': {reason}")]
    DispatchConfiguration { contract: String, method: String, reason: String },

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("join: {0}")]
    Join(#[from] JoinError),

    // A compilation outcome delivered to every caller that waited on the
    // same in-flight key. Display is the inner error verbatim.
    #[error("{0}")]
    Shared(Arc<MapError>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MapError {
    /// Peels the single-flight wrapper so callers can match on the cause.
    pub fn cause(&self) -> &MapError {
        match self {
            MapError::Shared(inner) => inner.cause(),
            other => other,
        }
    }
}

impl<T> From<PoisonError<T>> for MapError {
    fn from(e: PoisonError<T>) -> Self {
        MapError::Internal(format!("poisoned lock: {}", e))
    }
}
