//! Error types for the inventory pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while collecting, enriching or writing inventory reports
#[derive(Debug, Error)]
pub enum InventoryError {
    /// An upstream call failed. Not retried; aborts the current cluster.
    #[error("upstream call {operation} failed: {message}")]
    Upstream { operation: String, message: String },

    /// A field every record of this kind must carry was missing
    #[error("{entity} is missing required field {field}")]
    IncompleteRecord { entity: String, field: String },

    /// A quantity could not be read as a non-negative integer
    #[error("{entity} has invalid {field} value {value:?}")]
    InvalidQuantity {
        entity: String,
        field: String,
        value: String,
    },

    /// CSV rendering failed
    #[error("failed to render report: {0}")]
    Report(#[from] csv::Error),

    /// Filesystem access failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline was assembled without a required collaborator or setting
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InventoryError {
    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn incomplete(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::IncompleteRecord {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for data-shape violations that skip a single record instead of
    /// aborting the cluster
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            InventoryError::IncompleteRecord { .. } | InventoryError::InvalidQuantity { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
