//! Catalog ingestion errors.

use permgate_core::CodedError;
use thiserror::Error;

/// First violation found while ingesting a catalog definition.
///
/// All of these indicate deployment/configuration error: they are raised
/// once, at load time, map to a 500 status, and are never retried.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidStructure(String),

    #[error("service [{service}] has no numeric service index")]
    MissingServiceIndex { service: String },

    #[error("service [{service}] has an index greater than the number of services")]
    ServiceIndexOutOfRange {
        service: String,
        index: usize,
        count: usize,
    },

    #[error("service index [{index}] exists twice (extra time in [{service}])")]
    DuplicateServiceIndex { service: String, index: usize },

    #[error("value [{value}] of key [{permission}] in service [{service}] is not base2")]
    NonBase2Permission {
        service: String,
        permission: String,
        value: serde_json::Value,
    },

    #[error("value [{value}] of key [{permission}] in service [{service}] exists twice")]
    DuplicatePermissionValue {
        service: String,
        permission: String,
        value: u64,
    },

    #[error("value [{value}] of key [{permission}] in service [{service}] does not fit in a permission byte")]
    PermissionOutOfRange {
        service: String,
        permission: String,
        value: u64,
    },
}

impl CodedError for CatalogError {
    fn status_code(&self) -> u16 {
        500
    }

    fn error_code(&self) -> u32 {
        match self {
            Self::Io(_) => 1_000_100,
            Self::Parse(_) => 1_000_101,
            Self::InvalidStructure(_) => 1_000_102,
            Self::MissingServiceIndex { .. } => 1_000_103,
            Self::ServiceIndexOutOfRange { .. } => 1_000_104,
            Self::DuplicateServiceIndex { .. } => 1_000_105,
            Self::NonBase2Permission { .. } => 1_000_106,
            Self::DuplicatePermissionValue { .. } => 1_000_107,
            Self::PermissionOutOfRange { .. } => 1_000_108,
        }
    }
}
