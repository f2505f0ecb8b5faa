//! Permission store errors.

use permgate_core::CodedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermissionError {
    /// The service index does not exist in the catalog this store was built
    /// against. Raised by instance operations only; the stateless
    /// [`check_encoded`](crate::PermissionStore::check_encoded) probe
    /// answers `false` for the same condition instead.
    #[error("service doesn't match global permissions object (index {index}, {count} services)")]
    ServiceIndexOutOfRange { index: usize, count: usize },

    /// An externally supplied permission string was not decodable base64.
    #[error("permission string is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),
}

impl CodedError for PermissionError {
    fn status_code(&self) -> u16 {
        match self {
            Self::ServiceIndexOutOfRange { .. } => 500,
            Self::InvalidEncoding(_) => 400,
        }
    }

    fn error_code(&self) -> u32 {
        match self {
            Self::ServiceIndexOutOfRange { .. } => 1_000_109,
            Self::InvalidEncoding(_) => 1_000_110,
        }
    }
}
