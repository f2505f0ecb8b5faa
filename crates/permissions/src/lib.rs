//! `permgate-permissions` — catalog-driven bitmask permission store.
//!
//! One byte per service, up to 8 named permission bits per byte. The
//! canonical external form is standard base64 of the raw bytes; that string
//! is what gets embedded as a token's permission claim at issuance time.

mod encoding;
pub mod error;
pub mod store;

pub use error::PermissionError;
pub use store::{GrantedPermission, PermissionStore};
