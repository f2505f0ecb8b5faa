//! `permgate-catalog` — service-permission catalog ingestion and validation.
//!
//! A catalog declares, per service, a dense integer index and a set of named
//! power-of-two permission bits. All validation happens once, at ingestion;
//! the resulting [`Catalog`] is read-only and preserves declaration order.

pub mod catalog;
pub mod error;

pub use catalog::{Catalog, PermissionDef, ServiceDef};
pub use error::CatalogError;
