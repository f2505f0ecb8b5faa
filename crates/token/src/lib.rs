//! `permgate-token` — bearer-token identity resolution.
//!
//! Verifies a `Bearer <jwt>` header value, resolves the effective acting
//! identity under the masquerade/override rule, and answers capability
//! queries against the token's encoded permission claim.

pub mod authorizer;
pub mod error;
pub mod key;

pub use authorizer::{OverrideGrant, PERMISSIONS_CLAIM, TokenAuthorizer};
pub use error::AuthError;
pub use key::VerificationKey;
