//! Permission encoder/store.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use permgate_catalog::Catalog;

use crate::PermissionError;
use crate::encoding;

/// One granted permission bit, fully resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedPermission {
    pub service_name: String,
    pub service_index: usize,
    pub permission_name: String,
    pub permission_bit: u8,
}

/// Mutable permission set for one party, sized to its catalog.
///
/// Owns one byte per service; byte `i` is the bitmask granted for the
/// service whose `index == i`. The byte sequence always has exactly
/// `service_count` entries: seeding input is padded or truncated to fit,
/// and the encoder never writes a shorter form.
///
/// Listings walk the catalog in declaration order (services, then permission
/// keys within a service). That ordering is a contract: identical catalog
/// and identical bytes always produce identical listings.
#[derive(Debug, Clone)]
pub struct PermissionStore {
    catalog: Arc<Catalog>,
    bytes: Vec<u8>,
}

impl PermissionStore {
    /// Empty store: every service byte zeroed.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let bytes = vec![0; catalog.service_count()];
        Self { catalog, bytes }
    }

    /// Store seeded from an existing encoded permission string.
    ///
    /// Bytes are copied position-by-position; positions the input does not
    /// cover stay zero, and input bytes beyond the catalog's service count
    /// are ignored.
    pub fn with_encoded(catalog: Arc<Catalog>, encoded: &str) -> Result<Self, PermissionError> {
        let mut store = Self::new(catalog);
        let decoded = encoding::decode(encoded)?;
        let len = store.bytes.len().min(decoded.len());
        store.bytes[..len].copy_from_slice(&decoded[..len]);
        Ok(store)
    }

    /// Grant `bit` (bitwise OR) in the byte for `service_index`.
    pub fn add(&mut self, service_index: usize, bit: u8) -> Result<(), PermissionError> {
        let byte = self.byte_mut(service_index)?;
        *byte |= bit;
        Ok(())
    }

    /// Revoke `bit` (bitwise AND with its complement) in the byte for
    /// `service_index`. Other bits in the byte are untouched.
    pub fn remove(&mut self, service_index: usize, bit: u8) -> Result<(), PermissionError> {
        let byte = self.byte_mut(service_index)?;
        *byte &= !bit;
        Ok(())
    }

    /// Whether every bit of `bit` is granted for `service_index`.
    ///
    /// Out-of-range indices raise here: the instance knows its catalog, so a
    /// bad index is programmer error. The stateless
    /// [`check_encoded`](Self::check_encoded) probe answers `false` for the
    /// same condition because it inspects untrusted strings of unknown
    /// length.
    pub fn check(&self, service_index: usize, bit: u8) -> Result<bool, PermissionError> {
        let byte = self
            .bytes
            .get(service_index)
            .ok_or(PermissionError::ServiceIndexOutOfRange {
                index: service_index,
                count: self.bytes.len(),
            })?;
        Ok(byte & bit == bit)
    }

    /// Canonical base64 form of the raw byte sequence.
    pub fn encode(&self) -> String {
        encoding::encode(&self.bytes)
    }

    /// Granted permissions as `"[serviceName].[permissionName]"` strings.
    pub fn list_permissions(&self) -> Vec<String> {
        self.granted()
            .map(|g| format!("[{}].[{}]", g.service_name, g.permission_name))
            .collect()
    }

    /// Granted permissions as `"[serviceIndex].[bitValue]"` strings.
    pub fn list_permission_indices(&self) -> Vec<String> {
        self.granted()
            .map(|g| format!("[{}].[{}]", g.service_index, g.permission_bit))
            .collect()
    }

    /// Granted permissions as structured records.
    pub fn list_permissions_complete(&self) -> Vec<GrantedPermission> {
        self.granted().collect()
    }

    /// OR-merge every encoded input into this store, position by position,
    /// and return the new canonical encoding.
    ///
    /// This mutates the store: merging is not a pure function over the
    /// instance. Shorter inputs leave trailing bytes untouched; input bytes
    /// beyond the catalog's service count are ignored. An empty input slice
    /// returns the current encoding unchanged. Each input is decoded into a
    /// fresh buffer; no caller-owned memory is retained.
    pub fn merge_encoded<S: AsRef<str>>(&mut self, encoded: &[S]) -> Result<String, PermissionError> {
        for item in encoded {
            let decoded = encoding::decode(item.as_ref())?;
            for (byte, incoming) in self.bytes.iter_mut().zip(decoded) {
                *byte |= incoming;
            }
        }
        Ok(self.encode())
    }

    /// Stateless capability probe against an externally supplied encoded
    /// permission string. No catalog needed.
    ///
    /// Deliberately permissive where the instance methods raise: an
    /// out-of-range `service_index` (the decoded claim is shorter than
    /// expected) or an undecodable string answers `false`, so a verifier can
    /// probe a claim of unknown provenance without crashing on malformed
    /// data.
    pub fn check_encoded(encoded: &str, service_index: usize, bit: u8) -> bool {
        let Ok(decoded) = encoding::decode(encoded) else {
            return false;
        };
        match decoded.get(service_index) {
            Some(byte) => byte & bit == bit,
            None => false,
        }
    }

    /// Catalog this store was built against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Raw byte view (one byte per service, catalog index order).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn byte_mut(&mut self, service_index: usize) -> Result<&mut u8, PermissionError> {
        let count = self.bytes.len();
        self.bytes
            .get_mut(service_index)
            .ok_or(PermissionError::ServiceIndexOutOfRange {
                index: service_index,
                count,
            })
    }

    fn granted(&self) -> impl Iterator<Item = GrantedPermission> + '_ {
        self.catalog.services().iter().flat_map(move |service| {
            let byte = self.bytes.get(service.index).copied().unwrap_or(0);
            service.permissions.iter().filter_map(move |perm| {
                (byte & perm.bit == perm.bit).then(|| GrantedPermission {
                    service_name: service.name.clone(),
                    service_index: service.index,
                    permission_name: perm.name.clone(),
                    permission_bit: perm.bit,
                })
            })
        })
    }
}

impl fmt::Display for PermissionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
