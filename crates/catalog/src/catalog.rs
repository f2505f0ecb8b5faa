//! Typed service catalog, built once at JSON ingestion.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::CatalogError;

/// Reserved key naming a service's index inside its JSON definition.
const SERVICE_INDEX_KEY: &str = "service";

/// A named permission bit within a service's byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDef {
    pub name: String,
    pub bit: u8,
}

/// A named capability domain with a dense index into the permission byte
/// array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDef {
    pub name: String,
    pub index: usize,
    /// Permission bits in declaration order.
    pub permissions: Vec<PermissionDef>,
}

impl ServiceDef {
    /// Bit value for a named permission, if declared.
    pub fn bit(&self, permission: &str) -> Option<u8> {
        self.permissions
            .iter()
            .find(|p| p.name == permission)
            .map(|p| p.bit)
    }
}

/// Validated, read-only service catalog.
///
/// Services are kept in declaration order, and that order is a contract:
/// permission listings walk services and their bits exactly as the catalog
/// JSON declared them, so identical inputs always produce identical
/// listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    services: Vec<ServiceDef>,
}

impl Catalog {
    /// Parse and validate a catalog from its JSON text.
    ///
    /// Fails fast with the first violation found, walking services in
    /// declaration order and checking, per service: a numeric non-negative
    /// `service` index is present, the index is below the service count, and
    /// the index is unused; then per permission key (the reserved `service`
    /// key excluded): the value is a power of two that fits a byte, and the
    /// value is unused within the service.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let doc: Value = serde_json::from_str(raw)?;
        Self::from_value(&doc)
    }

    /// Read and validate a catalog from a JSON file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading service catalog");
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Validate an already-parsed catalog document.
    pub fn from_value(doc: &Value) -> Result<Self, CatalogError> {
        let Some(doc) = doc.as_object() else {
            return Err(CatalogError::InvalidStructure(
                "catalog root must be a JSON object".into(),
            ));
        };

        let count = doc.len();
        let mut services: Vec<ServiceDef> = Vec::with_capacity(count);
        let mut seen_indices: Vec<usize> = Vec::with_capacity(count);

        for (service_name, definition) in doc {
            let Some(definition) = definition.as_object() else {
                return Err(CatalogError::InvalidStructure(format!(
                    "service [{service_name}] must be a JSON object"
                )));
            };

            let index = definition
                .get(SERVICE_INDEX_KEY)
                .and_then(Value::as_u64)
                .map(|i| i as usize)
                .ok_or_else(|| CatalogError::MissingServiceIndex {
                    service: service_name.clone(),
                })?;

            if index >= count {
                return Err(CatalogError::ServiceIndexOutOfRange {
                    service: service_name.clone(),
                    index,
                    count,
                });
            }

            if seen_indices.contains(&index) {
                return Err(CatalogError::DuplicateServiceIndex {
                    service: service_name.clone(),
                    index,
                });
            }
            seen_indices.push(index);

            let mut permissions: Vec<PermissionDef> = Vec::new();
            for (permission_name, value) in definition {
                if permission_name == SERVICE_INDEX_KEY {
                    continue;
                }

                // Zero, negatives, fractions and non-numbers all fall out
                // here: none of them is a representable power of two.
                let bit_value = value
                    .as_u64()
                    .filter(|v| v.is_power_of_two())
                    .ok_or_else(|| CatalogError::NonBase2Permission {
                        service: service_name.clone(),
                        permission: permission_name.clone(),
                        value: value.clone(),
                    })?;

                if permissions.iter().any(|p| u64::from(p.bit) == bit_value) {
                    return Err(CatalogError::DuplicatePermissionValue {
                        service: service_name.clone(),
                        permission: permission_name.clone(),
                        value: bit_value,
                    });
                }

                let bit = u8::try_from(bit_value).map_err(|_| {
                    CatalogError::PermissionOutOfRange {
                        service: service_name.clone(),
                        permission: permission_name.clone(),
                        value: bit_value,
                    }
                })?;

                permissions.push(PermissionDef {
                    name: permission_name.clone(),
                    bit,
                });
            }

            services.push(ServiceDef {
                name: service_name.clone(),
                index,
                permissions,
            });
        }

        debug!(services = services.len(), "service catalog validated");
        Ok(Self { services })
    }

    /// Number of services; also the byte length of any permission set built
    /// against this catalog.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Services in declaration order.
    pub fn services(&self) -> &[ServiceDef] {
        &self.services
    }

    /// Look up a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Look up a service by its byte-array index.
    pub fn service_at(&self, index: usize) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.index == index)
    }
}
