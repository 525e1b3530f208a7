//! The entity contract shared by caches and stores.

use serde::{de::DeserializeOwned, Serialize};

use crate::Scalar;

/// Identifier field used when none is configured.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "pk";

/// Marker trait for records that can be cached.
///
/// The store owns entities; the cache only ever holds serialized copies.
///
/// # Implementation Requirements
///
/// - `entity_type()` must return a consistent value for all instances
/// - `field_names()` lists every field `field()` can answer for
/// - `field()` exposes field values for filtering, ordering and projection
pub trait CacheableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Get the entity type name, used in errors and logs.
    fn entity_type() -> &'static str;

    /// Names of all fields this entity exposes.
    fn field_names() -> &'static [&'static str];

    /// Read a field value by name.
    fn field(&self, name: &str) -> Option<Scalar>;

    /// Whether `name` is a known field.
    fn has_field(name: &str) -> bool {
        Self::field_names().contains(&name)
    }
}
