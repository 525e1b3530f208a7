//! Store query facade.
//!
//! The backing store is treated as an opaque querying capability. A
//! relational store, a document store or an in-memory map can sit behind it.

use async_trait::async_trait;
use cachet_core::{CacheableEntity, CachetResult, Projection, Row, Scalar, StoreQuery};

/// Read-side store trait for retrieving entities on cache miss.
#[async_trait]
pub trait EntityStore<E: CacheableEntity>: Send + Sync {
    /// Fetch exactly one entity matching `query.filter`.
    ///
    /// Fails with `StorageError::NotFound` when nothing matches and
    /// `StorageError::MultipleFound` when more than one entity does.
    async fn get_one(&self, query: &StoreQuery) -> CachetResult<E>;

    /// Fetch matching entities, applying exclusion, ordering and limit in
    /// that order.
    async fn fetch(&self, query: &StoreQuery) -> CachetResult<Vec<E>>;

    /// Like [`fetch`](Self::fetch) but returning only the projected fields.
    ///
    /// Each row holds the values of `projection.fields` in order.
    async fn fetch_values(&self, query: &StoreQuery, projection: &Projection) -> CachetResult<Vec<Row>>;

    /// Fetch every entity whose `field` is one of `values`.
    async fn fetch_by_membership(&self, field: &str, values: &[Scalar]) -> CachetResult<Vec<E>>;
}
