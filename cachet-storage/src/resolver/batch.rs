//! Batch-by-identifier resolution.
//!
//! One bulk cache read covers every identifier; identifiers the cache cannot
//! answer fall back, one by one, to an [`ItemResolver`]. The output lines up
//! 1:1 with the input, duplicates included.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use cachet_core::{
    coerce_params, CacheKey, CacheableEntity, CachetResult, KeyTemplate, LookupParams, Scalar,
};

use super::{CacheAsideResolver, Lookup};
use crate::cache::entry::{self, CacheLookup};
use crate::cache::CacheBackend;
use crate::store::EntityStore;

/// Per-item fallback used by [`CacheAsideResolver::resolve_many`].
#[async_trait]
pub trait ItemResolver<E: CacheableEntity>: Send + Sync {
    /// Resolve one entity by identifier; `None` when there is no result.
    async fn resolve_item(&self, id: &Scalar) -> CachetResult<Option<E>>;
}

/// Item resolver bound to a single-entity lookup on one identifier field.
///
/// Each call is a full cache-aside resolution (cache read, store query,
/// write-back) for `{identifier_field: id}`.
pub struct SingleLookup<'a, E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    resolver: &'a CacheAsideResolver<E, C, S>,
    template: String,
    identifier_field: String,
    suppress_errors: bool,
}

impl<'a, E, C, S> SingleLookup<'a, E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    pub fn new(
        resolver: &'a CacheAsideResolver<E, C, S>,
        template: impl Into<String>,
        identifier_field: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            template: template.into(),
            identifier_field: identifier_field.into(),
            suppress_errors: true,
        }
    }

    pub fn with_suppress_errors(mut self, suppress: bool) -> Self {
        self.suppress_errors = suppress;
        self
    }
}

#[async_trait]
impl<'a, E, C, S> ItemResolver<E> for SingleLookup<'a, E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    async fn resolve_item(&self, id: &Scalar) -> CachetResult<Option<E>> {
        let lookup = Lookup::one(
            self.template.clone(),
            LookupParams::single(self.identifier_field.clone(), id.clone()),
        )
        .with_suppress_errors(self.suppress_errors);
        self.resolver.resolve_one(&lookup).await
    }
}

/// Identifies one fallback call: aliases of an identifier share a key, and
/// identifiers without a key are told apart by value.
#[derive(Debug, PartialEq, Eq, Hash)]
enum MemoKey {
    Key(CacheKey),
    Id(Scalar),
}

impl<E, C, S> CacheAsideResolver<E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    /// Resolve many entities by identifier.
    ///
    /// Cache hits come from a single `get_many`; each remaining key is handed
    /// to `item_resolver` once, even if it repeats in the input or is reached
    /// through aliases such as `2` and `"2"`.
    /// Identifiers whose key cannot be derived (failed integer coercion) go
    /// straight to the item resolver, which decides whether that is an error.
    #[tracing::instrument(skip_all, fields(template = %template, count = identifiers.len()))]
    pub async fn resolve_many<R>(
        &self,
        item_resolver: &R,
        identifiers: &[Scalar],
        template: &str,
        identifier_field: &str,
    ) -> CachetResult<Vec<Option<E>>>
    where
        R: ItemResolver<E>,
    {
        let template = self.keys.template(template)?;
        let keys: Vec<Option<CacheKey>> = identifiers
            .iter()
            .map(|id| self.identifier_key(template, identifier_field, id))
            .collect();

        let mut seen = HashSet::new();
        let unique: Vec<CacheKey> = keys
            .iter()
            .flatten()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect();
        let mut cached = if unique.is_empty() {
            HashMap::new()
        } else {
            self.cache.get_many(&unique).await?
        };

        let mut fallback: HashMap<MemoKey, Option<E>> = HashMap::new();
        let mut results = Vec::with_capacity(identifiers.len());
        for (id, key) in identifiers.iter().zip(&keys) {
            if let Some(key) = key {
                match entry::classify::<E>(key, cached.get(key).map(Vec::as_slice)) {
                    CacheLookup::Hit(entity) => {
                        tracing::trace!(key = %key, "Batch cache hit");
                        results.push(Some(entity));
                        continue;
                    }
                    CacheLookup::CachedAbsent => {
                        tracing::trace!(key = %key, "Batch cached absence");
                        results.push(None);
                        continue;
                    }
                    CacheLookup::Miss => {
                        // Later duplicates are served from `fallback`.
                        cached.remove(key);
                    }
                }
            }

            let memo = match key {
                Some(key) => MemoKey::Key(key.clone()),
                None => MemoKey::Id(id.clone()),
            };
            if let Some(resolved) = fallback.get(&memo) {
                results.push(resolved.clone());
                continue;
            }
            tracing::trace!(id = %id, "Batch miss, resolving item");
            let resolved = item_resolver.resolve_item(id).await?;
            fallback.insert(memo, resolved.clone());
            results.push(resolved);
        }

        tracing::debug!(
            requested = identifiers.len(),
            fallbacks = fallback.len(),
            "Batch resolution complete"
        );
        Ok(results)
    }

    /// Resolve many entities by the configured identifier field, falling back
    /// to single-entity cache-aside lookups with errors suppressed.
    pub async fn resolve_by_ids(
        &self,
        template: &str,
        identifiers: &[Scalar],
    ) -> CachetResult<Vec<Option<E>>> {
        let field = self.config.identifier_field.clone();
        let item_resolver = SingleLookup::new(self, template, field.clone());
        self.resolve_many(&item_resolver, identifiers, template, &field)
            .await
    }

    /// Key for `{identifier_field: id}`, or `None` when `id` fails coercion.
    pub(crate) fn identifier_key(
        &self,
        template: &KeyTemplate,
        identifier_field: &str,
        id: &Scalar,
    ) -> Option<CacheKey> {
        let params = LookupParams::single(identifier_field, id.clone());
        let params = coerce_params(&params, self.config.int_only).ok()?;
        self.keys.render(template, &params).ok()
    }
}
