//! Identifier substitution.
//!
//! Replaces identifiers in a caller's list with the entities they name,
//! keeping any payload paired with each identifier. Cached entities are read
//! in one bulk call; the rest are fetched in one membership query and written
//! back in one bulk call.

use std::collections::{HashMap, HashSet};

use cachet_core::{
    CacheKey, CacheableEntity, CachetResult, KeyError, LookupParams, MissingPolicy, Scalar,
    StorageError,
};

use super::CacheAsideResolver;
use crate::cache::entry::{self, CacheLookup};
use crate::cache::CacheBackend;
use crate::store::EntityStore;

/// An identifier to substitute, optionally carrying a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<P> {
    Bare(Scalar),
    Composite(Scalar, P),
}

impl<P> Reference<P> {
    pub fn identifier(&self) -> &Scalar {
        match self {
            Reference::Bare(id) | Reference::Composite(id, _) => id,
        }
    }
}

/// A [`Reference`] with its identifier replaced by the entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Substituted<E, P> {
    Bare(E),
    Composite(E, P),
}

impl<E, P> Substituted<E, P> {
    pub fn entity(&self) -> &E {
        match self {
            Substituted::Bare(entity) | Substituted::Composite(entity, _) => entity,
        }
    }

    pub fn into_parts(self) -> (E, Option<P>) {
        match self {
            Substituted::Bare(entity) => (entity, None),
            Substituted::Composite(entity, payload) => (entity, Some(payload)),
        }
    }
}

impl<E, C, S> CacheAsideResolver<E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    /// Replace each reference's identifier with its entity, in input order.
    ///
    /// Issues at most one bulk cache read, one membership query and one bulk
    /// cache write. References that resolve to nothing are dropped or fail
    /// the call, per [`MissingPolicy`].
    #[tracing::instrument(skip_all, fields(template = %template, count = references.len()))]
    pub async fn substitute<P>(
        &self,
        references: Vec<Reference<P>>,
        template: &str,
        identifier_field: &str,
    ) -> CachetResult<Vec<Substituted<E, P>>>
    where
        P: Send,
    {
        let ids: Vec<Scalar> = references.iter().map(|r| r.identifier().clone()).collect();
        let (keys, resolved) = self.lookup_identifiers(&ids, template, identifier_field).await?;

        let mut out = Vec::with_capacity(references.len());
        for ((reference, id), key) in references.into_iter().zip(&ids).zip(&keys) {
            let Some(entity) = resolved.get(key) else {
                tracing::warn!(id = %id, key = %key, "Dropping unresolved reference");
                continue;
            };
            out.push(match reference {
                Reference::Bare(_) => Substituted::Bare(entity.clone()),
                Reference::Composite(_, payload) => Substituted::Composite(entity.clone(), payload),
            });
        }
        Ok(out)
    }

    /// Substitute a plain list of identifiers, using the configured
    /// identifier field.
    pub async fn substitute_ids(&self, ids: Vec<Scalar>, template: &str) -> CachetResult<Vec<E>> {
        let field = self.config.identifier_field.clone();
        let references = ids.into_iter().map(Reference::<()>::Bare).collect();
        Ok(self
            .substitute(references, template, &field)
            .await?
            .into_iter()
            .map(|s| s.into_parts().0)
            .collect())
    }

    /// Substitute the identifier of each `(id, payload)` pair, using the
    /// configured identifier field.
    pub async fn substitute_pairs<P>(
        &self,
        pairs: Vec<(Scalar, P)>,
        template: &str,
    ) -> CachetResult<Vec<(E, P)>>
    where
        P: Send,
    {
        let field = self.config.identifier_field.clone();
        let references = pairs
            .into_iter()
            .map(|(id, payload)| Reference::Composite(id, payload))
            .collect();
        Ok(self
            .substitute(references, template, &field)
            .await?
            .into_iter()
            .filter_map(|s| match s {
                Substituted::Composite(entity, payload) => Some((entity, payload)),
                Substituted::Bare(_) => None,
            })
            .collect())
    }

    /// The cache key of every identifier, in input order, and the entity
    /// behind each key that resolved.
    ///
    /// Identifiers are grouped by key, so aliases such as `2` and `"2"` share
    /// one cache entry, one store match and one write.
    async fn lookup_identifiers(
        &self,
        ids: &[Scalar],
        template: &str,
        identifier_field: &str,
    ) -> CachetResult<(Vec<CacheKey>, HashMap<CacheKey, E>)> {
        if ids.is_empty() {
            return Ok((Vec::new(), HashMap::new()));
        }
        let template = self.keys.template(template)?;

        let mut keys = Vec::with_capacity(ids.len());
        let mut unique: Vec<CacheKey> = Vec::new();
        let mut aliases: HashMap<CacheKey, Vec<Scalar>> = HashMap::new();
        for id in ids {
            let id = self.coerce_identifier(identifier_field, id)?;
            let key = self
                .keys
                .render(template, &LookupParams::single(identifier_field, id.clone()))?;
            let known = aliases.entry(key.clone()).or_insert_with(|| {
                unique.push(key.clone());
                Vec::new()
            });
            if !known.contains(&id) {
                known.push(id);
            }
            keys.push(key);
        }

        let cached = self.cache.get_many(&unique).await?;
        let mut resolved = HashMap::with_capacity(unique.len());
        let mut missing: Vec<CacheKey> = Vec::new();
        for key in unique {
            match entry::classify::<E>(&key, cached.get(&key).map(Vec::as_slice)) {
                CacheLookup::Hit(entity) => {
                    resolved.insert(key, entity);
                }
                CacheLookup::CachedAbsent => {}
                CacheLookup::Miss => missing.push(key),
            }
        }
        tracing::debug!(
            cached = resolved.len(),
            missing = missing.len(),
            "Partitioned identifiers"
        );

        let mut fetched: HashMap<CacheKey, E> = HashMap::new();
        if !missing.is_empty() {
            let mut seen = HashSet::new();
            let lookup_ids: Vec<Scalar> = missing
                .iter()
                .filter_map(|key| aliases.get(key))
                .flatten()
                .filter(|id| seen.insert(*id))
                .cloned()
                .collect();
            let entities = self.store.fetch_by_membership(identifier_field, &lookup_ids).await?;
            for entity in entities {
                let Some(key) = entity
                    .field(identifier_field)
                    .and_then(|id| self.coerce_identifier(identifier_field, &id).ok())
                    .and_then(|id| {
                        self.keys
                            .render(template, &LookupParams::single(identifier_field, id))
                            .ok()
                    })
                else {
                    continue;
                };
                if missing.contains(&key) {
                    fetched.entry(key).or_insert(entity);
                }
            }
        }

        let mut reported = HashSet::new();
        let unresolved: Vec<Scalar> = ids
            .iter()
            .zip(&keys)
            .filter(|(_, key)| !resolved.contains_key(*key) && !fetched.contains_key(*key))
            .filter(|(_, key)| reported.insert(*key))
            .map(|(id, _)| id.clone())
            .collect();
        self.check_unresolved(unresolved)?;

        // Each missing key is written exactly once.
        let mut writes = HashMap::with_capacity(missing.len());
        for key in missing {
            match fetched.remove(&key) {
                Some(entity) => {
                    writes.insert(key.clone(), entry::encode_present(&key, &entity)?);
                    resolved.insert(key, entity);
                }
                None if self.config.negative_caching => {
                    writes.insert(key.clone(), entry::encode_absent(&key)?);
                }
                None => {}
            }
        }
        if !writes.is_empty() {
            tracing::debug!(entries = writes.len(), "Writing back fetched entities");
            self.cache.set_many(writes).await?;
        }
        Ok((keys, resolved))
    }

    fn check_unresolved(&self, ids: Vec<Scalar>) -> Result<(), StorageError> {
        if ids.is_empty() || self.config.missing_policy == MissingPolicy::Drop {
            return Ok(());
        }
        Err(StorageError::MissingReferences {
            entity_type: E::entity_type(),
            ids,
        })
    }

    /// The identifier as keys and store matches see it.
    fn coerce_identifier(&self, identifier_field: &str, id: &Scalar) -> Result<Scalar, KeyError> {
        if !self.config.int_only {
            return Ok(id.clone());
        }
        id.to_int()
            .map(Scalar::Int)
            .ok_or_else(|| KeyError::InvalidParameterType {
                param: identifier_field.to_string(),
                value: id.clone(),
            })
    }
}
