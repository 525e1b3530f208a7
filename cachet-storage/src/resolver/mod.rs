//! Cache-aside resolvers.
//!
//! [`CacheAsideResolver`] answers lookups from the cache when it can and
//! otherwise queries the store, writes the result back and returns it. The
//! batch resolver ([`batch`]) and the identifier-substitution transform
//! ([`substitute`]) build on the same key registry, cache and store.
//!
//! # Consistency
//!
//! Reads are cache first, store second; write-back happens after a successful
//! store read. Nothing here locks: two callers missing on the same key both
//! query the store and both write, and the last write wins. Entries are plain
//! re-derivations of store state, so duplicated work costs time, not
//! correctness.
//!
//! # Example
//!
//! ```ignore
//! let keys = KeyRegistry::new().with_template("user_by_id", "user:{pk}")?;
//! let resolver = CacheAsideResolver::new(cache, store, keys, ResolverConfig::default())?;
//!
//! let user = resolver
//!     .resolve_one(&Lookup::one("user_by_id", LookupParams::single("pk", 7)))
//!     .await?;
//! ```

pub mod batch;
pub mod lookup;
pub mod substitute;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use cachet_core::{
    coerce_params, describe_filters, CacheKey, CacheableEntity, CachetResult,
    ConfigError, KeyError, KeyRegistry, ResolverConfig, Row, Scalar, StorageError, StoreQuery,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::entry::{self, CacheLookup};
use crate::cache::CacheBackend;
use crate::store::EntityStore;

pub use batch::{ItemResolver, SingleLookup};
pub use lookup::{Lookup, LookupOptions, Mode, Resolved};
pub use substitute::{Reference, Substituted};

/// Cache-aside resolver over one entity type.
///
/// # Type Parameters
///
/// - `E`: The entity type being resolved
/// - `C`: The cache backend holding tagged entries
/// - `S`: The store queried on cache miss
pub struct CacheAsideResolver<E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    cache: Arc<C>,
    store: Arc<S>,
    keys: Arc<KeyRegistry>,
    config: ResolverConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E, C, S> CacheAsideResolver<E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    /// Create a resolver. The config's namespace is applied to `keys`.
    pub fn new(
        cache: Arc<C>,
        store: Arc<S>,
        keys: KeyRegistry,
        config: ResolverConfig,
    ) -> CachetResult<Self> {
        config.validate()?;
        let keys = keys.with_namespace(config.namespace.clone());
        Ok(Self {
            cache,
            store,
            keys: Arc::new(keys),
            config,
            _entity: PhantomData,
        })
    }

    /// Create a resolver with default configuration.
    pub fn with_defaults(cache: Arc<C>, store: Arc<S>, keys: KeyRegistry) -> CachetResult<Self> {
        Self::new(cache, store, keys, ResolverConfig::default())
    }

    /// Get the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the key registry.
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Derive the cache key a lookup would use.
    pub fn key_for(&self, lookup: &Lookup) -> CachetResult<CacheKey> {
        let int_only = lookup.options.int_only.unwrap_or(self.config.int_only);
        Ok(self.keys.derive_key(&lookup.template, &lookup.params, int_only)?)
    }

    /// Resolve a lookup through cache, then store.
    ///
    /// Returns `Ok(None)` when errors are suppressed and the lookup either
    /// matched nothing or carried a parameter that failed integer coercion.
    /// Suppressed results are not cached unless negative caching is enabled,
    /// and a coercion failure is never cached.
    #[tracing::instrument(skip_all, fields(template = %lookup.template, mode = ?lookup.options.mode))]
    pub async fn resolve(&self, lookup: &Lookup) -> CachetResult<Option<Resolved<E>>> {
        lookup.validate()?;
        let options = &lookup.options;
        let suppress = options.suppress_errors;
        let int_only = options.int_only.unwrap_or(self.config.int_only);

        let template = self.keys.template(&lookup.template)?;
        let params = match coerce_params(&lookup.params, int_only) {
            Ok(params) => params,
            Err(e @ KeyError::InvalidParameterType { .. }) if suppress => {
                tracing::debug!(error = %e, "Suppressed invalid lookup parameter");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let key = self.keys.render(template, &params)?;

        // Constant criteria join after the key is fixed.
        let mut criteria = params;
        criteria.merge(&lookup.const_params);
        let query = StoreQuery::new(criteria.to_filters())
            .with_exclude(lookup.exclude.to_filters())
            .with_order_by(options.order_by.clone())
            .with_limit(options.limit)
            .with_only(options.only.clone());

        let store = &self.store;
        let resolved = match (options.mode, &options.projection) {
            (Mode::One, None) => self
                .cache_aside(&key, suppress, store.get_one(&query))
                .await?
                .map(Resolved::One),
            (Mode::Many, None) => self
                .cache_aside(&key, suppress, store.fetch(&query))
                .await?
                .map(Resolved::Many),
            (Mode::One, Some(projection)) => {
                let fetch = async {
                    store
                        .fetch_values(&query, projection)
                        .await
                        .and_then(|rows| exactly_one::<E>(rows, &query))
                };
                if projection.flat {
                    self.cache_aside(&key, suppress, async { fetch.await.map(flatten_row) })
                        .await?
                        .map(Resolved::Value)
                } else {
                    self.cache_aside(&key, suppress, fetch).await?.map(Resolved::Row)
                }
            }
            (Mode::Many, Some(projection)) => {
                let fetch = store.fetch_values(&query, projection);
                if projection.flat {
                    self.cache_aside(&key, suppress, async {
                        fetch
                            .await
                            .map(|rows| rows.into_iter().map(flatten_row).collect::<Vec<_>>())
                    })
                    .await?
                    .map(Resolved::Values)
                } else {
                    self.cache_aside(&key, suppress, fetch).await?.map(Resolved::Rows)
                }
            }
        };
        Ok(resolved)
    }

    /// Resolve a single-entity lookup without projection.
    pub async fn resolve_one(&self, lookup: &Lookup) -> CachetResult<Option<E>> {
        expect_shape(lookup, Mode::One)?;
        Ok(self.resolve(lookup).await?.and_then(Resolved::into_one))
    }

    /// Resolve a list lookup without projection.
    pub async fn resolve_list(&self, lookup: &Lookup) -> CachetResult<Option<Vec<E>>> {
        expect_shape(lookup, Mode::Many)?;
        Ok(self.resolve(lookup).await?.and_then(Resolved::into_many))
    }

    /// The cache-aside step shared by every lookup shape.
    ///
    /// `fetch` is only polled on a miss.
    async fn cache_aside<T, F>(&self, key: &CacheKey, suppress: bool, fetch: F) -> CachetResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = CachetResult<T>>,
    {
        let raw = self.cache.get(key).await?;
        match entry::classify::<T>(key, raw.as_deref()) {
            CacheLookup::Hit(value) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(Some(value));
            }
            CacheLookup::CachedAbsent => {
                tracing::debug!(key = %key, "Cached absence");
                return Ok(None);
            }
            CacheLookup::Miss => {
                tracing::debug!(key = %key, "Cache miss, querying store");
            }
        }

        match fetch.await {
            Ok(value) => {
                self.cache.set(key, entry::encode_present(key, &value)?).await?;
                Ok(Some(value))
            }
            Err(e) if suppress && e.is_not_found() => {
                tracing::debug!(key = %key, error = %e, "Suppressed not-found lookup");
                if self.config.negative_caching {
                    self.cache.set(key, entry::encode_absent(key)?).await?;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl<E, C, S> Clone for CacheAsideResolver<E, C, S>
where
    E: CacheableEntity,
    C: CacheBackend,
    S: EntityStore<E>,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            keys: Arc::clone(&self.keys),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

fn expect_shape(lookup: &Lookup, mode: Mode) -> Result<(), ConfigError> {
    if lookup.options.mode != mode {
        return Err(ConfigError::IncompatibleOptions {
            option_a: format!("mode={:?}", lookup.options.mode).to_lowercase(),
            option_b: format!("entity lookup expecting mode={:?}", mode).to_lowercase(),
        });
    }
    if lookup.options.projection.is_some() {
        return Err(ConfigError::IncompatibleOptions {
            option_a: "projection".to_string(),
            option_b: "entity lookup".to_string(),
        });
    }
    Ok(())
}

fn exactly_one<E: CacheableEntity>(mut rows: Vec<Row>, query: &StoreQuery) -> CachetResult<Row> {
    match rows.len() {
        0 => Err(StorageError::NotFound {
            entity_type: E::entity_type(),
            criteria: describe_filters(&query.filter),
        }
        .into()),
        1 => Ok(rows.remove(0)),
        count => Err(StorageError::MultipleFound {
            entity_type: E::entity_type(),
            criteria: describe_filters(&query.filter),
            count,
        }
        .into()),
    }
}

fn flatten_row(row: Row) -> Scalar {
    row.into_iter().next().unwrap_or(Scalar::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use crate::store::InMemoryStore;
    use cachet_core::{CachetError, LookupParams, Projection};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        pk: i64,
        author: i64,
        title: String,
        published: bool,
    }

    impl CacheableEntity for Post {
        fn entity_type() -> &'static str {
            "post"
        }

        fn field_names() -> &'static [&'static str] {
            &["pk", "author", "title", "published"]
        }

        fn field(&self, name: &str) -> Option<Scalar> {
            match name {
                "pk" => Some(Scalar::Int(self.pk)),
                "author" => Some(Scalar::Int(self.author)),
                "title" => Some(Scalar::Text(self.title.clone())),
                "published" => Some(Scalar::Bool(self.published)),
                _ => None,
            }
        }
    }

    fn post(pk: i64, author: i64, published: bool) -> Post {
        Post {
            pk,
            author,
            title: format!("post {}", pk),
            published,
        }
    }

    type PostResolver = CacheAsideResolver<Post, InMemoryCacheBackend, InMemoryStore<Post>>;

    fn resolver(config: ResolverConfig) -> PostResolver {
        let store = InMemoryStore::with_entities(vec![
            post(1, 10, true),
            post(2, 10, false),
            post(3, 10, true),
            post(4, 20, true),
        ]);
        let keys = KeyRegistry::new()
            .with_template("post_by_id", "post:{pk}")
            .unwrap()
            .with_template("posts_by_author", "posts:author:{author}")
            .unwrap();
        CacheAsideResolver::new(
            Arc::new(InMemoryCacheBackend::new()),
            Arc::new(store),
            keys,
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_one_populates_cache() {
        let r = resolver(ResolverConfig::default());
        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", 2));

        assert_eq!(r.resolve_one(&lookup).await.unwrap(), Some(post(2, 10, false)));
        let raw = r.cache().peek(&CacheKey::new("post:2")).unwrap().unwrap();
        assert_eq!(
            entry::classify::<Post>(&CacheKey::new("post:2"), Some(&raw)),
            CacheLookup::Hit(post(2, 10, false))
        );

        // Served from cache once the store no longer has it.
        r.store().clear().unwrap();
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), Some(post(2, 10, false)));
    }

    #[tokio::test]
    async fn test_const_params_filter_but_do_not_key() {
        let r = resolver(ResolverConfig::default());
        let lookup = Lookup::many("posts_by_author", LookupParams::single("author", 10))
            .with_const(LookupParams::single("published", true))
            .with_order_by(["-pk"]);

        assert_eq!(r.key_for(&lookup).unwrap().as_str(), "posts:author:10");
        let posts = r.resolve_list(&lookup).await.unwrap().unwrap();
        assert_eq!(posts, vec![post(3, 10, true), post(1, 10, true)]);
    }

    #[tokio::test]
    async fn test_suppressed_not_found_is_not_cached() {
        let r = resolver(ResolverConfig::default());
        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", 99));
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), None);
        assert!(r.cache().is_empty().unwrap());

        let strict = lookup.with_suppress_errors(false);
        assert!(r.resolve_one(&strict).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_negative_caching() {
        let r = resolver(ResolverConfig::default().with_negative_caching(true));
        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", 99));
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), None);

        r.store().insert(post(99, 30, true)).unwrap();
        // The cached absence still answers.
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_parameter_suppression() {
        let r = resolver(ResolverConfig::default().with_int_only(true));
        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", "abc"));
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), None);
        assert!(r.cache().is_empty().unwrap());

        let strict = lookup.with_suppress_errors(false);
        assert!(r.resolve_one(&strict).await.unwrap_err().is_invalid_parameter());
    }

    #[tokio::test]
    async fn test_multiple_found_is_never_suppressed() {
        let r = resolver(ResolverConfig::default());
        let lookup = Lookup::one("posts_by_author", LookupParams::single("author", 10));
        let err = r.resolve_one(&lookup).await.unwrap_err();
        assert!(matches!(
            err,
            CachetError::Storage(StorageError::MultipleFound { count: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_projections() {
        let r = resolver(ResolverConfig::default());

        let titles = Lookup::many("posts_by_author", LookupParams::single("author", 10))
            .with_order_by(["pk"])
            .with_projection(Projection::flat("title"));
        let values = r.resolve(&titles).await.unwrap().unwrap().into_values();
        assert_eq!(
            values,
            Some(vec![
                Scalar::from("post 1"),
                Scalar::from("post 2"),
                Scalar::from("post 3"),
            ])
        );

        let row = Lookup::one("post_by_id", LookupParams::single("pk", 4))
            .with_projection(Projection::rows(["author", "published"]));
        let row = r.resolve(&row).await.unwrap().unwrap().into_row();
        assert_eq!(row, Some(vec![Scalar::from(20), Scalar::from(true)]));
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_rejected() {
        let r = resolver(ResolverConfig::default());
        let lookup = Lookup::many("posts_by_author", LookupParams::single("author", 10));
        let err = r.resolve_one(&lookup).await.unwrap_err();
        assert!(matches!(
            err,
            CachetError::Config(ConfigError::IncompatibleOptions { .. })
        ));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_refetched() {
        let r = resolver(ResolverConfig::default());
        let key = CacheKey::new("post:1");
        r.cache().insert_raw(key.clone(), b"garbage".to_vec()).unwrap();

        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", 1));
        assert_eq!(r.resolve_one(&lookup).await.unwrap(), Some(post(1, 10, true)));
        let raw = r.cache().peek(&key).unwrap().unwrap();
        assert!(matches!(
            entry::classify::<Post>(&key, Some(&raw)),
            CacheLookup::Hit(_)
        ));
    }

    #[test]
    fn test_namespace_applies_to_keys() {
        let r = resolver(ResolverConfig::default().with_namespace("v3"));
        let lookup = Lookup::one("post_by_id", LookupParams::single("pk", 1));
        assert_eq!(r.key_for(&lookup).unwrap().as_str(), "v3:post:1");
    }
}
