//! cachet Test Utilities
//!
//! Shared test infrastructure for the cachet workspace:
//! - A `TestUser` entity and seeded in-memory stores
//! - Call-counting wrappers around the cache and store traits
//! - Proptest generators for scalars, parameters and identifier lists
//! - Custom assertions for cachet error kinds

// Re-export in-memory implementations from their source crate
pub use cachet_storage::{CacheAsideResolver, InMemoryCacheBackend, InMemoryStore};

// Re-export core types for convenience
pub use cachet_core::{
    CacheKey, CacheableEntity, CachetError, CachetResult, KeyError, KeyRegistry, LookupParams,
    MissingPolicy, Projection, ResolverConfig, Scalar, StorageError,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cachet_core::{Row, StoreQuery};
use cachet_storage::{CacheBackend, CacheStats, EntityStore};
use serde::{Deserialize, Serialize};

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TEST ENTITY
// ============================================================================

/// Entity used throughout the workspace tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUser {
    pub pk: i64,
    pub name: String,
    pub email: String,
    pub team: i64,
    pub active: bool,
}

impl CacheableEntity for TestUser {
    fn entity_type() -> &'static str {
        "user"
    }

    fn field_names() -> &'static [&'static str] {
        &["pk", "name", "email", "team", "active"]
    }

    fn field(&self, name: &str) -> Option<Scalar> {
        match name {
            "pk" => Some(Scalar::Int(self.pk)),
            "name" => Some(Scalar::Text(self.name.clone())),
            "email" => Some(Scalar::Text(self.email.clone())),
            "team" => Some(Scalar::Int(self.team)),
            "active" => Some(Scalar::Bool(self.active)),
            _ => None,
        }
    }
}

// ============================================================================
// COUNTING WRAPPERS
// ============================================================================

/// Store wrapper counting round trips per method.
#[derive(Debug, Default)]
pub struct CountingStore<S> {
    inner: S,
    get_one: AtomicUsize,
    fetch: AtomicUsize,
    fetch_values: AtomicUsize,
    fetch_by_membership: AtomicUsize,
    last_query: Mutex<Option<StoreQuery>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            get_one: AtomicUsize::new(0),
            fetch: AtomicUsize::new(0),
            fetch_values: AtomicUsize::new(0),
            fetch_by_membership: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn get_one_calls(&self) -> usize {
        self.get_one.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub fn fetch_values_calls(&self) -> usize {
        self.fetch_values.load(Ordering::SeqCst)
    }

    pub fn membership_calls(&self) -> usize {
        self.fetch_by_membership.load(Ordering::SeqCst)
    }

    /// The most recent query passed to `get_one`, `fetch` or `fetch_values`.
    pub fn last_query(&self) -> Option<StoreQuery> {
        match self.last_query.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, counter: &AtomicUsize, query: &StoreQuery) {
        counter.fetch_add(1, Ordering::SeqCst);
        let mut guard = match self.last_query.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(query.clone());
    }

    /// Round trips across every method.
    pub fn total_calls(&self) -> usize {
        self.get_one_calls() + self.fetch_calls() + self.fetch_values_calls() + self.membership_calls()
    }

    pub fn reset(&self) {
        for counter in [
            &self.get_one,
            &self.fetch,
            &self.fetch_values,
            &self.fetch_by_membership,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<E, S> EntityStore<E> for CountingStore<S>
where
    E: CacheableEntity,
    S: EntityStore<E>,
{
    async fn get_one(&self, query: &StoreQuery) -> CachetResult<E> {
        self.record(&self.get_one, query);
        self.inner.get_one(query).await
    }

    async fn fetch(&self, query: &StoreQuery) -> CachetResult<Vec<E>> {
        self.record(&self.fetch, query);
        self.inner.fetch(query).await
    }

    async fn fetch_values(&self, query: &StoreQuery, projection: &Projection) -> CachetResult<Vec<Row>> {
        self.record(&self.fetch_values, query);
        self.inner.fetch_values(query, projection).await
    }

    async fn fetch_by_membership(&self, field: &str, values: &[Scalar]) -> CachetResult<Vec<E>> {
        self.fetch_by_membership.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_by_membership(field, values).await
    }
}

/// Cache wrapper counting calls per method.
#[derive(Debug, Default)]
pub struct CountingCache<C> {
    inner: C,
    get: AtomicUsize,
    get_many: AtomicUsize,
    set: AtomicUsize,
    set_many: AtomicUsize,
}

impl<C> CountingCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            get: AtomicUsize::new(0),
            get_many: AtomicUsize::new(0),
            set: AtomicUsize::new(0),
            set_many: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn get_calls(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }

    pub fn get_many_calls(&self) -> usize {
        self.get_many.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set.load(Ordering::SeqCst)
    }

    pub fn set_many_calls(&self) -> usize {
        self.set_many.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: CacheBackend> CacheBackend for CountingCache<C> {
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        self.get.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[CacheKey]) -> CachetResult<HashMap<CacheKey, Vec<u8>>> {
        self.get_many.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()> {
        self.set.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn set_many(&self, entries: HashMap<CacheKey, Vec<u8>>) -> CachetResult<()> {
        self.set_many.fetch_add(1, Ordering::SeqCst);
        self.inner.set_many(entries).await
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cachet value types.

    use super::*;
    use proptest::collection::{btree_map, vec};
    use proptest::prelude::*;

    /// Generate any scalar, with finite floats only.
    pub fn arb_scalar() -> impl Strategy<Value = Scalar> {
        prop_oneof![
            Just(Scalar::Null),
            any::<bool>().prop_map(Scalar::Bool),
            any::<i64>().prop_map(Scalar::Int),
            (-1.0e9f64..1.0e9f64).prop_map(Scalar::Float),
            "[a-z0-9 ]{0,12}".prop_map(Scalar::Text),
        ]
    }

    /// Generate a scalar with an integer form.
    pub fn arb_int_like() -> impl Strategy<Value = Scalar> {
        prop_oneof![
            any::<i64>().prop_map(Scalar::Int),
            any::<i32>().prop_map(|i| Scalar::Text(i.to_string())),
            any::<i32>().prop_map(|i| Scalar::Float(f64::from(i))),
        ]
    }

    /// Generate a parameter bag with up to `max` entries.
    pub fn arb_params(max: usize) -> impl Strategy<Value = LookupParams> {
        btree_map("[a-z][a-z_]{0,7}", arb_scalar(), 0..=max)
            .prop_map(|map| map.into_iter().collect())
    }

    /// Generate up to 16 integer identifiers in `1..=max_id`, repeats allowed.
    pub fn arb_identifier_list(max_id: i64) -> impl Strategy<Value = Vec<Scalar>> {
        vec(1..=max_id, 0..16).prop_map(|ids| ids.into_iter().map(Scalar::Int).collect())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Resolver over counting wrappers, as most integration tests use it.
    pub type TestResolver = CacheAsideResolver<
        TestUser,
        CountingCache<InMemoryCacheBackend>,
        CountingStore<InMemoryStore<TestUser>>,
    >;

    /// A user with fields derived from `pk`.
    ///
    /// Users are spread over three teams; odd primary keys are active.
    pub fn user(pk: i64) -> TestUser {
        TestUser {
            pk,
            name: format!("user-{}", pk),
            email: format!("user{}@example.com", pk),
            team: pk % 3,
            active: pk % 2 == 1,
        }
    }

    /// Users with primary keys `1..=count`.
    pub fn users(count: i64) -> Vec<TestUser> {
        (1..=count).map(user).collect()
    }

    /// A store holding [`users`]`(count)`.
    pub fn seeded_store(count: i64) -> InMemoryStore<TestUser> {
        InMemoryStore::with_entities(users(count))
    }

    /// Templates for the `TestUser` queries used across the tests.
    pub fn key_registry() -> KeyRegistry {
        let mut keys = KeyRegistry::new();
        for (name, template) in [
            ("user_by_id", "user:{pk}"),
            ("user_by_email", "user:email:{email}"),
            ("users_by_team", "users:team:{team}"),
            ("active_users", "users:active"),
        ] {
            if let Err(e) = keys.register(name, template) {
                panic!("fixture template {} is malformed: {}", name, e);
            }
        }
        keys
    }

    /// A resolver over a store seeded with `count` users.
    pub fn test_resolver(count: i64, config: ResolverConfig) -> TestResolver {
        let cache = Arc::new(CountingCache::new(InMemoryCacheBackend::new()));
        let store = Arc::new(CountingStore::new(seeded_store(count)));
        match CacheAsideResolver::new(cache, store, key_registry(), config) {
            Ok(resolver) => resolver,
            Err(e) => panic!("fixture resolver config rejected: {}", e),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for cachet error kinds.

    use super::*;

    /// Assert that a CachetResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CachetResult<T>) {
        match result {
            Err(CachetError::Storage(StorageError::NotFound { .. })) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a CachetResult is an InvalidParameterType key error for `param`.
    #[track_caller]
    pub fn assert_invalid_parameter<T: std::fmt::Debug>(result: &CachetResult<T>, param: &str) {
        match result {
            Err(CachetError::Key(KeyError::InvalidParameterType { param: p, .. })) => {
                assert_eq!(p, param, "Wrong parameter in InvalidParameterType error");
            }
            other => panic!("Expected InvalidParameterType for {}, got: {:?}", param, other),
        }
    }

    /// Assert that a CachetResult is a MissingReferences error naming `ids`.
    #[track_caller]
    pub fn assert_missing_references<T: std::fmt::Debug>(result: &CachetResult<T>, ids: &[Scalar]) {
        match result {
            Err(CachetError::Storage(StorageError::MissingReferences { ids: got, .. })) => {
                assert_eq!(got.as_slice(), ids, "Wrong ids in MissingReferences error");
            }
            other => panic!("Expected MissingReferences error, got: {:?}", other),
        }
    }

    /// Assert that a cache holds a present entry for `key`.
    #[track_caller]
    pub fn assert_cached(cache: &InMemoryCacheBackend, key: &str) {
        match cache.peek(&CacheKey::new(key)) {
            Ok(Some(bytes)) => assert!(
                bytes.starts_with(br#"{"state":"present""#),
                "Entry for {} is not a present value",
                key
            ),
            other => panic!("Expected cached entry for {}, got: {:?}", key, other),
        }
    }

    /// Assert that a cache has no entry for `key`.
    #[track_caller]
    pub fn assert_not_cached(cache: &InMemoryCacheBackend, key: &str) {
        match cache.contains(&CacheKey::new(key)) {
            Ok(false) => {}
            other => panic!("Expected no entry for {}, got: {:?}", key, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_user_fixture_fields() {
        let u = fixtures::user(4);
        assert_eq!(u.field("pk"), Some(Scalar::Int(4)));
        assert_eq!(u.field("team"), Some(Scalar::Int(1)));
        assert_eq!(u.field("active"), Some(Scalar::Bool(false)));
        assert_eq!(u.field("nope"), None);
        assert!(TestUser::has_field("email"));
    }

    #[test]
    fn test_key_registry_fixture() {
        let keys = fixtures::key_registry();
        assert_eq!(keys.len(), 4);
        let key = keys
            .derive_key("users_by_team", &LookupParams::single("team", 2), false)
            .unwrap();
        assert_eq!(key.as_str(), "users:team:2");
    }

    #[tokio::test]
    async fn test_counting_store_counts_calls() {
        let store = CountingStore::new(fixtures::seeded_store(3));
        let found: Vec<TestUser> = store
            .fetch_by_membership("pk", &[Scalar::Int(1), Scalar::Int(3)])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.membership_calls(), 1);
        assert_eq!(store.total_calls(), 1);

        store.reset();
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_counting_cache_counts_calls() {
        let cache = CountingCache::new(InMemoryCacheBackend::new());
        let key = CacheKey::new("k");
        cache.set(&key, b"v".to_vec()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"v".to_vec()));
        cache.get_many(&[key]).await.unwrap();
        assert_eq!(cache.set_calls(), 1);
        assert_eq!(cache.get_calls(), 1);
        assert_eq!(cache.get_many_calls(), 1);
    }

    #[test]
    fn test_assertions_accept_matching_errors() {
        let missing: CachetResult<()> = Err(StorageError::MissingReferences {
            entity_type: "user",
            ids: vec![Scalar::Int(7)],
        }
        .into());
        assertions::assert_missing_references(&missing, &[Scalar::Int(7)]);

        let invalid: CachetResult<()> = Err(KeyError::InvalidParameterType {
            param: "pk".to_string(),
            value: Scalar::from("x"),
        }
        .into());
        assertions::assert_invalid_parameter(&invalid, "pk");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_int_like_always_coerces(value in generators::arb_int_like()) {
            prop_assert!(value.to_int().is_some());
        }

        #[test]
        fn prop_identifier_lists_stay_in_range(ids in generators::arb_identifier_list(5)) {
            prop_assert!(ids.len() < 16);
            for id in ids {
                let n = id.to_int().unwrap();
                prop_assert!((1..=5).contains(&n));
            }
        }
    }
}
