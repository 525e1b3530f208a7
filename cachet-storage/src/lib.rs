//! cachet Storage - Cache-Aside Resolvers
//!
//! The cache and store abstractions, their in-memory implementations, and
//! the resolvers that sit between them: single lookups, batches by
//! identifier, and identifier substitution.

pub mod cache;
pub mod resolver;
pub mod store;

// Re-export cache types
pub use cache::{
    CacheBackend, CacheEntry, CacheLookup, CacheStats, InMemoryCacheBackend,
};

// Re-export store types
pub use store::{EntityStore, InMemoryStore};

// Re-export resolver types
pub use resolver::{
    CacheAsideResolver, ItemResolver, Lookup, LookupOptions, Mode, Reference, Resolved,
    SingleLookup, Substituted,
};
