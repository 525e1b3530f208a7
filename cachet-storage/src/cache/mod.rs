//! Cache side of the cache-aside layer.
//!
//! The backend is an opaque key-value service ([`CacheBackend`]) holding
//! bytes. Resolvers store [`CacheEntry`] values through it, so a cached
//! negative result is distinguishable from a key that was never cached.

pub mod entry;
pub mod memory;
pub mod traits;

pub use entry::{CacheEntry, CacheLookup};
pub use memory::InMemoryCacheBackend;
pub use traits::{CacheBackend, CacheStats};
