//! Store side of the cache-aside layer.

pub mod memory;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::EntityStore;
