//! cachet Core - Data Types and Key Codec
//!
//! Pure data structures shared by every cachet crate: scalar values, lookup
//! parameters, store query descriptions, the entity contract, the key codec,
//! configuration and the error hierarchy. No I/O lives here.

pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod key;
pub mod params;
pub mod query;
pub mod value;

pub use config::{MissingPolicy, ResolverConfig};
pub use entity::{CacheableEntity, DEFAULT_IDENTIFIER_FIELD};
pub use error::{CacheError, CachetError, CachetResult, ConfigError, KeyError, StorageError};
pub use filter::{describe_filters, FilterExpr, FilterOperator, FilterValue};
pub use key::{coerce_params, CacheKey, KeyRegistry, KeyTemplate};
pub use params::LookupParams;
pub use query::{OrderBy, Projection, StoreQuery};
pub use value::{Row, Scalar};
