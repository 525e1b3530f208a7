//! Error types for cachet operations

use crate::Scalar;
use thiserror::Error;

/// Key derivation errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum KeyError {
    #[error("Invalid parameter type for {param}: {value} is not an integer")]
    InvalidParameterType { param: String, value: Scalar },

    #[error("Missing parameter {param} for key template {template}")]
    MissingParameter { template: String, param: String },

    #[error("Unexpected parameter {param} for key template {template}")]
    UnexpectedParameter { template: String, param: String },

    #[error("Unknown key template: {name}")]
    UnknownTemplate { name: String },

    #[error("Malformed key template {template:?}: {reason}")]
    MalformedTemplate { template: String, reason: String },
}

/// Backing store errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} matching {criteria}")]
    NotFound {
        entity_type: &'static str,
        criteria: String,
    },

    #[error("Multiple {entity_type} entities ({count}) matching {criteria}")]
    MultipleFound {
        entity_type: &'static str,
        criteria: String,
        count: usize,
    },

    #[error("Unresolved {entity_type} references: {ids:?}")]
    MissingReferences {
        entity_type: &'static str,
        ids: Vec<Scalar>,
    },

    #[error("Unknown field {field} on {entity_type}")]
    UnknownField {
        entity_type: &'static str,
        field: String,
    },

    #[error("Store backend failure: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache client errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache backend failure: {reason}")]
    Backend { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all cachet errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CachetError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CachetError {
    /// True for a lookup that was valid but matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CachetError::Storage(StorageError::NotFound { .. }))
    }

    /// True when a lookup parameter could not be coerced to an integer.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, CachetError::Key(KeyError::InvalidParameterType { .. }))
    }

    /// The two error kinds that `suppress_errors` collapses into "no result".
    pub fn is_suppressible(&self) -> bool {
        self.is_not_found() || self.is_invalid_parameter()
    }
}

/// Result type alias for cachet operations.
pub type CachetResult<T> = Result<T, CachetError>;

// =============================================================================
// TESTS
// =============================================================================
