//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};

/// What the substitution transform does with identifiers that resolve to
/// nothing in either the cache or the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Silently omit the element; the output may be shorter than the input.
    #[default]
    Drop,
    /// Fail with `StorageError::MissingReferences`.
    Fail,
}

impl std::str::FromStr for MissingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(MissingPolicy::Drop),
            "fail" => Ok(MissingPolicy::Fail),
            other => Err(ConfigError::InvalidValue {
                field: "missing_policy".to_string(),
                value: other.to_string(),
                reason: "expected 'drop' or 'fail'".to_string(),
            }),
        }
    }
}

/// Resolver-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Prefix for every derived key.
    pub namespace: Option<String>,
    /// Default integer coercion for lookups that do not set it.
    pub int_only: bool,
    /// Identifier field used by batch lookups and substitution.
    pub identifier_field: String,
    /// Cache an explicit "absent" entry for suppressed not-found lookups.
    pub negative_caching: bool,
    /// Handling of unresolved references during substitution.
    pub missing_policy: MissingPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            int_only: false,
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
            negative_caching: false,
            missing_policy: MissingPolicy::Drop,
        }
    }
}

impl ResolverConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the default integer coercion.
    pub fn with_int_only(mut self, int_only: bool) -> Self {
        self.int_only = int_only;
        self
    }

    /// Set the identifier field.
    pub fn with_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    /// Enable or disable negative caching.
    pub fn with_negative_caching(mut self, enabled: bool) -> Self {
        self.negative_caching = enabled;
        self
    }

    /// Set the missing-reference policy.
    pub fn with_missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CACHET_NAMESPACE`: key prefix (default: none)
    /// - `CACHET_INT_ONLY`: `true`/`false` (default: false)
    /// - `CACHET_IDENTIFIER_FIELD`: identifier field (default: `pk`)
    /// - `CACHET_NEGATIVE_CACHING`: `true`/`false` (default: false)
    /// - `CACHET_MISSING_POLICY`: `drop` or `fail` (default: drop)
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            namespace: std::env::var("CACHET_NAMESPACE")
                .ok()
                .filter(|s| !s.is_empty())
                .or(defaults.namespace),
            int_only: std::env::var("CACHET_INT_ONLY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.int_only),
            identifier_field: std::env::var("CACHET_IDENTIFIER_FIELD")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.identifier_field),
            negative_caching: std::env::var("CACHET_NEGATIVE_CACHING")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.negative_caching),
            missing_policy: std::env::var("CACHET_MISSING_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.missing_policy),
        }
    }

    /// Load from a TOML document.
    pub fn from_toml_str(source: &str) -> CachetResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - namespace, when set, is non-empty and has no whitespace
    /// - identifier_field is non-empty
    pub fn validate(&self) -> CachetResult<()> {
        if let Some(ns) = &self.namespace {
            if ns.is_empty() || ns.chars().any(char::is_whitespace) {
                return Err(CachetError::Config(ConfigError::InvalidValue {
                    field: "namespace".to_string(),
                    value: ns.clone(),
                    reason: "namespace must be non-empty and contain no whitespace".to_string(),
                }));
            }
        }

        if self.identifier_field.is_empty() {
            return Err(CachetError::Config(ConfigError::InvalidValue {
                field: "identifier_field".to_string(),
                value: String::new(),
                reason: "identifier_field must be non-empty".to_string(),
            }));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
