//! Key codec: named key templates and deterministic cache key derivation.
//!
//! A template such as `"user:{id}"` is registered under a logical query name
//! (`"user_by_id"`). Deriving a key fills the placeholders by name from a
//! [`LookupParams`] bag, optionally coercing every value to an integer first.
//! Since substitution is by name and the bag is name-ordered, the same
//! values always produce the same key.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CachetError, CachetResult, ConfigError, KeyError, LookupParams, Scalar};

/// A derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed key template with `{name}` placeholders.
///
/// `{{` and `}}` render as literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    /// Parse a template, rejecting unbalanced braces and invalid names.
    pub fn parse(source: &str) -> Result<Self, KeyError> {
        let malformed = |reason: &str| KeyError::MalformedTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(malformed("unclosed placeholder"));
                    }
                    if name.is_empty() {
                        return Err(malformed("empty placeholder name"));
                    }
                    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(malformed("placeholder names must be [A-Za-z0-9_]"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Required placeholder names, in first-appearance order, deduplicated.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fill placeholders from `params`, which must supply exactly the
    /// placeholders this template names.
    pub fn render(&self, params: &LookupParams) -> Result<String, KeyError> {
        let placeholders = self.placeholders();
        if let Some(extra) = params.names().find(|name| !placeholders.contains(name)) {
            return Err(KeyError::UnexpectedParameter {
                template: self.source.clone(),
                param: extra.to_string(),
            });
        }

        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = params.get(name).ok_or_else(|| KeyError::MissingParameter {
                        template: self.source.clone(),
                        param: name.clone(),
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

/// Coerce every parameter to an integer when `int_only` is set.
///
/// The first value with no integer form fails with
/// [`KeyError::InvalidParameterType`].
pub fn coerce_params(params: &LookupParams, int_only: bool) -> Result<LookupParams, KeyError> {
    if !int_only || params.is_empty() {
        return Ok(params.clone());
    }
    params
        .iter()
        .map(|(name, value)| match value.to_int() {
            Some(i) => Ok((name.clone(), Scalar::Int(i))),
            None => Err(KeyError::InvalidParameterType {
                param: name.clone(),
                value: value.clone(),
            }),
        })
        .collect()
}

/// Registry of key templates by logical query name.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    templates: HashMap<String, KeyTemplate>,
    namespace: Option<String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every derived key with `"<namespace>:"`.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Register (or replace) a template under `name`.
    pub fn register(&mut self, name: impl Into<String>, template: &str) -> Result<(), KeyError> {
        let parsed = KeyTemplate::parse(template)?;
        self.templates.insert(name.into(), parsed);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_template(mut self, name: impl Into<String>, template: &str) -> Result<Self, KeyError> {
        self.register(name, template)?;
        Ok(self)
    }

    /// Load templates from a TOML table of `name = "template"` pairs.
    pub fn from_toml_str(source: &str) -> CachetResult<Self> {
        let table: BTreeMap<String, String> =
            toml::from_str(source).map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        let mut registry = Self::new();
        for (name, template) in &table {
            registry.register(name.clone(), template).map_err(CachetError::from)?;
        }
        Ok(registry)
    }

    pub fn template(&self, name: &str) -> Result<&KeyTemplate, KeyError> {
        self.templates.get(name).ok_or_else(|| KeyError::UnknownTemplate {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Derive the cache key for `template` filled from `params`.
    pub fn derive_key(
        &self,
        template: &str,
        params: &LookupParams,
        int_only: bool,
    ) -> Result<CacheKey, KeyError> {
        let template = self.template(template)?;
        let params = coerce_params(params, int_only)?;
        self.render(template, &params)
    }

    /// Derive a key from params that are already coerced.
    pub fn render(&self, template: &KeyTemplate, params: &LookupParams) -> Result<CacheKey, KeyError> {
        let rendered = template.render(params)?;
        Ok(match &self.namespace {
            Some(ns) => CacheKey(format!("{}:{}", ns, rendered)),
            None => CacheKey(rendered),
        })
    }
}
