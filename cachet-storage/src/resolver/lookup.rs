//! Per-query lookup description and resolution results.

use cachet_core::{ConfigError, LookupParams, OrderBy, Projection, Row, Scalar};
use serde::{Deserialize, Serialize};

/// How many entities a lookup expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Exactly one entity; none is `NotFound`, several is `MultipleFound`.
    One,
    /// An ordered list of entities (possibly empty).
    #[default]
    Many,
}

/// Options recognized by a lookup, with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    pub mode: Mode,
    /// Field-load hint forwarded to the store.
    pub only: Option<Vec<String>>,
    /// Value-only projection instead of full entities.
    pub projection: Option<Projection>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Collapse `NotFound` and `InvalidParameterType` into "no result".
    pub suppress_errors: bool,
    /// Integer coercion of key parameters; `None` uses the resolver default.
    pub int_only: Option<bool>,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Many,
            only: None,
            projection: None,
            order_by: Vec::new(),
            limit: None,
            suppress_errors: true,
            int_only: None,
        }
    }
}

impl LookupOptions {
    /// Reject option combinations that have no meaning.
    ///
    /// Ordering and limits only apply to list lookups.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(projection) = &self.projection {
            projection.validate()?;
        }
        if self.mode == Mode::One {
            if !self.order_by.is_empty() {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: "mode=one".to_string(),
                    option_b: "order_by".to_string(),
                });
            }
            if self.limit.is_some() {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: "mode=one".to_string(),
                    option_b: "limit".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One logical cache-aside query.
///
/// `params` both fill the key template and filter the store. `const_params`
/// only filter the store: they are not part of the key, so their value must
/// stay constant for as long as entries under that key live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    /// Registered key template name.
    pub template: String,
    pub params: LookupParams,
    pub const_params: LookupParams,
    /// Exclusion criteria (list lookups only).
    pub exclude: LookupParams,
    pub options: LookupOptions,
}

impl Lookup {
    pub fn new(template: impl Into<String>, params: LookupParams, mode: Mode) -> Self {
        Self {
            template: template.into(),
            params,
            const_params: LookupParams::new(),
            exclude: LookupParams::new(),
            options: LookupOptions {
                mode,
                ..LookupOptions::default()
            },
        }
    }

    /// Single-entity lookup.
    pub fn one(template: impl Into<String>, params: LookupParams) -> Self {
        Self::new(template, params, Mode::One)
    }

    /// List lookup.
    pub fn many(template: impl Into<String>, params: LookupParams) -> Self {
        Self::new(template, params, Mode::Many)
    }

    pub fn with_const(mut self, const_params: LookupParams) -> Self {
        self.const_params = const_params;
        self
    }

    pub fn with_exclude(mut self, exclude: LookupParams) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.only = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.options.projection = Some(projection);
        self
    }

    /// Order by field specs; `"-field"` sorts descending.
    pub fn with_order_by<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.order_by = specs.into_iter().map(|s| OrderBy::parse(s.as_ref())).collect();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn with_suppress_errors(mut self, suppress: bool) -> Self {
        self.options.suppress_errors = suppress;
        self
    }

    pub fn with_int_only(mut self, int_only: bool) -> Self {
        self.options.int_only = Some(int_only);
        self
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    /// Validate options, including exclusion on single-entity lookups.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        if self.options.mode == Mode::One && !self.exclude.is_empty() {
            return Err(ConfigError::IncompatibleOptions {
                option_a: "mode=one".to_string(),
                option_b: "exclude".to_string(),
            });
        }
        Ok(())
    }
}

/// The result of a resolved lookup, shaped by mode and projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<E> {
    /// `Mode::One`, no projection.
    One(E),
    /// `Mode::Many`, no projection.
    Many(Vec<E>),
    /// `Mode::One`, row projection.
    Row(Row),
    /// `Mode::One`, flat projection.
    Value(Scalar),
    /// `Mode::Many`, row projection.
    Rows(Vec<Row>),
    /// `Mode::Many`, flat projection.
    Values(Vec<Scalar>),
}

impl<E> Resolved<E> {
    pub fn into_one(self) -> Option<E> {
        match self {
            Resolved::One(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<E>> {
        match self {
            Resolved::Many(es) => Some(es),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            Resolved::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Scalar> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Resolved::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<Scalar>> {
        match self {
            Resolved::Values(vs) => Some(vs),
            _ => None,
        }
    }
}
