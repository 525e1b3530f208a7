//! Store query description: filter, exclusion, ordering, limit and field
//! projection, applied by stores in that order.

use crate::{ConfigError, FilterExpr};
use serde::{Deserialize, Serialize};

/// Sort key for `ORDER BY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `"name"` (ascending) or `"-name"` (descending).
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(spec),
        }
    }
}

/// Value-only projection: return the listed fields instead of entities.
///
/// With `flat`, exactly one field is allowed and each row collapses to its
/// single value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub fields: Vec<String>,
    pub flat: bool,
}

impl Projection {
    pub fn rows<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            flat: false,
        }
    }

    pub fn flat(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
            flat: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "projection.fields".to_string(),
                value: "[]".to_string(),
                reason: "projection needs at least one field".to_string(),
            });
        }
        if self.flat && self.fields.len() != 1 {
            return Err(ConfigError::IncompatibleOptions {
                option_a: "projection.flat".to_string(),
                option_b: format!("{} projected fields", self.fields.len()),
            });
        }
        Ok(())
    }
}

/// A fully described store query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreQuery {
    /// All must match.
    pub filter: Vec<FilterExpr>,
    /// Rows matching all of these are removed.
    pub exclude: Vec<FilterExpr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    /// Field-load hint: only these fields need to be materialized.
    pub only: Option<Vec<String>>,
}

impl StoreQuery {
    pub fn new(filter: Vec<FilterExpr>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_exclude(mut self, exclude: Vec<FilterExpr>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_only(mut self, only: Option<Vec<String>>) -> Self {
        self.only = only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_parse() {
        assert_eq!(OrderBy::parse("-created"), OrderBy::desc("created"));
        assert_eq!(OrderBy::parse("name"), OrderBy::asc("name"));
    }

    #[test]
    fn test_projection_validate() {
        assert!(Projection::rows(["pk", "name"]).validate().is_ok());
        assert!(Projection::flat("pk").validate().is_ok());
        assert!(Projection::rows(Vec::<String>::new()).validate().is_err());

        let bad = Projection {
            fields: vec!["pk".to_string(), "name".to_string()],
            flat: true,
        };
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::IncompatibleOptions { .. })
        ));
    }

    #[test]
    fn test_store_query_builder() {
        let q = StoreQuery::new(vec![FilterExpr::eq("active", true)])
            .with_order_by(vec![OrderBy::desc("pk")])
            .with_limit(Some(5));
        assert_eq!(q.filter.len(), 1);
        assert_eq!(q.limit, Some(5));
        assert!(q.exclude.is_empty());
        assert!(q.only.is_none());
    }
}
