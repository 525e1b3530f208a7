//! Filter expressions passed to the backing store.
//!
//! Lookup parameters become equality filters; membership fetches use `In`.
//! Stores that push filters down to a query engine translate these; the
//! in-memory store evaluates them with [`FilterExpr::matches`].

use crate::Scalar;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Filter operator for field comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
    /// Contains substring (for strings)
    Contains,
    /// In list of values
    In,
}

/// Right-hand side of a filter: a single value, or a list for `In`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: FilterValue,
}

impl FilterExpr {
    /// Create a new filter expression.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(field, FilterOperator::Eq, FilterValue::Scalar(value.into()))
    }

    /// Create a comparison filter with any scalar operator.
    pub fn compare(field: impl Into<String>, operator: FilterOperator, value: impl Into<Scalar>) -> Self {
        Self::new(field, operator, FilterValue::Scalar(value.into()))
    }

    /// Create a membership filter.
    pub fn is_in(field: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::List(values))
    }

    /// Create a contains filter.
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOperator::Contains,
            FilterValue::Scalar(Scalar::Text(needle.into())),
        )
    }

    /// Evaluate against a field value; a missing field never matches.
    pub fn matches(&self, actual: Option<&Scalar>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match (&self.operator, &self.value) {
            (FilterOperator::In, FilterValue::List(values)) => values
                .iter()
                .any(|v| compare_operand(actual, v) == Some(Ordering::Equal)),
            (FilterOperator::In, FilterValue::Scalar(v)) => {
                compare_operand(actual, v) == Some(Ordering::Equal)
            }
            (_, FilterValue::List(_)) => false,
            (FilterOperator::Contains, FilterValue::Scalar(Scalar::Text(needle))) => {
                matches!(actual, Scalar::Text(s) if s.contains(needle.as_str()))
            }
            (FilterOperator::Contains, FilterValue::Scalar(_)) => false,
            (op, FilterValue::Scalar(expected)) => {
                let ordering = compare_operand(actual, expected);
                match op {
                    FilterOperator::Eq => ordering == Some(Ordering::Equal),
                    FilterOperator::Ne => ordering != Some(Ordering::Equal),
                    FilterOperator::Gt => ordering == Some(Ordering::Greater),
                    FilterOperator::Lt => ordering == Some(Ordering::Less),
                    FilterOperator::Gte => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    FilterOperator::Lte => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                    }
                    FilterOperator::Contains | FilterOperator::In => false,
                }
            }
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.operator {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Lt => "<",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
            FilterOperator::Contains => " contains ",
            FilterOperator::In => " in ",
        };
        match &self.value {
            FilterValue::Scalar(v) => write!(f, "{}{}{}", self.field, op, v),
            FilterValue::List(vs) => {
                let rendered: Vec<String> = vs.iter().map(ToString::to_string).collect();
                write!(f, "{}{}[{}]", self.field, op, rendered.join(", "))
            }
        }
    }
}

/// Compare a field value with a filter operand, reading a text operand as the
/// field's kind the way a typed column would, and the reverse for text fields.
fn compare_operand(actual: &Scalar, operand: &Scalar) -> Option<Ordering> {
    match (actual, operand) {
        (Scalar::Int(_) | Scalar::Float(_), Scalar::Text(text)) => {
            let text = text.trim();
            let parsed = text
                .parse::<i64>()
                .map(Scalar::Int)
                .or_else(|_| text.parse::<f64>().map(Scalar::Float))
                .ok()?;
            actual.compare(&parsed)
        }
        (Scalar::Bool(_), Scalar::Text(text)) => {
            let parsed = text.trim().parse::<bool>().ok()?;
            actual.compare(&Scalar::Bool(parsed))
        }
        (Scalar::Text(text), Scalar::Int(_) | Scalar::Float(_) | Scalar::Bool(_)) => {
            Some(text.as_str().cmp(operand.to_string().as_str()))
        }
        _ => actual.compare(operand),
    }
}

/// Render a filter list for error messages and logs.
pub fn describe_filters(filters: &[FilterExpr]) -> String {
    let rendered: Vec<String> = filters.iter().map(ToString::to_string).collect();
    rendered.join(" AND ")
}
