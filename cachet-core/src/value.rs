//! Scalar values used for lookup parameters, identifiers and projected fields.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A primitive value that can appear in a key, a filter or a projection.
///
/// Floats compare and hash by bit pattern so a `Scalar` can key a map.
/// Use [`Scalar::compare`] for the numeric ordering used by store filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// One projected row of field values.
pub type Row = Vec<Scalar>;

impl Scalar {
    /// Coerce to an integer the way lookup parameters are coerced.
    ///
    /// `Text` is trimmed and parsed as base 10; finite floats truncate toward
    /// zero; booleans map to 0/1. `Null` and non-finite floats have no
    /// integer form.
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            Scalar::Bool(b) => Some(i64::from(*b)),
            Scalar::Float(f) if f.is_finite() => {
                let truncated = f.trunc();
                if truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64 {
                    Some(truncated as i64)
                } else {
                    None
                }
            }
            Scalar::Float(_) => None,
            Scalar::Text(s) => s.trim().parse::<i64>().ok(),
            Scalar::Null => None,
        }
    }

    /// Ordering across comparable values; `Int` and `Float` compare numerically.
    ///
    /// Returns `None` for values of unrelated kinds.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => Some(Ordering::Equal),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Float(b)) => (*a as f64).partial_cmp(b),
            (Scalar::Float(a), Scalar::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Sort ordering for `ORDER BY`: nulls first, then by kind, then by value.
    pub fn sort_cmp(&self, other: &Scalar) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.kind_rank().cmp(&other.kind_rank()))
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::Text(_) => 3,
        }
    }

    /// Convert a JSON value; arrays and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Scalar> {
        match value {
            serde_json::Value::Null => Some(Scalar::Null),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Null => {}
            Scalar::Bool(b) => b.hash(state),
            Scalar::Int(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_to_int_coercions() {
        assert_eq!(Scalar::from(42).to_int(), Some(42));
        assert_eq!(Scalar::from("42").to_int(), Some(42));
        assert_eq!(Scalar::from(" -7 ").to_int(), Some(-7));
        assert_eq!(Scalar::from("+3").to_int(), Some(3));
        assert_eq!(Scalar::from(3.9).to_int(), Some(3));
        assert_eq!(Scalar::from(-3.9).to_int(), Some(-3));
        assert_eq!(Scalar::from(true).to_int(), Some(1));
        assert_eq!(Scalar::from("abc").to_int(), None);
        assert_eq!(Scalar::from("4.2").to_int(), None);
        assert_eq!(Scalar::Null.to_int(), None);
        assert_eq!(Scalar::Float(f64::NAN).to_int(), None);
        assert_eq!(Scalar::Float(f64::INFINITY).to_int(), None);
    }

    #[test]
    fn test_display_renders_key_fragments() {
        assert_eq!(Scalar::from(7).to_string(), "7");
        assert_eq!(Scalar::from("alice").to_string(), "alice");
        assert_eq!(Scalar::from(false).to_string(), "false");
        assert_eq!(Scalar::Null.to_string(), "null");
        assert_eq!(Scalar::from(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_compare_numeric_across_kinds() {
        assert_eq!(Scalar::from(2).compare(&Scalar::from(2.0)), Some(Ordering::Equal));
        assert_eq!(Scalar::from(1).compare(&Scalar::from(1.5)), Some(Ordering::Less));
        assert_eq!(Scalar::from("a").compare(&Scalar::from(1)), None);
    }

    #[test]
    fn test_sort_cmp_puts_nulls_first() {
        let mut values = vec![Scalar::from("b"), Scalar::Null, Scalar::from(3), Scalar::from("a")];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![Scalar::Null, Scalar::from(3), Scalar::from("a"), Scalar::from("b")]
        );
    }

    #[test]
    fn test_hash_and_eq_are_consistent() {
        let mut set = HashSet::new();
        set.insert(Scalar::from(1));
        set.insert(Scalar::from(1));
        set.insert(Scalar::from("1"));
        set.insert(Scalar::from(1.0));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_json_round_trip_untagged() {
        let values = vec![
            Scalar::Null,
            Scalar::from(true),
            Scalar::from(12),
            Scalar::from(0.25),
            Scalar::from("x"),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,12,0.25,"x"]"#);
        let back: Vec<Scalar> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Scalar::from_json(&serde_json::json!(5)), Some(Scalar::Int(5)));
        assert_eq!(Scalar::from_json(&serde_json::json!("s")), Some(Scalar::from("s")));
        assert_eq!(Scalar::from_json(&serde_json::json!([1])), None);
    }
}
