//! Lookup parameters: the name → value bag that fills key templates and
//! doubles as equality filter criteria.

use crate::{FilterExpr, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// Named lookup parameters, kept in name order.
///
/// Ordering by name means two bags holding the same pairs are equal and
/// render identically no matter how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupParams(BTreeMap<String, Scalar>);

impl LookupParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-parameter bag, e.g. `LookupParams::single("pk", 7)`.
    pub fn single(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new().with(name, value)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Scalar> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge `other` into `self`; values in `other` win on name collision.
    pub fn merge(&mut self, other: &LookupParams) {
        for (name, value) in other.iter() {
            self.0.insert(name.clone(), value.clone());
        }
    }

    /// Each parameter as an equality filter.
    pub fn to_filters(&self) -> Vec<FilterExpr> {
        self.0
            .iter()
            .map(|(name, value)| FilterExpr::eq(name.clone(), value.clone()))
            .collect()
    }
}

impl fmt::Display for LookupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for LookupParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for LookupParams {
    type Item = (String, Scalar);
    type IntoIter = btree_map::IntoIter<String, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a LookupParams {
    type Item = (&'a String, &'a Scalar);
    type IntoIter = btree_map::Iter<'a, String, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
