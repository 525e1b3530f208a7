//! In-memory entity store for testing and embedding.

use std::cmp::Ordering;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use cachet_core::{
    describe_filters, CacheableEntity, CachetResult, FilterExpr, OrderBy, Projection, Row, Scalar,
    StorageError, StoreQuery,
};

use super::traits::EntityStore;

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::LockPoisoned
}

/// In-memory store keeping entities in insertion order.
///
/// Queries are evaluated with [`FilterExpr::matches`]; ordering uses
/// [`Scalar::sort_cmp`]. Unknown field names fail the way a schema-aware
/// store would.
#[derive(Debug)]
pub struct InMemoryStore<E: CacheableEntity> {
    entities: RwLock<Vec<E>>,
}

impl<E: CacheableEntity> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self {
            entities: RwLock::new(Vec::new()),
        }
    }
}

impl<E: CacheableEntity> InMemoryStore<E> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = E>) -> Self {
        Self {
            entities: RwLock::new(entities.into_iter().collect()),
        }
    }

    pub fn insert(&self, entity: E) -> CachetResult<()> {
        self.entities.write().map_err(poisoned)?.push(entity);
        Ok(())
    }

    pub fn extend(&self, entities: impl IntoIterator<Item = E>) -> CachetResult<()> {
        self.entities.write().map_err(poisoned)?.extend(entities);
        Ok(())
    }

    /// Remove every entity whose `field` equals `value`; returns how many.
    pub fn remove_where(&self, field: &str, value: &Scalar) -> CachetResult<usize> {
        let filter = FilterExpr::eq(field, value.clone());
        let mut entities = self.entities.write().map_err(poisoned)?;
        let before = entities.len();
        entities.retain(|e| !filter.matches(e.field(field).as_ref()));
        Ok(before - entities.len())
    }

    pub fn clear(&self) -> CachetResult<()> {
        self.entities.write().map_err(poisoned)?.clear();
        Ok(())
    }

    pub fn len(&self) -> CachetResult<usize> {
        Ok(self.entities.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> CachetResult<bool> {
        Ok(self.len()? == 0)
    }

    fn check_field(field: &str) -> Result<(), StorageError> {
        if E::has_field(field) {
            Ok(())
        } else {
            Err(StorageError::UnknownField {
                entity_type: E::entity_type(),
                field: field.to_string(),
            })
        }
    }

    fn check_query(query: &StoreQuery) -> Result<(), StorageError> {
        for expr in query.filter.iter().chain(query.exclude.iter()) {
            Self::check_field(&expr.field)?;
        }
        for order in &query.order_by {
            Self::check_field(&order.field)?;
        }
        if let Some(only) = &query.only {
            for field in only {
                Self::check_field(field)?;
            }
        }
        Ok(())
    }

    fn matches_all(entity: &E, filters: &[FilterExpr]) -> bool {
        filters
            .iter()
            .all(|expr| expr.matches(entity.field(&expr.field).as_ref()))
    }

    fn compare(a: &E, b: &E, order_by: &[OrderBy]) -> Ordering {
        for order in order_by {
            let left = a.field(&order.field).unwrap_or(Scalar::Null);
            let right = b.field(&order.field).unwrap_or(Scalar::Null);
            let ordering = left.sort_cmp(&right);
            let ordering = if order.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn run(&self, query: &StoreQuery) -> CachetResult<Vec<E>> {
        Self::check_query(query)?;
        let entities = self.entities.read().map_err(poisoned)?;
        let mut matched: Vec<E> = entities
            .iter()
            .filter(|e| Self::matches_all(e, &query.filter))
            .filter(|e| query.exclude.is_empty() || !Self::matches_all(e, &query.exclude))
            .cloned()
            .collect();
        drop(entities);

        if !query.order_by.is_empty() {
            matched.sort_by(|a, b| Self::compare(a, b, &query.order_by));
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

#[async_trait]
impl<E: CacheableEntity> EntityStore<E> for InMemoryStore<E> {
    async fn get_one(&self, query: &StoreQuery) -> CachetResult<E> {
        let lookup = StoreQuery::new(query.filter.clone()).with_only(query.only.clone());
        let mut matched = self.run(&lookup)?;
        match matched.len() {
            0 => Err(StorageError::NotFound {
                entity_type: E::entity_type(),
                criteria: describe_filters(&query.filter),
            }
            .into()),
            1 => Ok(matched.remove(0)),
            count => Err(StorageError::MultipleFound {
                entity_type: E::entity_type(),
                criteria: describe_filters(&query.filter),
                count,
            }
            .into()),
        }
    }

    async fn fetch(&self, query: &StoreQuery) -> CachetResult<Vec<E>> {
        self.run(query)
    }

    async fn fetch_values(&self, query: &StoreQuery, projection: &Projection) -> CachetResult<Vec<Row>> {
        for field in &projection.fields {
            Self::check_field(field)?;
        }
        let matched = self.run(query)?;
        Ok(matched
            .iter()
            .map(|e| {
                projection
                    .fields
                    .iter()
                    .map(|field| e.field(field).unwrap_or(Scalar::Null))
                    .collect()
            })
            .collect())
    }

    async fn fetch_by_membership(&self, field: &str, values: &[Scalar]) -> CachetResult<Vec<E>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        self.run(&StoreQuery::new(vec![FilterExpr::is_in(field, values.to_vec())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::{CachetError, FilterOperator};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        pk: i64,
        name: String,
        rank: i64,
    }

    impl CacheableEntity for Item {
        fn entity_type() -> &'static str {
            "item"
        }

        fn field_names() -> &'static [&'static str] {
            &["pk", "name", "rank"]
        }

        fn field(&self, name: &str) -> Option<Scalar> {
            match name {
                "pk" => Some(Scalar::Int(self.pk)),
                "name" => Some(Scalar::Text(self.name.clone())),
                "rank" => Some(Scalar::Int(self.rank)),
                _ => None,
            }
        }
    }

    fn item(pk: i64, name: &str, rank: i64) -> Item {
        Item {
            pk,
            name: name.to_string(),
            rank,
        }
    }

    fn store() -> InMemoryStore<Item> {
        InMemoryStore::with_entities(vec![
            item(1, "alpha", 3),
            item(2, "beta", 1),
            item(3, "gamma", 2),
            item(4, "beta", 5),
        ])
    }

    #[tokio::test]
    async fn test_get_one() {
        let found = store()
            .get_one(&StoreQuery::new(vec![FilterExpr::eq("pk", 3)]))
            .await
            .unwrap();
        assert_eq!(found.name, "gamma");
    }

    #[tokio::test]
    async fn test_get_one_not_found_and_multiple() {
        let s = store();
        let missing = s
            .get_one(&StoreQuery::new(vec![FilterExpr::eq("pk", 99)]))
            .await
            .unwrap_err();
        assert!(missing.is_not_found());

        let multiple = s
            .get_one(&StoreQuery::new(vec![FilterExpr::eq("name", "beta")]))
            .await
            .unwrap_err();
        assert!(matches!(
            multiple,
            CachetError::Storage(StorageError::MultipleFound { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_applies_exclude_order_limit() {
        let query = StoreQuery::new(vec![FilterExpr::compare("rank", FilterOperator::Gte, 2)])
            .with_exclude(vec![FilterExpr::eq("name", "alpha")])
            .with_order_by(vec![OrderBy::desc("rank")])
            .with_limit(Some(1));
        let result = store().fetch(&query).await.unwrap();
        assert_eq!(result, vec![item(4, "beta", 5)]);
    }

    #[tokio::test]
    async fn test_fetch_values_projects_rows() {
        let query = StoreQuery::new(vec![FilterExpr::eq("name", "beta")])
            .with_order_by(vec![OrderBy::asc("pk")]);
        let rows = store()
            .fetch_values(&query, &Projection::rows(["pk", "rank"]))
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Scalar::from(2), Scalar::from(1)],
                vec![Scalar::from(4), Scalar::from(5)],
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_by_membership() {
        let found = store()
            .fetch_by_membership("pk", &[Scalar::from(4), Scalar::from(1), Scalar::from(42)])
            .await
            .unwrap();
        let pks: Vec<i64> = found.iter().map(|i| i.pk).collect();
        assert_eq!(pks, vec![1, 4]);

        let none = store().fetch_by_membership("pk", &[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let err = store()
            .fetch(&StoreQuery::new(vec![FilterExpr::eq("colour", "red")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CachetError::Storage(StorageError::UnknownField { ref field, .. }) if field == "colour"
        ));
    }

    #[test]
    fn test_remove_where() {
        let s = store();
        assert_eq!(s.remove_where("name", &Scalar::from("beta")).unwrap(), 2);
        assert_eq!(s.len().unwrap(), 2);
    }
}
