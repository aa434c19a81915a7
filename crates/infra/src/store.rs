//! Generic filter/condition storage interface.
//!
//! This is the abstract query/command surface the tenant interceptor hooks
//! into. Conditions address columns by their serialized field name; the
//! in-memory implementation evaluates them against the JSON form of each
//! row, which keeps it honest as a stand-in for a SQL backend in tests and
//! dev.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend itself failed (connection loss, poisoned lock, ...).
    #[error("store backend: {0}")]
    Backend(String),

    /// A row could not be encoded or decoded.
    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cmp {
    Eq,
    Ne,
    /// Substring match on string columns.
    Contains,
}

/// One `column <op> value` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: Cmp,
    pub value: JsonValue,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            column: column.into(),
            op: Cmp::Eq,
            value: serde_json::to_value(value).unwrap_or(JsonValue::Null),
        }
    }

    pub fn ne(column: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            column: column.into(),
            op: Cmp::Ne,
            value: serde_json::to_value(value).unwrap_or(JsonValue::Null),
        }
    }

    fn matches(&self, row: &JsonValue) -> bool {
        let field = row.get(&self.column).unwrap_or(&JsonValue::Null);
        match self.op {
            Cmp::Eq => field == &self.value,
            Cmp::Ne => field != &self.value,
            Cmp::Contains => match (field.as_str(), self.value.as_str()) {
                (Some(hay), Some(needle)) => hay.contains(needle),
                _ => false,
            },
        }
    }
}

/// Conjunction of conditions attached to an in-flight read/update/delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    conditions: Vec<Condition>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn has_condition(&self, condition: &Condition) -> bool {
        self.conditions.contains(condition)
    }

    /// Whether a row (in serialized form) satisfies every condition.
    pub fn matches(&self, row: &JsonValue) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// One `column = value` assignment of an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub column: String,
    pub value: JsonValue,
}

impl Assign {
    pub fn set(column: impl Into<String>, value: impl Serialize) -> Self {
        Self {
            column: column.into(),
            value: serde_json::to_value(value).unwrap_or(JsonValue::Null),
        }
    }
}

/// Generic storage collaborator for one entity type.
#[async_trait]
pub trait EntityStore<E>: Send + Sync {
    async fn find(&self, filter: &FilterSet) -> Result<Vec<E>, StoreError>;
    async fn insert(&self, rows: Vec<E>) -> Result<usize, StoreError>;
    async fn update(&self, filter: &FilterSet, set: &[Assign]) -> Result<u64, StoreError>;
    async fn delete(&self, filter: &FilterSet) -> Result<u64, StoreError>;
}

#[async_trait]
impl<E, S> EntityStore<E> for Arc<S>
where
    S: EntityStore<E> + ?Sized,
    E: Send + 'static,
{
    async fn find(&self, filter: &FilterSet) -> Result<Vec<E>, StoreError> {
        (**self).find(filter).await
    }

    async fn insert(&self, rows: Vec<E>) -> Result<usize, StoreError> {
        (**self).insert(rows).await
    }

    async fn update(&self, filter: &FilterSet, set: &[Assign]) -> Result<u64, StoreError> {
        (**self).update(filter, set).await
    }

    async fn delete(&self, filter: &FilterSet) -> Result<u64, StoreError> {
        (**self).delete(filter).await
    }
}

/// In-memory [`EntityStore`] for tests and dev.
#[derive(Debug)]
pub struct InMemoryStore<E> {
    rows: RwLock<Vec<E>>,
}

impl<E> InMemoryStore<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl<E> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend("store lock poisoned".into())
}

#[async_trait]
impl<E> EntityStore<E> for InMemoryStore<E>
where
    E: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn find(&self, filter: &FilterSet) -> Result<Vec<E>, StoreError> {
        let rows = self.rows.read().map_err(poisoned)?;
        let mut out = Vec::new();
        for row in rows.iter() {
            if filter.matches(&serde_json::to_value(row)?) {
                out.push(row.clone());
            }
        }
        Ok(out)
    }

    async fn insert(&self, mut new_rows: Vec<E>) -> Result<usize, StoreError> {
        let inserted = new_rows.len();
        let mut rows = self.rows.write().map_err(poisoned)?;
        rows.append(&mut new_rows);
        Ok(inserted)
    }

    async fn update(&self, filter: &FilterSet, set: &[Assign]) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let mut touched = 0u64;
        for row in rows.iter_mut() {
            let mut json = serde_json::to_value(&*row)?;
            if !filter.matches(&json) {
                continue;
            }
            if let Some(object) = json.as_object_mut() {
                for assign in set {
                    object.insert(assign.column.clone(), assign.value.clone());
                }
            }
            *row = serde_json::from_value(json)?;
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete(&self, filter: &FilterSet) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().map_err(poisoned)?;

        // Decide first, mutate second: a codec failure must not leave the
        // store half-deleted.
        let mut matched = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            matched.push(filter.matches(&serde_json::to_value(row)?));
        }

        let before = rows.len();
        let mut flags = matched.into_iter();
        rows.retain(|_| !flags.next().unwrap_or(false));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        label: String,
    }

    fn row(id: u32, label: &str) -> Row {
        Row {
            id,
            label: label.into(),
        }
    }

    #[tokio::test]
    async fn find_honours_every_condition() {
        let store = InMemoryStore::new();
        store
            .insert(vec![row(1, "alpha"), row(2, "beta"), row(3, "alpha")])
            .await
            .unwrap();

        let filter = FilterSet::new().and(Condition::eq("label", "alpha"));
        let got = store.find(&filter).await.unwrap();
        assert_eq!(got.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);

        let filter = filter.and(Condition::ne("id", 1));
        let got = store.find(&filter).await.unwrap();
        assert_eq!(got, vec![row(3, "alpha")]);
    }

    #[tokio::test]
    async fn contains_condition_on_strings() {
        let store = InMemoryStore::new();
        store
            .insert(vec![row(1, "system-admin"), row(2, "auditor")])
            .await
            .unwrap();

        let filter = FilterSet::new().and(Condition {
            column: "label".into(),
            op: Cmp::Contains,
            value: "admin".into(),
        });
        assert_eq!(store.find(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_assigns_only_matched_rows() {
        let store = InMemoryStore::new();
        store
            .insert(vec![row(1, "alpha"), row(2, "beta")])
            .await
            .unwrap();

        let filter = FilterSet::new().and(Condition::eq("id", 2));
        let touched = store
            .update(&filter, &[Assign::set("label", "gamma")])
            .await
            .unwrap();
        assert_eq!(touched, 1);

        let all = store.find(&FilterSet::new()).await.unwrap();
        assert_eq!(all, vec![row(1, "alpha"), row(2, "gamma")]);
    }

    #[tokio::test]
    async fn delete_returns_removed_count() {
        let store = InMemoryStore::new();
        store
            .insert(vec![row(1, "alpha"), row(2, "alpha"), row(3, "beta")])
            .await
            .unwrap();

        let filter = FilterSet::new().and(Condition::eq("label", "alpha"));
        assert_eq!(store.delete(&filter).await.unwrap(), 2);
        assert_eq!(store.find(&FilterSet::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_column_matches_nothing_for_eq() {
        let store = InMemoryStore::new();
        store.insert(vec![row(1, "alpha")]).await.unwrap();

        let filter = FilterSet::new().and(Condition::eq("tenant_id", 5));
        assert!(store.find(&filter).await.unwrap().is_empty());
    }
}
