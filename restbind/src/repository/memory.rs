//! In-process repository backed by an ordered map
//!
//! Useful for tests, demos, and services whose data fits in memory. Filtering
//! and ordering operate on the serialized form of each entity, so they follow
//! the same field names as the SQLite backend.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;

use super::record::{self, Record};
use super::{
    Entity, FilterCondition, FilterOperator, OrderDirection, Pagination, Repository,
    RepositoryError, RepositoryOperation, RepositoryResult,
};

/// Repository keeping entities in a `BTreeMap` keyed by id
///
/// Entities inserted with the default id get the next value of an internal
/// counter, so `T::Id` must be constructible from `u64`.
///
/// # Example
///
/// ```rust
/// use restbind::repository::{Entity, MemoryRepository, Repository};
/// # use restbind::bind::FieldTags;
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// # struct Todo { id: i64, title: String }
/// # impl FieldTags for Todo {}
/// # impl Entity for Todo {
/// #     type Id = i64;
/// #     const NAME: &'static str = "Todo";
/// #     const TABLE: &'static str = "todos";
/// #     fn id(&self) -> i64 { self.id }
/// #     fn set_id(&mut self, id: i64) { self.id = id; }
/// # }
///
/// # tokio_test(async {
/// let repo = MemoryRepository::<Todo>::new();
/// let stored = repo.insert(Todo { id: 0, title: "milk".into() }).await.unwrap();
/// assert_eq!(stored.id, 1);
/// # });
/// # fn tokio_test<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct MemoryRepository<T: Entity> {
    rows: RwLock<BTreeMap<T::Id, T>>,
    next_id: AtomicU64,
}

impl<T: Entity> MemoryRepository<T> {
    /// Create an empty repository
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of stored entities
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the repository holds no entities
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn select<'a>(
        rows: &'a BTreeMap<T::Id, T>,
        filters: &[FilterCondition],
        operation: RepositoryOperation,
    ) -> RepositoryResult<Vec<(Record, &'a T)>> {
        let columns = record::columns::<T>(operation)?;
        for filter in filters {
            record::ensure_column(&columns, &filter.field, operation)?;
        }

        let mut matched = Vec::new();
        for item in rows.values() {
            let row = record::to_record(item, operation)?;
            let keep = filters
                .iter()
                .all(|filter| matches(filter, row.get(&filter.field).unwrap_or(&Value::Null)));
            if keep {
                matched.push((row, item));
            }
        }
        Ok(matched)
    }
}

impl<T: Entity> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Repository<T> for MemoryRepository<T>
where
    T: Entity,
    T::Id: TryFrom<u64>,
{
    async fn insert(&self, mut item: T) -> RepositoryResult<T> {
        let mut rows = self.rows.write().await;

        if item.id() == T::Id::default() {
            let id = loop {
                let next = self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                let candidate = T::Id::try_from(next).map_err(|_| {
                    RepositoryError::validation_failed(
                        RepositoryOperation::Insert,
                        format!("cannot assign id {} to {}", next, T::NAME),
                    )
                })?;
                if !rows.contains_key(&candidate) {
                    break candidate;
                }
            };
            item.set_id(id);
        } else if rows.contains_key(&item.id()) {
            return Err(RepositoryError::already_exists(T::NAME, item.id().to_string()));
        }

        trace!(entity = T::NAME, id = %item.id(), "memory insert");
        rows.insert(item.id(), item.clone());
        Ok(item)
    }

    async fn find_by_id(&self, id: &T::Id) -> RepositoryResult<Option<T>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn update(&self, id: &T::Id, item: T) -> RepositoryResult<T> {
        let operation = RepositoryOperation::Update;
        let patch = record::non_zero_fields(record::to_record(&item, operation)?, T::ID_FIELD);

        let mut rows = self.rows.write().await;
        let current = rows.get(id).ok_or_else(|| {
            RepositoryError::not_found(T::NAME, id.to_string()).with_operation(operation)
        })?;

        let mut merged = record::to_record(current, operation)?;
        merged.extend(patch);
        let updated: T = record::from_record(merged, operation)?;

        trace!(entity = T::NAME, id = %id, "memory update");
        rows.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: &T::Id) -> RepositoryResult<bool> {
        Ok(self.rows.write().await.remove(id).is_some())
    }

    async fn count(&self, filters: &[FilterCondition]) -> RepositoryResult<u64> {
        let rows = self.rows.read().await;
        let matched = Self::select(&rows, filters, RepositoryOperation::Count)?;
        Ok(matched.len() as u64)
    }

    async fn find_all(
        &self,
        filters: &[FilterCondition],
        order_by: Option<(&str, OrderDirection)>,
        pagination: Option<Pagination>,
    ) -> RepositoryResult<Vec<T>> {
        let operation = RepositoryOperation::FindAll;
        let rows = self.rows.read().await;
        let mut matched = Self::select(&rows, filters, operation)?;

        if let Some((field, direction)) = order_by {
            record::ensure_column(&record::columns::<T>(operation)?, field, operation)?;
            matched.sort_by(|(a, _), (b, _)| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match direction {
                    OrderDirection::Ascending => ordering,
                    OrderDirection::Descending => ordering.reverse(),
                }
            });
        }

        let (offset, limit) = match pagination {
            Some(p) => (
                usize::try_from(p.offset).unwrap_or(usize::MAX),
                usize::try_from(p.limit).unwrap_or(usize::MAX),
            ),
            None => (0, usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn matches(filter: &FilterCondition, value: &Value) -> bool {
    let targets = filter.value.to_json_values();
    match filter.operator {
        FilterOperator::IsNull => value.is_null(),
        FilterOperator::IsNotNull => !value.is_null(),
        // SQL comparisons against NULL never hold
        _ if value.is_null() => false,
        FilterOperator::Equal => targets.first().is_some_and(|t| loose_eq(value, t)),
        FilterOperator::NotEqual => targets.first().is_some_and(|t| !loose_eq(value, t)),
        FilterOperator::In => targets.iter().any(|t| loose_eq(value, t)),
        FilterOperator::Like => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            targets
                .first()
                .and_then(Value::as_str)
                .is_some_and(|pattern| like_match(&text, pattern))
        }
        FilterOperator::GreaterThan
        | FilterOperator::GreaterThanOrEqual
        | FilterOperator::LessThan
        | FilterOperator::LessThanOrEqual => {
            let Some(target) = targets.first() else {
                return false;
            };
            let ordering = match (as_number(value), as_number(target)) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ if rank(value) == rank(target) => Some(compare_values(value, target)),
                _ => None,
            };
            match ordering {
                Some(ordering) => match filter.operator {
                    FilterOperator::GreaterThan => ordering == Ordering::Greater,
                    FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
                    FilterOperator::LessThan => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            }
        }
    }
}

/// SQL `LIKE` with `%` and `_`, ASCII case-insensitive like SQLite
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < text.len() {
        if pi < pattern.len() && pattern[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < pattern.len() && (pattern[pi] == '_' || pattern[pi] == text[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((star, resume)) = backtrack {
            pi = star + 1;
            ti = resume + 1;
            backtrack = Some((star, resume + 1));
        } else {
            return false;
        }
    }
    pattern[pi..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::FieldTags;
    use crate::repository::RepositoryErrorKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: i64,
        title: String,
        priority: i32,
        done: bool,
    }

    impl FieldTags for Task {}

    impl Entity for Task {
        type Id = i64;
        const NAME: &'static str = "Task";
        const TABLE: &'static str = "tasks";

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn task(title: &str, priority: i32, done: bool) -> Task {
        Task {
            id: 0,
            title: title.to_string(),
            priority,
            done,
        }
    }

    async fn seeded() -> MemoryRepository<Task> {
        let repo = MemoryRepository::new();
        for (title, priority, done) in [
            ("buy milk", 2, false),
            ("walk dog", 5, true),
            ("write report", 3, false),
            ("Milk the cow", 1, false),
        ] {
            repo.insert(task(title, priority, done)).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let repo = seeded().await;
        assert_eq!(repo.len().await, 4);
        let first = repo.find_by_id(&1).await.unwrap().unwrap();
        assert_eq!(first.title, "buy milk");
        assert!(repo.find_by_id(&99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_with_explicit_id() {
        let repo = MemoryRepository::<Task>::new();
        let mut item = task("pinned", 1, false);
        item.id = 10;
        repo.insert(item.clone()).await.unwrap();

        let err = repo.insert(item).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_update_writes_only_non_zero_fields() {
        let repo = seeded().await;
        let patch = Task {
            id: 0,
            title: String::new(),
            priority: 9,
            done: false,
        };
        let updated = repo.update(&1, patch).await.unwrap();
        assert_eq!(updated.id, 1);
        assert_eq!(updated.title, "buy milk");
        assert_eq!(updated.priority, 9);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let repo = MemoryRepository::<Task>::new();
        let err = repo.update(&3, task("x", 1, true)).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.operation, RepositoryOperation::Update);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let repo = seeded().await;
        assert!(repo.delete(&2).await.unwrap());
        assert!(!repo.delete(&2).await.unwrap());
        assert_eq!(repo.len().await, 3);
    }

    #[tokio::test]
    async fn test_filters_and_count() {
        let repo = seeded().await;
        let open = [FilterCondition::eq("done", false)];
        assert_eq!(repo.count(&open).await.unwrap(), 3);

        let milk = [FilterCondition::like("title", "%milk%")];
        assert_eq!(repo.count(&milk).await.unwrap(), 2);

        let urgent = [
            FilterCondition::gte("priority", 3),
            FilterCondition::eq("done", false),
        ];
        let found = repo.find_all(&urgent, None, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "write report");

        let picked = [FilterCondition::in_integers("id", vec![1, 4])];
        assert_eq!(repo.count(&picked).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_order_and_paginate() {
        let repo = seeded().await;
        let page = repo
            .find_all(
                &[],
                Some(("priority", OrderDirection::Descending)),
                Some(Pagination::new(1, 2)),
            )
            .await
            .unwrap();
        let priorities: Vec<i32> = page.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let repo = seeded().await;
        let err = repo
            .find_all(&[], Some(("nope", OrderDirection::Ascending)), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);

        let err = repo
            .count(&[FilterCondition::eq("missing", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.operation, RepositoryOperation::Count);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("Buy Milk", "%milk"));
        assert!(like_match("abc", "a_c"));
        assert!(like_match("abc", "%"));
        assert!(!like_match("abc", "a_"));
        assert!(like_match("a%c", "a%c"));
        assert!(!like_match("", "_"));
    }
}
