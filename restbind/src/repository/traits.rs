//! Entity and repository traits
//!
//! [`Entity`] describes a persisted type; [`Repository`] is the persistence
//! contract the CRUD pipeline drives. Both are generic over the entity so a
//! single backend implementation serves every entity type.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{FilterCondition, OrderDirection, Pagination, RepositoryError};
use crate::bind::FieldTags;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A type persisted through a [`Repository`]
///
/// Entities are plain serde structs. Their serialized field names are the
/// storage column names, and `Default` provides the zero value used both for
/// binding and for deriving a table layout.
///
/// # Example
///
/// ```rust
/// use restbind::bind::FieldTags;
/// use restbind::repository::Entity;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Todo {
///     id: i64,
///     title: String,
///     done: bool,
/// }
///
/// impl FieldTags for Todo {}
///
/// impl Entity for Todo {
///     type Id = i64;
///     const NAME: &'static str = "Todo";
///     const TABLE: &'static str = "todos";
///
///     fn id(&self) -> i64 {
///         self.id
///     }
///
///     fn set_id(&mut self, id: i64) {
///         self.id = id;
///     }
/// }
/// ```
pub trait Entity: FieldTags + Clone + Sync {
    /// Primary key type
    ///
    /// `Default` doubles as "unassigned": inserting an entity whose id equals
    /// the default lets the backend generate one.
    type Id: Clone
        + Eq
        + Ord
        + Hash
        + Default
        + Debug
        + Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Human-readable entity name, used in errors and logs
    const NAME: &'static str;

    /// Storage table name
    const TABLE: &'static str;

    /// Serialized name of the primary key field
    const ID_FIELD: &'static str = "id";

    /// Current primary key
    fn id(&self) -> Self::Id;

    /// Replace the primary key
    fn set_id(&mut self, id: Self::Id);
}

/// Persistence contract for one entity type
///
/// Methods return `impl Future + Send` so implementations can be written with
/// `async fn` and shared across request tasks.
pub trait Repository<T: Entity>: Send + Sync + 'static {
    /// Make sure the backing storage exists
    ///
    /// Backends without a schema keep the default no-op.
    fn sync(&self) -> impl Future<Output = RepositoryResult<()>> + Send {
        async { Ok(()) }
    }

    /// Insert an entity and return it as stored (with its assigned id)
    fn insert(&self, item: T) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Find an entity by its unique identifier
    ///
    /// Returns `Ok(None)` when no row matches.
    fn find_by_id(&self, id: &T::Id) -> impl Future<Output = RepositoryResult<Option<T>>> + Send;

    /// Update the row with `id`, writing only the non-zero fields of `item`
    ///
    /// Returns the full stored row after the update. A missing row is a
    /// `NotFound` error.
    fn update(&self, id: &T::Id, item: T) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Delete the row with `id`, returning whether a row was removed
    fn delete(&self, id: &T::Id) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Count rows matching all `filters`
    fn count(&self, filters: &[FilterCondition])
        -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Fetch rows matching all `filters`, optionally ordered and paginated
    fn find_all(
        &self,
        filters: &[FilterCondition],
        order_by: Option<(&str, OrderDirection)>,
        pagination: Option<Pagination>,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;
}
