//! Persistence contract and backends for the CRUD pipeline
//!
//! # Features
//!
//! - **Generic CRUD**: [`Repository`] for insert, read, partial update, delete
//! - **Filtering**: [`FilterCondition`] for building WHERE clauses
//! - **Pagination**: [`Pagination`] and [`OrderDirection`] for list queries
//! - **Backends**: [`MemoryRepository`] and, with the `sqlite` feature,
//!   [`SqliteRepository`]
//!
//! # Example
//!
//! ```rust,ignore
//! use restbind::repository::{Repository, SqliteRepository};
//!
//! let repo = SqliteRepository::<Todo>::new(pool);
//! repo.sync().await?;
//! let todo = repo.insert(Todo { title: "milk".into(), ..Default::default() }).await?;
//! ```

mod error;
mod memory;
mod pagination;
mod record;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;

pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use memory::MemoryRepository;
pub use pagination::{FilterCondition, FilterOperator, FilterValue, OrderDirection, Pagination};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;
pub use traits::{Entity, Repository, RepositoryResult};
