//! # restbind
//!
//! Register plain typed async functions as axum handlers.
//!
//! A handler is an `async fn(RequestContext[, Input]) -> Result<Output, E>`.
//! The router binds the input from the query string, path parameters, and
//! body, calls the function, and writes one uniform JSON envelope:
//!
//! ```json
//! {"status": 0, "msg": "", "data": {"id": 1, "name": "a"}}
//! ```
//!
//! ## Features
//!
//! - **Binding**: query, then path, then body, with weak string coercion
//! - **Typed handlers**: the handler shape is checked at compile time
//! - **Envelopes**: status `0` on success, `400` for bind errors, `500` for handler errors
//! - **CRUD pipelines**: pre-hook, repository call, post-hook for every operation
//! - **Repositories**: in-memory and SQLite (`sqlite` feature, on by default)
//! - **Server**: layered config, JSON tracing, request ids, graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use restbind::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl FieldTags for Person {}
//!
//! impl Entity for Person {
//!     type Id = i64;
//!     const NAME: &'static str = "Person";
//!     const TABLE: &'static str = "people";
//!
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: i64) {
//!         self.id = id;
//!     }
//! }
//!
//! async fn health(_ctx: RequestContext) -> anyhow::Result<&'static str> {
//!     Ok("ok")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let mut routes = Routes::new().with_body_limit(config.middleware.body_limit_bytes());
//!     routes.get("/health", health)?;
//!     mount_crud(&mut routes, "/people", MemoryRepository::<Person>::new()).await?;
//!
//!     Server::new(config).serve(routes.into_router()).await
//! }
//! ```

pub mod adapter;
pub mod bind;
pub mod config;
pub mod context;
pub mod crud;
#[cfg(feature = "sqlite")]
pub mod database;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod repository;
pub mod routes;
pub mod server;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{DispatchError, HandlerDescriptor, TargetError, TypedHandler};
    pub use crate::bind::{BindError, BindPhase, BindSources, Bindable, FieldTags, IdParam, WithId};
    pub use crate::config::{Config, DatabaseConfig};
    pub use crate::context::RequestContext;
    pub use crate::crud::{
        mount_crud, Crud, CrudBuilder, CrudError, CrudOperation, HookStage, PageData, PageRequest,
    };
    pub use crate::envelope::{Envelope, Status};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::repository::{
        Entity, FilterCondition, MemoryRepository, OrderDirection, Pagination, Repository,
        RepositoryError, RepositoryResult,
    };
    pub use crate::routes::{Routes, SignatureError};
    pub use crate::server::Server;

    #[cfg(feature = "sqlite")]
    pub use crate::database::connect;
    #[cfg(feature = "sqlite")]
    pub use crate::repository::SqliteRepository;
}
