//! Hookable CRUD pipelines
//!
//! A [`Crud`] pipeline wraps a [`Repository`](crate::repository::Repository)
//! and runs an optional pre-hook and post-hook around every repository call.
//! Mount it on [`Routes`](crate::routes::Routes) to expose the standard
//! create, list, get, update, and delete endpoints.

mod hooks;
mod page;
mod pipeline;

pub use page::{PageData, PageRequest, DEFAULT_PER_PAGE};
pub use pipeline::{mount_crud, Crud, CrudBuilder, CrudError, CrudOperation, HookStage};
