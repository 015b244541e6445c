//! Pre and post hook storage

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::page::{PageData, PageRequest};
use crate::context::RequestContext;
use crate::repository::Entity;

/// A type-erased async hook taking its arguments as one tuple
pub(crate) type Hook<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<R>> + Send + Sync>;

pub(crate) fn erase1<A, R, F, Fut>(hook: F) -> Hook<(RequestContext, A), R>
where
    A: 'static,
    R: 'static,
    F: Fn(RequestContext, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    Arc::new(
        move |(ctx, a): (RequestContext, A)| -> BoxFuture<'static, anyhow::Result<R>> {
            Box::pin(hook(ctx, a))
        },
    )
}

pub(crate) fn erase2<A, B, R, F, Fut>(hook: F) -> Hook<(RequestContext, A, B), R>
where
    A: 'static,
    B: 'static,
    R: 'static,
    F: Fn(RequestContext, A, B) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    Arc::new(
        move |(ctx, a, b): (RequestContext, A, B)| -> BoxFuture<'static, anyhow::Result<R>> {
            Box::pin(hook(ctx, a, b))
        },
    )
}

/// Run `hook` on `args`, or produce the pass-through value when unset
pub(crate) async fn apply<A, R>(
    hook: &Option<Hook<A, R>>,
    args: A,
    pass: impl FnOnce(A) -> R,
) -> anyhow::Result<R> {
    match hook {
        Some(hook) => hook(args).await,
        None => Ok(pass(args)),
    }
}

pub(crate) struct Hooks<T: Entity> {
    pub before_create: Option<Hook<(RequestContext, T), T>>,
    pub after_create: Option<Hook<(RequestContext, T), T>>,
    pub before_get: Option<Hook<(RequestContext, T::Id), Option<T>>>,
    pub after_get: Option<Hook<(RequestContext, T::Id, T), T>>,
    pub before_list: Option<Hook<(RequestContext, PageRequest), PageRequest>>,
    pub after_list: Option<Hook<(RequestContext, PageData<T>), PageData<T>>>,
    pub before_update: Option<Hook<(RequestContext, T::Id, T), T>>,
    pub after_update: Option<Hook<(RequestContext, T::Id, T), T>>,
    pub before_delete: Option<Hook<(RequestContext, T::Id), ()>>,
    pub after_delete: Option<Hook<(RequestContext, T::Id), ()>>,
}

impl<T: Entity> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            before_create: None,
            after_create: None,
            before_get: None,
            after_get: None,
            before_list: None,
            after_list: None,
            before_update: None,
            after_update: None,
            before_delete: None,
            after_delete: None,
        }
    }
}

impl<T: Entity> Hooks<T> {
    /// Number of installed hooks
    pub fn installed(&self) -> usize {
        [
            self.before_create.is_some(),
            self.after_create.is_some(),
            self.before_get.is_some(),
            self.after_get.is_some(),
            self.before_list.is_some(),
            self.after_list.is_some(),
            self.before_update.is_some(),
            self.after_update.is_some(),
            self.before_delete.is_some(),
            self.after_delete.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}
