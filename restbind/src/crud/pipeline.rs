use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::hooks::{apply, erase1, erase2, Hooks};
use super::page::{PageData, PageRequest};
use crate::bind::{IdParam, WithId};
use crate::context::RequestContext;
use crate::repository::{Entity, Repository, RepositoryError};
use crate::routes::{Routes, SignatureError};

/// CRUD operation, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudOperation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Get => write!(f, "get"),
            Self::List => write!(f, "list"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Which side of the repository call a hook runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    Pre,
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// A pipeline stage failed
///
/// The message of a hook failure is the hook's own message, so the client
/// sees exactly what the hook reported.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("{source}")]
    Hook {
        operation: CrudOperation,
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

impl CrudError {
    fn hook(operation: CrudOperation, stage: HookStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Hook {
            operation,
            stage,
            source,
        }
    }

    fn not_found<T: Entity>(id: &T::Id) -> Self {
        Self::NotFound {
            entity: T::NAME,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

struct CrudInner<T: Entity, R> {
    repo: R,
    hooks: Hooks<T>,
}

/// Hookable CRUD pipeline over one entity type
///
/// Every operation runs pre-hook, repository call, post-hook, in that order.
/// A failing stage stops the pipeline and its error is returned unchanged.
/// Hooks are fixed when the pipeline is built; clones share them.
///
/// # Example
///
/// ```rust
/// use restbind::prelude::*;
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
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let crud = Crud::builder(MemoryRepository::<Todo>::new())
///     .before_create(|_ctx, mut todo: Todo| async move {
///         todo.title = todo.title.trim().to_string();
///         Ok(todo)
///     })
///     .build();
///
/// let todo = crud
///     .create(RequestContext::default(), Todo { id: 0, title: "  milk ".into() })
///     .await
///     .unwrap();
/// assert_eq!(todo.id, 1);
/// assert_eq!(todo.title, "milk");
///
/// let mut routes = Routes::new();
/// crud.mount(&mut routes, "/todos").unwrap();
/// # }
/// ```
pub struct Crud<T: Entity, R> {
    inner: Arc<CrudInner<T, R>>,
}

impl<T: Entity, R> Clone for Crud<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> Crud<T, R>
where
    T: Entity,
    R: Repository<T>,
{
    /// A pipeline without hooks
    pub fn new(repo: R) -> Self {
        Self::builder(repo).build()
    }

    /// Start configuring hooks
    pub fn builder(repo: R) -> CrudBuilder<T, R> {
        CrudBuilder {
            repo,
            hooks: Hooks::default(),
        }
    }

    /// The underlying repository
    pub fn repository(&self) -> &R {
        &self.inner.repo
    }

    pub async fn create(&self, ctx: RequestContext, item: T) -> Result<T, CrudError> {
        let hooks = &self.inner.hooks;
        let item = apply(&hooks.before_create, (ctx.clone(), item), |(_, item)| item)
            .await
            .map_err(CrudError::hook(CrudOperation::Create, HookStage::Pre))?;

        let stored = self.inner.repo.insert(item).await?;
        tracing::trace!(entity = T::NAME, id = %stored.id(), "created");

        apply(&hooks.after_create, (ctx, stored), |(_, item)| item)
            .await
            .map_err(CrudError::hook(CrudOperation::Create, HookStage::Post))
    }

    /// Fetch one row by the `{id}` path parameter
    ///
    /// A pre-hook returning `Some` supplies the row and skips the repository.
    pub async fn get(&self, ctx: RequestContext, param: IdParam<T::Id>) -> Result<T, CrudError> {
        let hooks = &self.inner.hooks;
        let id = param.id;
        let supplied = apply(&hooks.before_get, (ctx.clone(), id.clone()), |_| None)
            .await
            .map_err(CrudError::hook(CrudOperation::Get, HookStage::Pre))?;

        let item = match supplied {
            Some(item) => item,
            None => self
                .inner
                .repo
                .find_by_id(&id)
                .await?
                .ok_or_else(|| CrudError::not_found::<T>(&id))?,
        };

        apply(&hooks.after_get, (ctx, id, item), |(_, _, item)| item)
            .await
            .map_err(CrudError::hook(CrudOperation::Get, HookStage::Post))
    }

    /// Count and fetch one page
    ///
    /// The count and the fetch are separate repository calls, so a concurrent
    /// write between them can make `total` disagree with the rows returned.
    pub async fn list(
        &self,
        ctx: RequestContext,
        req: PageRequest,
    ) -> Result<PageData<T>, CrudError> {
        let hooks = &self.inner.hooks;
        let req = apply(&hooks.before_list, (ctx.clone(), req), |(_, req)| req)
            .await
            .map_err(CrudError::hook(CrudOperation::List, HookStage::Pre))?;

        let repo = &self.inner.repo;
        let total = repo.count(&req.filters).await?;
        let items = repo
            .find_all(&req.filters, req.order(), Some(req.pagination()))
            .await?;
        tracing::trace!(entity = T::NAME, total, returned = items.len(), "listed");

        apply(&hooks.after_list, (ctx, PageData { total, items }), |(_, page)| page)
            .await
            .map_err(CrudError::hook(CrudOperation::List, HookStage::Post))
    }

    /// Write the non-zero fields of the item to the row named by `{id}`
    pub async fn update(
        &self,
        ctx: RequestContext,
        input: WithId<T::Id, T>,
    ) -> Result<T, CrudError> {
        let hooks = &self.inner.hooks;
        let (id, item) = input.into_parts();
        let item = apply(
            &hooks.before_update,
            (ctx.clone(), id.clone(), item),
            |(_, _, item)| item,
        )
        .await
        .map_err(CrudError::hook(CrudOperation::Update, HookStage::Pre))?;

        let stored = self.inner.repo.update(&id, item).await?;
        tracing::trace!(entity = T::NAME, %id, "updated");

        apply(&hooks.after_update, (ctx, id, stored), |(_, _, item)| item)
            .await
            .map_err(CrudError::hook(CrudOperation::Update, HookStage::Post))
    }

    pub async fn delete(&self, ctx: RequestContext, param: IdParam<T::Id>) -> Result<(), CrudError> {
        let hooks = &self.inner.hooks;
        let id = param.id;
        apply(&hooks.before_delete, (ctx.clone(), id.clone()), |_| ())
            .await
            .map_err(CrudError::hook(CrudOperation::Delete, HookStage::Pre))?;

        if !self.inner.repo.delete(&id).await? {
            return Err(CrudError::not_found::<T>(&id));
        }
        tracing::trace!(entity = T::NAME, %id, "deleted");

        apply(&hooks.after_delete, (ctx, id), |_| ())
            .await
            .map_err(CrudError::hook(CrudOperation::Delete, HookStage::Post))
    }

    /// Register the six CRUD routes under `path`
    ///
    /// | method | path        | operation |
    /// |--------|-------------|-----------|
    /// | POST   | `P`         | create    |
    /// | GET    | `P`         | list      |
    /// | PUT    | `P/{id}`    | update    |
    /// | POST   | `P/{id}`    | update    |
    /// | GET    | `P/{id}`    | get       |
    /// | DELETE | `P/{id}`    | delete    |
    pub fn mount<S>(&self, routes: &mut Routes<S>, path: &str) -> Result<(), SignatureError>
    where
        S: Clone + Send + Sync + 'static,
    {
        let trimmed = path.trim_end_matches('/');
        let collection = if trimmed.is_empty() { "/" } else { trimmed };
        let member = format!("{}/{{id}}", trimmed);

        let crud = self.clone();
        routes.post(collection, move |ctx: RequestContext, item: T| {
            let crud = crud.clone();
            async move { crud.create(ctx, item).await }
        })?;

        let crud = self.clone();
        routes.get(collection, move |ctx: RequestContext, req: PageRequest| {
            let crud = crud.clone();
            async move { crud.list(ctx, req).await }
        })?;

        let crud = self.clone();
        let update = move |ctx: RequestContext, input: WithId<T::Id, T>| {
            let crud = crud.clone();
            async move { crud.update(ctx, input).await }
        };
        routes.put(&member, update.clone())?;
        routes.post(&member, update)?;

        let crud = self.clone();
        routes.get(&member, move |ctx: RequestContext, param: IdParam<T::Id>| {
            let crud = crud.clone();
            async move { crud.get(ctx, param).await }
        })?;

        let crud = self.clone();
        routes.delete(&member, move |ctx: RequestContext, param: IdParam<T::Id>| {
            let crud = crud.clone();
            async move { crud.delete(ctx, param).await }
        })?;

        tracing::debug!(entity = T::NAME, path = collection, "mounted CRUD routes");
        Ok(())
    }
}

/// Collects hooks for a [`Crud`] pipeline
///
/// Every setter replaces a previously set hook for the same slot.
pub struct CrudBuilder<T: Entity, R> {
    repo: R,
    hooks: Hooks<T>,
}

impl<T, R> CrudBuilder<T, R>
where
    T: Entity,
    R: Repository<T>,
{
    #[must_use]
    pub fn before_create<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.hooks.before_create = Some(erase1(hook));
        self
    }

    #[must_use]
    pub fn after_create<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.hooks.after_create = Some(erase1(hook));
        self
    }

    /// Runs before the fetch; returning `Some(row)` skips the repository
    #[must_use]
    pub fn before_get<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send + 'static,
    {
        self.hooks.before_get = Some(erase1(hook));
        self
    }

    #[must_use]
    pub fn after_get<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.hooks.after_get = Some(erase2(hook));
        self
    }

    /// Runs before count and fetch; may add filters or rewrite paging
    #[must_use]
    pub fn before_list<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PageRequest>> + Send + 'static,
    {
        self.hooks.before_list = Some(erase1(hook));
        self
    }

    #[must_use]
    pub fn after_list<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, PageData<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PageData<T>>> + Send + 'static,
    {
        self.hooks.after_list = Some(erase1(hook));
        self
    }

    #[must_use]
    pub fn before_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.hooks.before_update = Some(erase2(hook));
        self
    }

    #[must_use]
    pub fn after_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.hooks.after_update = Some(erase2(hook));
        self
    }

    #[must_use]
    pub fn before_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.before_delete = Some(erase1(hook));
        self
    }

    #[must_use]
    pub fn after_delete<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext, T::Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.after_delete = Some(erase1(hook));
        self
    }

    /// Freeze the hooks
    pub fn build(self) -> Crud<T, R> {
        tracing::debug!(entity = T::NAME, hooks = self.hooks.installed(), "built CRUD pipeline");
        Crud {
            inner: Arc::new(CrudInner {
                repo: self.repo,
                hooks: self.hooks,
            }),
        }
    }
}

/// Create the entity's storage, then mount a hook-free pipeline under `path`
pub async fn mount_crud<T, R, S>(
    routes: &mut Routes<S>,
    path: &str,
    repo: R,
) -> crate::Result<Crud<T, R>>
where
    T: Entity,
    R: Repository<T>,
    S: Clone + Send + Sync + 'static,
{
    repo.sync().await?;
    let crud = Crud::new(repo);
    crud.mount(routes, path)?;
    Ok(crud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::FieldTags;
    use crate::repository::{FilterCondition, MemoryRepository};
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Person {
        id: i64,
        name: String,
        age: i64,
    }

    impl FieldTags for Person {}

    impl Entity for Person {
        type Id = i64;
        const NAME: &'static str = "Person";
        const TABLE: &'static str = "people";

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    fn person(name: &str, age: i64) -> Person {
        Person {
            id: 0,
            name: name.to_string(),
            age,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::default()
    }

    #[tokio::test]
    async fn test_create_hook_order() {
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .before_create(|_ctx, mut p: Person| async move {
                p.name = p.name.to_uppercase();
                Ok(p)
            })
            .after_create(|_ctx, mut p: Person| async move {
                p.name.push('!');
                Ok(p)
            })
            .build();

        let created = crud.create(ctx(), person("a", 1)).await.unwrap();
        assert_eq!(created.name, "A!");

        let stored = crud.repository().find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "A");
    }

    #[tokio::test]
    async fn test_pre_hook_failure_skips_repository() {
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .before_create(|_ctx, _p: Person| async move {
                Err::<Person, _>(anyhow::anyhow!("name is reserved"))
            })
            .build();

        let err = crud.create(ctx(), person("root", 1)).await.unwrap_err();
        assert_eq!(err.to_string(), "name is reserved");
        assert!(matches!(
            err,
            CrudError::Hook {
                operation: CrudOperation::Create,
                stage: HookStage::Pre,
                ..
            }
        ));
        assert!(crud.repository().is_empty().await);
    }

    #[tokio::test]
    async fn test_post_hook_failure_after_write() {
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .after_delete(|_ctx, _id| async move { Err(anyhow::anyhow!("audit log down")) })
            .build();
        let created = crud.create(ctx(), person("a", 1)).await.unwrap();

        let err = crud
            .delete(ctx(), IdParam { id: created.id })
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::Hook { stage: HookStage::Post, .. }));
        assert!(crud.repository().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let crud = Crud::new(MemoryRepository::<Person>::new());
        let err = crud.get(ctx(), IdParam { id: 9 }).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Person 9 not found");
    }

    #[tokio::test]
    async fn test_get_pre_hook_short_circuits() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .before_get(|_ctx, id: i64| async move {
                Ok((id == 42).then(|| Person {
                    id,
                    name: "cached".into(),
                    age: 0,
                }))
            })
            .after_get(move |_ctx, id: i64, p: Person| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(id);
                    Ok(p)
                }
            })
            .build();

        let hit = crud.get(ctx(), IdParam { id: 42 }).await.unwrap();
        assert_eq!(hit.name, "cached");
        assert!(crud.get(ctx(), IdParam { id: 1 }).await.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_update_merges_and_runs_hooks() {
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .before_update(|_ctx, _id, mut p: Person| async move {
                p.name = p.name.trim().to_string();
                Ok(p)
            })
            .build();
        let created = crud.create(ctx(), person("a", 10)).await.unwrap();

        let patch = WithId {
            id: created.id,
            item: Person {
                id: 0,
                name: " ab ".into(),
                age: 0,
            },
        };
        let updated = crud.update(ctx(), patch).await.unwrap();
        assert_eq!(updated, Person { id: created.id, name: "ab".into(), age: 10 });
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let crud = Crud::new(MemoryRepository::<Person>::new());
        let patch = WithId {
            id: 5,
            item: person("x", 1),
        };
        let err = crud.update(ctx(), patch).await.unwrap_err();
        assert!(matches!(err, CrudError::Repository(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_row() {
        let crud = Crud::new(MemoryRepository::<Person>::new());
        let err = crud.delete(ctx(), IdParam { id: 3 }).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_pages_orders_and_filters() {
        let crud = Crud::builder(MemoryRepository::<Person>::new())
            .before_list(|_ctx, req: PageRequest| async move {
                Ok(req.with_filter(FilterCondition::gte("age", 18)))
            })
            .after_list(|_ctx, mut page: PageData<Person>| async move {
                for p in &mut page.items {
                    p.name = "redacted".into();
                }
                Ok(page)
            })
            .build();
        for (name, age) in [("a", 30), ("b", 12), ("c", 45), ("d", 18)] {
            crud.create(ctx(), person(name, age)).await.unwrap();
        }

        let req = PageRequest::new(1, 2).with_order("age", "desc");
        let page = crud.list(ctx(), req).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(
            page.items.iter().map(|p| p.age).collect::<Vec<_>>(),
            vec![45, 30]
        );
        assert!(page.items.iter().all(|p| p.name == "redacted"));

        let page = crud
            .list(ctx(), PageRequest::new(2, 2).with_order("age", "asc"))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].age, 45);
    }

    #[test]
    fn test_mount_registers_six_routes() {
        let crud = Crud::new(MemoryRepository::<Person>::new());
        let mut routes = Routes::new();
        crud.mount(&mut routes, "/people/").unwrap();

        let registered: Vec<_> = routes.registered().collect();
        assert_eq!(
            registered,
            vec![
                ("DELETE", "/people/{id}"),
                ("GET", "/people"),
                ("GET", "/people/{id}"),
                ("POST", "/people"),
                ("POST", "/people/{id}"),
                ("PUT", "/people/{id}"),
            ]
        );

        assert!(matches!(
            crud.mount(&mut routes, "/people"),
            Err(SignatureError::DuplicateRoute { .. })
        ));
    }
}
