//! Example: CRUD service over SQLite with hooks
//!
//! Mounts `/todos` backed by SQLite, validates titles in a pre-hook, hides
//! finished items from lists unless `?all=1` is given, and adds a typed
//! `/todos/stats` handler next to the generated routes.
//!
//! Run with: cargo run --example crud-server
//!
//! Then:
//!   curl -X POST localhost:8080/todos -d '{"title":"milk"}' -H 'content-type: application/json'
//!   curl 'localhost:8080/todos?page=1&orderBy=id&orderDir=desc'
//!   curl -X PUT localhost:8080/todos/1 -d 'done=true' -H 'content-type: application/x-www-form-urlencoded'
//!   curl localhost:8080/todos/stats

use restbind::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Todo {
    id: i64,
    title: String,
    done: bool,
}

impl FieldTags for Todo {}

impl Entity for Todo {
    type Id = i64;
    const NAME: &'static str = "Todo";
    const TABLE: &'static str = "todos";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Serialize)]
struct Stats {
    open: u64,
    done: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load_for_service("crud-server")?;
    let database = config
        .database
        .get_or_insert_with(|| DatabaseConfig::new("sqlite://todos.db?mode=rwc"))
        .clone();
    init_tracing(&config)?;

    let pool = connect(&database).await?;
    let repo = SqliteRepository::<Todo>::new(pool);
    repo.sync().await?;

    let crud = Crud::builder(repo)
        .before_create(|_ctx, mut todo: Todo| async move {
            todo.title = todo.title.trim().to_string();
            if todo.title.is_empty() {
                anyhow::bail!("title must not be empty");
            }
            Ok(todo)
        })
        .before_list(|ctx: RequestContext, req: PageRequest| async move {
            let all = ctx.query().is_some_and(|q| q.contains("all=1"));
            Ok(if all {
                req
            } else {
                req.with_filter(FilterCondition::eq("done", false))
            })
        })
        .build();

    let mut routes = Routes::new().with_body_limit(config.middleware.body_limit_bytes());

    let stats_crud = crud.clone();
    routes.get("/todos/stats", move |_ctx: RequestContext| {
        let crud = stats_crud.clone();
        async move {
            let repo = crud.repository();
            let done = repo.count(&[FilterCondition::eq("done", true)]).await?;
            let open = repo.count(&[FilterCondition::eq("done", false)]).await?;
            Ok::<_, RepositoryError>(Stats { open, done })
        }
    })?;
    crud.mount(&mut routes, "/todos")?;

    Server::new(config).serve(routes.into_router()).await
}
