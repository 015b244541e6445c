//! End-to-end tests driving mounted routes through the axum router

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use restbind::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Person {
    id: i64,
    name: String,
    age: i64,
    addr: String,
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

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Value {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    send_request(app, builder.body(body).unwrap()).await
}

async fn send_request(app: &Router, request: Request<Body>) -> Value {
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn run_scenario(app: Router) {
    let created = send(
        &app,
        "POST",
        "/data",
        Some(json!({"name": "a", "age": 10, "addr": "Home"})),
    )
    .await;
    assert_eq!(
        created,
        json!({"status": 0, "msg": "", "data": {"id": 1, "name": "a", "age": 10, "addr": "Home"}})
    );

    let fetched = send(&app, "GET", "/data/1", None).await;
    assert_eq!(fetched["data"], created["data"]);

    let updated = send(&app, "PUT", "/data/1", Some(json!({"name": "ab"}))).await;
    assert_eq!(updated["status"], 0);
    assert_eq!(
        updated["data"],
        json!({"id": 1, "name": "ab", "age": 10, "addr": "Home"})
    );

    let listed = send(&app, "GET", "/data?page=1", None).await;
    assert_eq!(listed["status"], 0);
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["items"][0]["name"], "ab");

    let deleted = send(&app, "DELETE", "/data/1", None).await;
    assert_eq!(deleted, json!({"status": 0, "msg": "", "data": null}));

    let missing = send(&app, "GET", "/data/1", None).await;
    assert_eq!(missing["status"], 500);
    assert_eq!(missing["msg"], "Person 1 not found");
    assert_eq!(missing["data"], Value::Null);
}

#[tokio::test]
async fn test_crud_scenario_memory() {
    let mut routes = Routes::new();
    mount_crud(&mut routes, "/data", MemoryRepository::<Person>::new())
        .await
        .unwrap();
    run_scenario(routes.into_router()).await;
}

#[tokio::test]
async fn test_crud_scenario_sqlite() {
    let pool = connect(&DatabaseConfig::new("sqlite::memory:"))
        .await
        .unwrap();
    let mut routes = Routes::new();
    mount_crud(&mut routes, "/data", SqliteRepository::<Person>::new(pool))
        .await
        .unwrap();
    run_scenario(routes.into_router()).await;
}

#[tokio::test]
async fn test_post_on_member_path_updates() {
    let mut routes = Routes::new();
    mount_crud(&mut routes, "/data", MemoryRepository::<Person>::new())
        .await
        .unwrap();
    let app = routes.into_router();

    send(&app, "POST", "/data", Some(json!({"name": "a", "age": 3}))).await;
    let updated = send(&app, "POST", "/data/1", Some(json!({"age": 4}))).await;
    assert_eq!(updated["data"]["name"], "a");
    assert_eq!(updated["data"]["age"], 4);
}

#[tokio::test]
async fn test_hooks_wrap_repository_call() {
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
    let mut routes = Routes::new();
    crud.mount(&mut routes, "/data").unwrap();
    let app = routes.into_router();

    let created = send(&app, "POST", "/data", Some(json!({"name": "a"}))).await;
    assert_eq!(created["data"]["name"], "A!");

    let stored = send(&app, "GET", "/data/1", None).await;
    assert_eq!(stored["data"]["name"], "A");
}

#[tokio::test]
async fn test_hook_error_becomes_target_error() {
    let crud = Crud::builder(MemoryRepository::<Person>::new())
        .before_delete(|ctx: RequestContext, _id| async move {
            match ctx.header("x-role") {
                Some("admin") => Ok(()),
                _ => Err(anyhow::anyhow!("only admins may delete")),
            }
        })
        .build();
    let mut routes = Routes::new();
    crud.mount(&mut routes, "/data").unwrap();
    let app = routes.into_router();
    send(&app, "POST", "/data", Some(json!({"name": "a"}))).await;

    let denied = send(&app, "DELETE", "/data/1", None).await;
    assert_eq!(
        denied,
        json!({"status": 500, "msg": "only admins may delete", "data": null})
    );

    let request = Request::builder()
        .method("DELETE")
        .uri("/data/1")
        .header("x-role", "admin")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send_request(&app, request).await["status"], 0);
}

#[tokio::test]
async fn test_list_pagination_defaults_to_twenty() {
    let mut routes = Routes::new();
    let crud = mount_crud(&mut routes, "/data", MemoryRepository::<Person>::new())
        .await
        .unwrap();
    for i in 0..25 {
        let person = Person {
            name: format!("p{}", i),
            age: i,
            ..Person::default()
        };
        crud.create(RequestContext::default(), person).await.unwrap();
    }
    let app = routes.into_router();

    let first = send(&app, "GET", "/data?page=1", None).await;
    assert_eq!(first["data"]["total"], 25);
    assert_eq!(first["data"]["items"].as_array().unwrap().len(), 20);

    let second = send(&app, "GET", "/data?page=2", None).await;
    assert_eq!(second["data"]["items"].as_array().unwrap().len(), 5);

    let ordered = send(&app, "GET", "/data?page=1&perPage=3&orderBy=age&orderDir=desc", None).await;
    let ages: Vec<i64> = ordered["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["age"].as_i64().unwrap())
        .collect();
    assert_eq!(ages, vec![24, 23, 22]);
}

#[tokio::test]
async fn test_unknown_order_field_is_target_error() {
    let mut routes = Routes::new();
    mount_crud(&mut routes, "/data", MemoryRepository::<Person>::new())
        .await
        .unwrap();
    let app = routes.into_router();

    let response = send(&app, "GET", "/data?orderBy=shoe_size", None).await;
    assert_eq!(response["status"], 500);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Probe {
    id: u32,
    name: String,
    age: u8,
    active: bool,
    tags: Vec<String>,
    nickname: Option<String>,
}

impl FieldTags for Probe {}

async fn probe(_ctx: RequestContext, input: Probe) -> anyhow::Result<Probe> {
    Ok(input)
}

async fn broken(_ctx: RequestContext, _input: Probe) -> RepositoryResult<u8> {
    Err(RepositoryError::connection_failed("storage offline"))
}

fn probe_app() -> Router {
    let mut routes = Routes::new();
    routes.post("/probe/:id", probe).unwrap();
    routes.get("/probe/:id", probe).unwrap();
    routes.get("/broken", broken).unwrap();
    routes.into_router()
}

#[tokio::test]
async fn test_binding_precedence_and_coercion() {
    let app = probe_app();
    let response = send(
        &app,
        "POST",
        "/probe/7?name=query&age=10&active=1&tags=x&nickname=",
        Some(json!({"name": "body"})),
    )
    .await;

    assert_eq!(
        response["data"],
        json!({
            "id": 7,
            "name": "body",
            "age": 10,
            "active": true,
            "tags": ["x"],
            "nickname": null
        })
    );
}

#[tokio::test]
async fn test_uri_overrides_query() {
    let app = probe_app();
    let response = send(&app, "GET", "/probe/3?id=99&tags=a&tags=b", None).await;
    assert_eq!(response["data"]["id"], 3);
    assert_eq!(response["data"]["tags"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_form_body() {
    let app = probe_app();
    let request = Request::builder()
        .method("POST")
        .uri("/probe/1")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=form&age=33"))
        .unwrap();
    let response = send_request(&app, request).await;
    assert_eq!(response["data"]["name"], "form");
    assert_eq!(response["data"]["age"], 33);
}

#[tokio::test]
async fn test_bind_failures_are_400() {
    let app = probe_app();

    let query = send(&app, "GET", "/probe/1?age=ten", None).await;
    assert_eq!(query["status"], 400);
    assert!(query["msg"]
        .as_str()
        .unwrap()
        .starts_with("bind query params failed"));

    let uri = send(&app, "GET", "/probe/seven", None).await;
    assert_eq!(uri["status"], 400);
    assert!(uri["msg"].as_str().unwrap().starts_with("bind uri params failed"));

    let request = Request::builder()
        .method("POST")
        .uri("/probe/1")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let body = send_request(&app, request).await;
    assert_eq!(body["status"], 400);
    assert!(body["msg"].as_str().unwrap().starts_with("bind body params failed"));
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn test_json_body_numbers_must_be_numbers() {
    let app = probe_app();
    let rejected = send(&app, "POST", "/probe/1", Some(json!({"age": "10"}))).await;
    assert_eq!(rejected["status"], 400);
    assert!(rejected["msg"]
        .as_str()
        .unwrap()
        .starts_with("bind body params failed"));

    let accepted = send(&app, "POST", "/probe/1?age=10", Some(json!({"name": "n"}))).await;
    assert_eq!(accepted["status"], 0);
    assert_eq!(accepted["data"]["age"], 10);
}

#[tokio::test]
async fn test_target_error_is_500() {
    let app = probe_app();
    let response = send(&app, "GET", "/broken", None).await;
    assert_eq!(response["status"], 500);
    assert_eq!(
        response["msg"],
        "Repository connection_failed error during find_by_id: storage offline"
    );
    assert_eq!(response["data"], Value::Null);
}

#[tokio::test]
async fn test_body_limit_is_bind_error() {
    let mut routes = Routes::new().with_body_limit(16);
    routes.post("/probe/:id", probe).unwrap();
    let app = routes.into_router();

    let response = send(
        &app,
        "POST",
        "/probe/1",
        Some(json!({"name": "a name that is far longer than sixteen bytes"})),
    )
    .await;
    assert_eq!(response["status"], 400);
}

#[test]
fn test_registration_errors() {
    let mut routes = Routes::new();
    assert_eq!(
        routes.get("", probe).err(),
        Some(SignatureError::EmptyPath)
    );
    assert!(matches!(
        routes.get("probe", probe),
        Err(SignatureError::MissingLeadingSlash { .. })
    ));
    assert!(matches!(
        routes.get("/probe/{id", probe),
        Err(SignatureError::MalformedSegment { .. })
    ));

    routes.get("/probe", probe).unwrap();
    assert!(matches!(
        routes.get("/probe", probe),
        Err(SignatureError::DuplicateRoute { .. })
    ));
}
