use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use protoforge_core::ProjectStore;
use protoforge_gen::{Pipeline, ScriptedGenerator};
use protoforge_server::server::{create_app, state::AppState};

fn seeded() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let store = ProjectStore::new(dir.path());
    let db = json!({
        "books": [
            {"id": 1, "title": "Dune", "year": 1965, "authorId": 1},
            {"id": 2, "title": "Emma", "year": 1815, "authorId": 2},
            {"id": 3, "title": "Hyperion", "year": 1989, "authorId": 1},
        ],
        "authors": [
            {"id": 1, "name": "Frank Herbert"},
            {"id": 2, "name": "Jane Austen"},
        ],
    });
    store.write_db("library", db.as_object().unwrap()).unwrap();
    let pipeline = Pipeline::new(Arc::new(ScriptedGenerator::new()), store);
    let app = create_app(AppState::new(pipeline), &[]);
    (dir, app)
}

struct Reply {
    status: StatusCode,
    total: Option<String>,
    body: Value,
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let total = response
        .headers()
        .get("x-total-count")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        total,
        body: serde_json::from_slice(&bytes).unwrap(),
    }
}

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn whole_db_and_collections() {
    let (_dir, app) = seeded();

    let reply = call(&app, Method::GET, "/mock/library/db", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["authors"].as_array().unwrap().len(), 2);

    let reply = call(&app, Method::GET, "/mock/library/books", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.total.as_deref(), Some("3"));
    assert_eq!(titles(&reply.body), ["Dune", "Emma", "Hyperion"]);
}

#[tokio::test]
async fn list_query_parameters() {
    let (_dir, app) = seeded();

    let reply = call(&app, Method::GET, "/mock/library/books?authorId=1&_sort=year&_order=desc", None).await;
    assert_eq!(titles(&reply.body), ["Hyperion", "Dune"]);
    assert_eq!(reply.total.as_deref(), Some("2"));

    let reply = call(&app, Method::GET, "/mock/library/books?_page=2&_limit=2", None).await;
    assert_eq!(titles(&reply.body), ["Hyperion"]);
    assert_eq!(reply.total.as_deref(), Some("3"));

    let reply = call(&app, Method::GET, "/mock/library/books?q=EMM", None).await;
    assert_eq!(titles(&reply.body), ["Emma"]);
}

#[tokio::test]
async fn unknown_targets_are_empty_404s() {
    let (_dir, app) = seeded();
    for uri in [
        "/mock/nowhere/books",
        "/mock/library/films",
        "/mock/library/books/99",
        "/mock/Bad%20Name/books",
    ] {
        let reply = call(&app, Method::GET, uri, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(reply.body, json!({}), "{uri}");
    }
    let reply = call(&app, Method::DELETE, "/mock/library/books/99", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_assigns_the_next_id_and_persists() {
    let (dir, app) = seeded();

    let reply = call(&app, Method::POST, "/mock/library/books", Some(json!({"id": 1, "title": "Persuasion", "authorId": 2}))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["id"], 4);
    assert_eq!(reply.body["title"], "Persuasion");

    let reply = call(&app, Method::GET, "/mock/library/books/4", None).await;
    assert_eq!(reply.body["title"], "Persuasion");

    let saved = ProjectStore::new(dir.path()).read_db("library").unwrap();
    assert_eq!(saved["books"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn put_replaces_and_keeps_the_id() {
    let (_dir, app) = seeded();
    let reply = call(&app, Method::PUT, "/mock/library/books/2", Some(json!({"id": 7, "title": "Sense and Sensibility"}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"id": 2, "title": "Sense and Sensibility"}));
}

#[tokio::test]
async fn patch_merges_fields() {
    let (_dir, app) = seeded();
    let reply = call(&app, Method::PATCH, "/mock/library/books/1", Some(json!({"year": 1966}))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({"id": 1, "title": "Dune", "year": 1966, "authorId": 1}));
}

#[tokio::test]
async fn delete_returns_an_empty_object() {
    let (_dir, app) = seeded();
    let reply = call(&app, Method::DELETE, "/mock/library/authors/2", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({}));

    let reply = call(&app, Method::GET, "/mock/library/authors", None).await;
    assert_eq!(reply.total.as_deref(), Some("1"));
}

#[tokio::test]
async fn non_object_bodies_are_rejected() {
    let (_dir, app) = seeded();
    let reply = call(&app, Method::POST, "/mock/library/books", Some(json!(["not", "a", "record"]))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "VALIDATION_ERROR");
}
