//! JSON-Server compatible REST backend over `public/<project>/db.json`.
//!
//! Responses use the raw json-server shapes, not the API envelope. Unknown
//! projects, collections and ids are a bare `404 {}`.

use std::cmp::Ordering;
use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use protoforge_core::mock::{self, Db};
use protoforge_core::Error;

use crate::error::ApiError;
use crate::server::state::AppState;

const TOTAL_COUNT: &str = "x-total-count";
const DEFAULT_LIMIT: usize = 10;

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({}))).into_response()
}

fn load(state: &AppState, project: &str) -> Result<Option<Db>, ApiError> {
    match state.store().read_db(project) {
        Ok(db) => Ok(Some(db)),
        Err(Error::NotFound(_) | Error::InvalidName(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn id_matches(record: &Value, id: &str) -> bool {
    match record.get("id") {
        Some(Value::Number(n)) => n.to_string() == id,
        Some(Value::String(s)) => s == id,
        _ => false,
    }
}

fn body_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::validation("request body must be a JSON object")),
    }
}

/// Text form used for equality filters and full-text search.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => as_text(x).cmp(&as_text(y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Apply json-server list parameters. Returns the page and the total count
/// after filtering.
pub fn query_collection(records: &[Value], params: &HashMap<String, String>) -> (Vec<Value>, usize) {
    let search = params.get("q").map(|q| q.to_lowercase());
    let filters: Vec<(&String, &String)> = params
        .iter()
        .filter(|(k, _)| !k.starts_with('_') && k.as_str() != "q")
        .collect();

    let mut matched: Vec<&Value> = records
        .iter()
        .filter(|rec| {
            filters
                .iter()
                .all(|(k, v)| rec.get(k.as_str()).and_then(as_text).as_deref() == Some(v.as_str()))
        })
        .filter(|rec| match (&search, rec.as_object()) {
            (Some(q), Some(obj)) => obj
                .values()
                .filter_map(as_text)
                .any(|text| text.to_lowercase().contains(q.as_str())),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect();

    if let Some(field) = params.get("_sort") {
        matched.sort_by(|a, b| compare(a.get(field), b.get(field)));
        if params.get("_order").is_some_and(|o| o.eq_ignore_ascii_case("desc")) {
            matched.reverse();
        }
    }

    let total = matched.len();
    let page: Option<usize> = params.get("_page").and_then(|p| p.parse().ok());
    let limit: Option<usize> = params.get("_limit").and_then(|l| l.parse().ok());
    let (skip, take) = match (page, limit) {
        (Some(page), limit) => {
            let limit = limit.unwrap_or(DEFAULT_LIMIT);
            (page.saturating_sub(1).saturating_mul(limit), limit)
        }
        (None, Some(limit)) => (0, limit),
        (None, None) => (0, total),
    };

    let items = matched.into_iter().skip(skip).take(take).cloned().collect();
    (items, total)
}

pub async fn list(
    State(state): State<AppState>,
    Path((project, collection)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let Some(db) = load(&state, &project)? else {
        return Ok(not_found());
    };
    if collection == "db" {
        return Ok(Json(db).into_response());
    }
    let Some(records) = db.get(&collection).and_then(Value::as_array) else {
        return Ok(not_found());
    };
    let (items, total) = query_collection(records, &params);
    let mut response = Json(items).into_response();
    response
        .headers_mut()
        .insert(TOTAL_COUNT, HeaderValue::from(total));
    Ok(response)
}

pub async fn show(
    State(state): State<AppState>,
    Path((project, collection, id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let Some(db) = load(&state, &project)? else {
        return Ok(not_found());
    };
    let record = db
        .get(&collection)
        .and_then(Value::as_array)
        .and_then(|records| records.iter().find(|r| id_matches(r, &id)));
    Ok(match record {
        Some(record) => Json(record).into_response(),
        None => not_found(),
    })
}

pub async fn create(
    State(state): State<AppState>,
    Path((project, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let mut record = body_object(body)?;
    let _guard = state.locks().lock(&project).await;
    let Some(mut db) = load(&state, &project)? else {
        return Ok(not_found());
    };
    let Some(records) = db.get_mut(&collection).and_then(Value::as_array_mut) else {
        return Ok(not_found());
    };
    let id = mock::max_id(records) + 1;
    record.insert("id".to_string(), json!(id));
    let record = Value::Object(record);
    records.push(record.clone());
    state.store().write_db(&project, &db)?;
    tracing::debug!(project = %project, collection = %collection, id, "created record");
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

enum Change {
    Replace(Map<String, Value>),
    Merge(Map<String, Value>),
    Remove,
}

async fn modify(
    state: &AppState,
    project: &str,
    collection: &str,
    id: &str,
    change: Change,
) -> Result<Response, ApiError> {
    let _guard = state.locks().lock(project).await;
    let Some(mut db) = load(state, project)? else {
        return Ok(not_found());
    };
    let Some(records) = db.get_mut(collection).and_then(Value::as_array_mut) else {
        return Ok(not_found());
    };
    let Some(pos) = records.iter().position(|r| id_matches(r, id)) else {
        return Ok(not_found());
    };

    let response = match change {
        Change::Remove => {
            records.remove(pos);
            json!({})
        }
        Change::Replace(mut body) => {
            if let Some(existing) = records[pos].get("id").cloned() {
                body.insert("id".to_string(), existing);
            }
            records[pos] = Value::Object(body);
            records[pos].clone()
        }
        Change::Merge(body) => {
            if let Some(existing) = records[pos].as_object_mut() {
                for (key, value) in body {
                    if key != "id" {
                        existing.insert(key, value);
                    }
                }
            }
            records[pos].clone()
        }
    };

    state.store().write_db(project, &db)?;
    Ok(Json(response).into_response())
}

pub async fn replace(
    State(state): State<AppState>,
    Path((project, collection, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body = body_object(body)?;
    modify(&state, &project, &collection, &id, Change::Replace(body)).await
}

pub async fn update(
    State(state): State<AppState>,
    Path((project, collection, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body = body_object(body)?;
    modify(&state, &project, &collection, &id, Change::Merge(body)).await
}

pub async fn remove(
    State(state): State<AppState>,
    Path((project, collection, id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    modify(&state, &project, &collection, &id, Change::Remove).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Ada", "team": "core", "age": 36}),
            json!({"id": 2, "name": "Grace", "team": "infra", "age": 45}),
            json!({"id": 3, "name": "Linus", "team": "core", "age": 28}),
            json!({"id": 4, "name": "Barbara", "team": "core", "age": 52}),
        ]
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn ids(items: &[Value]) -> Vec<u64> {
        items.iter().map(|r| r["id"].as_u64().unwrap()).collect()
    }

    #[test]
    fn no_params_returns_everything() {
        let (items, total) = query_collection(&people(), &HashMap::new());
        assert_eq!(total, 4);
        assert_eq!(ids(&items), [1, 2, 3, 4]);
    }

    #[test]
    fn equality_filters_and_search() {
        let (items, total) = query_collection(&people(), &params(&[("team", "core"), ("q", "AR")]));
        assert_eq!(total, 1);
        assert_eq!(ids(&items), [4]);
        let (items, _) = query_collection(&people(), &params(&[("age", "45")]));
        assert_eq!(ids(&items), [2]);
    }

    #[test]
    fn sorts_numbers_numerically() {
        let (items, _) = query_collection(&people(), &params(&[("_sort", "age"), ("_order", "desc")]));
        assert_eq!(ids(&items), [4, 2, 1, 3]);
        let (items, _) = query_collection(&people(), &params(&[("_sort", "name")]));
        assert_eq!(ids(&items), [1, 4, 2, 3]);
    }

    #[test]
    fn paginates_after_filtering() {
        let (items, total) =
            query_collection(&people(), &params(&[("team", "core"), ("_page", "2"), ("_limit", "2")]));
        assert_eq!(total, 3);
        assert_eq!(ids(&items), [4]);
        let (items, total) = query_collection(&people(), &params(&[("_limit", "1")]));
        assert_eq!((ids(&items), total), (vec![1], 4));
    }

    #[test]
    fn huge_page_numbers_give_an_empty_page() {
        let (items, total) = query_collection(
            &people(),
            &params(&[("_page", "18446744073709551615"), ("_limit", "2")]),
        );
        assert!(items.is_empty());
        assert_eq!(total, 4);
    }
}
