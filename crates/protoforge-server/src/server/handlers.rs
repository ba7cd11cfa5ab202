// HTTP request handlers for the /api routes
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use protoforge_core::config::DEFAULT_ITEMS_PER_PAGE;
use protoforge_core::{extract, jdl, sanitize_project_name, store::INDEX_FILE};
use protoforge_gen::{DEFAULT_PORT, DEFAULT_RECORDS};

use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::models::{
    GenerateCodeRequest, GenerateCrudRequest, GenerateJdlRequest, GenerateJsonRequest,
    GenerateJsonServerRequest, GenerateProjectRequest, GeneratePrototypeRequest,
    RequirementsRequest, ReviewRequirementsRequest, Valid, ValidateJdlRequest, MAX_REQUIREMENTS,
    MIN_REQUIREMENTS,
};
use crate::openapi;
use crate::server::state::AppState;

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse(json!({
        "status": "ok",
        "llm": state.pipeline.describe_llm(),
    })))
}

pub async fn api_docs() -> Json<Value> {
    Json(openapi::document())
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("route not found")
}

// Values are range-checked by `Validate` before these conversions.
fn records_or_default(value: Option<i64>) -> usize {
    value.map_or(DEFAULT_RECORDS, |v| v as usize)
}

fn port_or_default(value: Option<i64>) -> u16 {
    value.map_or(DEFAULT_PORT, |v| v as u16)
}

// --- Generate ---

pub async fn generate_jdl(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateJdlRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    info!(project = %name, "generate jdl");
    let out = state.pipeline.generate_jdl(&name, &req.requirements).await?;
    Ok(ApiResponse(json!({
        "name": name,
        "jdl": out.value.jdl,
        "entities": out.value.document.entities,
        "source": out.source,
    })))
}

pub async fn generate_json(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateJsonRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    let records = records_or_default(req.records_per_entity);
    info!(project = %name, records, "generate mock data");
    let out = state
        .pipeline
        .generate_mock_data(&name, req.jdl.as_deref(), records)
        .await?;
    Ok(ApiResponse(json!({
        "name": name,
        "db": out.value,
        "source": out.source,
    })))
}

pub async fn generate_prototype(
    State(state): State<AppState>,
    Valid(req): Valid<GeneratePrototypeRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    info!(project = %name, "generate prototype");
    let out = state
        .pipeline
        .generate_prototype(&name, &req.requirements)
        .await?;
    Ok(ApiResponse(json!({
        "name": name,
        "path": format!("/public/{name}/{INDEX_FILE}"),
        "source": out.source,
    })))
}

pub async fn generate_json_server(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateJsonServerRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    let port = port_or_default(req.port);
    info!(project = %name, port, "generate json-server files");
    let files = state.pipeline.generate_json_server(&name, port).await?;
    Ok(ApiResponse(json!({ "name": name, "files": files })))
}

pub async fn generate_crud(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateCrudRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    let base_url = req
        .api_base_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| format!("http://localhost:{DEFAULT_PORT}"));
    let items_per_page = req
        .items_per_page
        .map_or(DEFAULT_ITEMS_PER_PAGE, |v| v as u32);
    info!(project = %name, base_url = %base_url, "generate crud front-end");
    let out = state
        .pipeline
        .generate_crud(&name, &base_url, items_per_page)
        .await?;
    Ok(ApiResponse(json!({
        "name": name,
        "configs": out.value,
        "source": out.source,
    })))
}

pub async fn generate_project(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateProjectRequest>,
) -> ApiResult<Value> {
    let name = sanitize_project_name(&req.name)?;
    let records = records_or_default(req.records_per_entity);
    let port = port_or_default(req.port);
    info!(project = %name, records, port, "generate project");
    let out = state
        .pipeline
        .generate_project(&name, &req.requirements, records, port)
        .await?;
    Ok(ApiResponse(json!({
        "name": name,
        "files": out.value.files,
        "sources": out.value.sources,
        "source": out.source,
    })))
}

pub async fn generate_code(
    State(state): State<AppState>,
    Valid(req): Valid<GenerateCodeRequest>,
) -> ApiResult<Value> {
    info!(language = %req.language, "generate code");
    let code = state
        .pipeline
        .generate_code(&req.language, &req.description, req.context.as_deref())
        .await?;
    Ok(ApiResponse(json!({ "language": req.language, "code": code })))
}

// --- Validate ---

pub async fn validate_jdl(Valid(req): Valid<ValidateJdlRequest>) -> ApiResult<Value> {
    let doc = jdl::parse(&req.jdl);
    let warnings = jdl::lint(&req.jdl);
    Ok(ApiResponse(json!({
        "valid": !doc.is_empty(),
        "entities": doc.entities,
        "enums": doc.enums,
        "warnings": warnings,
    })))
}

pub async fn validate_requirements(Valid(req): Valid<ReviewRequirementsRequest>) -> ApiResult<Value> {
    let text = req.requirements.trim();
    let len = text.chars().count();
    let mut issues = Vec::new();
    if len < MIN_REQUIREMENTS {
        issues.push(format!("requirements are too short ({len} < {MIN_REQUIREMENTS} characters)"));
    } else if len > MAX_REQUIREMENTS {
        issues.push(format!("requirements are too long ({len} > {MAX_REQUIREMENTS} characters)"));
    }
    let doc = extract::extract_entities(text);
    if doc.is_empty() {
        issues.push("no entities could be identified; name the things the app manages".to_string());
    }
    let entities: Vec<&str> = doc.entities.iter().map(|e| e.name.as_str()).collect();
    Ok(ApiResponse(json!({
        "valid": issues.is_empty(),
        "issues": issues,
        "entities": entities,
    })))
}

// --- Research ---

pub async fn research_entities(Valid(req): Valid<RequirementsRequest>) -> ApiResult<Value> {
    let doc = extract::extract_entities(&req.requirements);
    Ok(ApiResponse(json!({
        "entities": doc.entities,
        "jdl": jdl::render(&doc),
    })))
}

pub async fn research_requirements(
    State(state): State<AppState>,
    Valid(req): Valid<RequirementsRequest>,
) -> ApiResult<Value> {
    let suggestions = state.pipeline.research(&req.requirements).await;
    Ok(ApiResponse(json!({ "suggestions": suggestions })))
}

// --- Projects ---

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(ApiResponse(state.store().list()?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    let files = state.store().files(&name)?;
    Ok(ApiResponse(json!({ "name": name, "files": files })))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    let _guard = state.locks().lock(&name).await;
    state.store().delete(&name)?;
    info!(project = %name, "deleted project");
    Ok(ApiResponse(json!({ "name": name, "deleted": true })))
}
