// OpenAPI 3.0 description of the /api routes
use serde_json::{json, Map, Value};

struct Op {
    method: &'static str,
    path: &'static str,
    summary: &'static str,
    tag: &'static str,
    request: Option<&'static str>,
}

const OPERATIONS: &[Op] = &[
    Op { method: "get", path: "/health", summary: "Service health and active LLM backend", tag: "meta", request: None },
    Op { method: "post", path: "/api/generate/jdl", summary: "Generate a JDL model from requirements", tag: "generate", request: Some("GenerateJdlRequest") },
    Op { method: "post", path: "/api/generate/json", summary: "Generate mock data (db.json) from the stored or given JDL", tag: "generate", request: Some("GenerateJsonRequest") },
    Op { method: "post", path: "/api/generate/prototype", summary: "Generate a static HTML prototype", tag: "generate", request: Some("GenerateJdlRequest") },
    Op { method: "post", path: "/api/generate/json-server", summary: "Write json-server launch files", tag: "generate", request: Some("GenerateJsonServerRequest") },
    Op { method: "post", path: "/api/generate/crud", summary: "Write the CRUD front-end and entity configs", tag: "generate", request: Some("GenerateCrudRequest") },
    Op { method: "post", path: "/api/generate/project", summary: "Run every generation step for one project", tag: "generate", request: Some("GenerateProjectRequest") },
    Op { method: "post", path: "/api/generate/code", summary: "Generate a code snippet", tag: "generate", request: Some("GenerateCodeRequest") },
    Op { method: "post", path: "/api/validate/jdl", summary: "Parse and lint JDL text", tag: "validate", request: Some("ValidateJdlRequest") },
    Op { method: "post", path: "/api/validate/requirements", summary: "Review requirements text", tag: "validate", request: Some("ReviewRequirementsRequest") },
    Op { method: "post", path: "/api/research/entities", summary: "Rule-based entity extraction", tag: "research", request: Some("RequirementsRequest") },
    Op { method: "post", path: "/api/research/requirements", summary: "LLM suggestions for missing requirements", tag: "research", request: Some("RequirementsRequest") },
    Op { method: "get", path: "/api/projects", summary: "List generated projects", tag: "projects", request: None },
    Op { method: "get", path: "/api/projects/{name}", summary: "List the files of a project", tag: "projects", request: None },
    Op { method: "delete", path: "/api/projects/{name}", summary: "Delete a project", tag: "projects", request: None },
];

fn string() -> Value {
    json!({ "type": "string" })
}

fn integer(min: i64, max: i64) -> Value {
    json!({ "type": "integer", "minimum": min, "maximum": max })
}

fn object(required: &[&str], properties: Value) -> Value {
    json!({ "type": "object", "required": required, "properties": properties })
}

fn schemas() -> Value {
    let requirements = json!({ "type": "string", "minLength": 10, "maxLength": 10000 });
    json!({
        "GenerateJdlRequest": object(&["name", "requirements"], json!({
            "name": string(),
            "requirements": requirements,
        })),
        "GenerateJsonRequest": object(&["name"], json!({
            "name": string(),
            "jdl": string(),
            "recordsPerEntity": integer(1, 100),
        })),
        "GenerateJsonServerRequest": object(&["name"], json!({
            "name": string(),
            "port": integer(1024, 65535),
        })),
        "GenerateCrudRequest": object(&["name"], json!({
            "name": string(),
            "apiBaseUrl": string(),
            "itemsPerPage": integer(1, 100),
        })),
        "GenerateProjectRequest": object(&["name", "requirements"], json!({
            "name": string(),
            "requirements": requirements,
            "recordsPerEntity": integer(1, 100),
            "port": integer(1024, 65535),
        })),
        "GenerateCodeRequest": object(&["language", "description"], json!({
            "language": { "type": "string", "enum": crate::models::LANGUAGES },
            "description": { "type": "string", "minLength": 5, "maxLength": 5000 },
            "context": string(),
        })),
        "ValidateJdlRequest": object(&["jdl"], json!({ "jdl": string() })),
        "RequirementsRequest": object(&["requirements"], json!({ "requirements": requirements })),
        // Length problems come back as review issues, not 400s.
        "ReviewRequirementsRequest": object(&["requirements"], json!({ "requirements": string() })),
        "Success": object(&["success", "data"], json!({
            "success": { "type": "boolean", "enum": [true] },
            "data": {},
        })),
        "Error": object(&["success", "error"], json!({
            "success": { "type": "boolean", "enum": [false] },
            "error": object(&["message", "code"], json!({
                "message": string(),
                "code": {
                    "type": "string",
                    "enum": ["VALIDATION_ERROR", "NOT_FOUND", "LLM_ERROR", "LLM_TIMEOUT", "INTERNAL_ERROR"],
                },
            })),
        })),
    })
}

fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

fn operation(op: &Op) -> Value {
    let error = json!({
        "description": "Error envelope",
        "content": { "application/json": { "schema": schema_ref("Error") } },
    });
    let mut value = json!({
        "summary": op.summary,
        "tags": [op.tag],
        "responses": {
            "200": {
                "description": "Success envelope",
                "content": { "application/json": { "schema": schema_ref("Success") } },
            },
            "400": error.clone(),
            "404": error.clone(),
            "502": error.clone(),
            "504": error,
        },
    });
    if op.path.contains("{name}") {
        value["parameters"] = json!([{
            "name": "name",
            "in": "path",
            "required": true,
            "schema": string(),
        }]);
    }
    if let Some(request) = op.request {
        value["requestBody"] = json!({
            "required": true,
            "content": { "application/json": { "schema": schema_ref(request) } },
        });
    }
    value
}

pub fn document() -> Value {
    let mut paths = Map::new();
    for op in OPERATIONS {
        let entry = paths
            .entry(op.path)
            .or_insert_with(|| Value::Object(Map::new()));
        entry[op.method] = operation(op);
    }
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "protoforge",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Turns plain-language requirements into runnable prototype projects.",
        },
        "paths": paths,
        "components": { "schemas": schemas() },
    })
}
