use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;
use serde_json::json;

use protoforge_core::config::{configs_for, DEFAULT_ITEMS_PER_PAGE};
use protoforge_core::scaffold::{self, project_title};
use protoforge_core::{extract, jdl, mock, sanitize_project_name, JdlDocument, ProjectStore};

const DEFAULT_RECORDS: usize = 5;
const MAX_RECORDS: usize = 100;
const DEFAULT_PORT: u16 = 3001;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ProjectRequest {
    /// Project name (lowercase letters, digits and dashes)
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ParseJdlRequest {
    /// JDL text containing `entity`, `enum` and `relationship` blocks
    jdl: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExtractEntitiesRequest {
    /// Plain-language requirements describing what the app manages
    requirements: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateMockDataRequest {
    /// Project name. The project must already have a data.jdl.
    name: String,
    /// Records per entity, 1-100 (default 5)
    records: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ScaffoldProjectRequest {
    /// Project name; it is sanitized to lowercase-dash form
    name: String,
    /// JDL model for the project
    jdl: String,
    /// Records per entity, 1-100 (default 5)
    records: Option<usize>,
    /// Port the json-server scripts and CRUD page use (default 3001)
    port: Option<u16>,
}

fn records(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_RECORDS).clamp(1, MAX_RECORDS)
}

fn entity_summary(doc: &JdlDocument) -> serde_json::Value {
    doc.entities
        .iter()
        .map(|e| {
            json!({
                "name": e.name,
                "collection": e.collection(),
                "fields": e.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                "relationships": e.relationships.iter()
                    .filter(|r| r.is_source)
                    .map(|r| format!("{} {} ({})", r.kind.as_str(), r.with, r.field))
                    .collect::<Vec<_>>(),
            })
        })
        .collect()
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

// --- Operations ---

fn list_projects(store: &ProjectStore) -> Result<String, String> {
    let names = store.list().map_err(|e| e.to_string())?;
    Ok(if names.is_empty() {
        "No projects found. Use scaffold_project to create one.".to_string()
    } else {
        names.join("\n")
    })
}

fn get_project(store: &ProjectStore, name: &str) -> Result<String, String> {
    let files = store
        .files(name)
        .map_err(|e| format!("Failed to read project '{}': {}", name, e))?;
    let text = store.read_jdl(name).ok();
    let doc = text.as_deref().map(jdl::parse).unwrap_or_default();
    Ok(pretty(&json!({
        "name": name,
        "files": files,
        "jdl": text,
        "entities": entity_summary(&doc),
    })))
}

fn parse_jdl(text: &str) -> Result<String, String> {
    let doc = jdl::parse(text);
    if doc.is_empty() {
        return Err("No entities found. Declare at least one `entity Name { ... }` block.".into());
    }
    Ok(pretty(&json!({
        "entities": doc.entities,
        "enums": doc.enums,
        "warnings": jdl::lint(text),
    })))
}

fn extract_entities(requirements: &str) -> Result<String, String> {
    let doc = extract::extract_entities(requirements);
    if doc.is_empty() {
        return Err(
            "No entities could be identified. Name the things the app manages (\"manage orders and customers\")."
                .into(),
        );
    }
    Ok(jdl::render(&doc))
}

fn generate_mock_data(store: &ProjectStore, name: &str, requested: Option<usize>) -> Result<String, String> {
    let text = store
        .read_jdl(name)
        .map_err(|e| format!("Project '{}' has no data.jdl: {}", name, e))?;
    let doc = jdl::parse(&text);
    let db = mock::generate(&doc, records(requested));
    store.write_db(name, &db).map_err(|e| e.to_string())?;
    tracing::info!(project = name, collections = db.len(), "wrote db.json");

    let counts: Vec<String> = db
        .iter()
        .map(|(collection, records)| {
            let n = records.as_array().map_or(0, Vec::len);
            format!("{}: {} records", collection, n)
        })
        .collect();
    Ok(format!("Wrote {}/db.json\n{}", name, counts.join("\n")))
}

fn scaffold_project(store: &ProjectStore, req: &ScaffoldProjectRequest) -> Result<String, String> {
    let name = sanitize_project_name(&req.name).map_err(|e| e.to_string())?;
    let doc = jdl::parse(&req.jdl);
    if doc.is_empty() {
        return Err("The JDL declares no entities; nothing to scaffold.".into());
    }
    let port = req.port.unwrap_or(DEFAULT_PORT);

    let run = || -> protoforge_core::Result<Vec<String>> {
        store.write_jdl(&name, &req.jdl)?;
        let db = mock::generate(&doc, records(req.records));
        store.write_db(&name, &db)?;
        let collections: Vec<String> = db.keys().cloned().collect();
        scaffold::write_json_server(store, &name, &collections, port)?;
        let configs = configs_for(&doc, &format!("http://localhost:{port}"), DEFAULT_ITEMS_PER_PAGE);
        scaffold::write_crud_frontend(store, &name, &configs)?;
        let html = scaffold::fallback_prototype(&project_title(&name), &doc, &db)?;
        scaffold::write_prototype(store, &name, &html)?;
        store.files(&name)
    };
    let files = run().map_err(|e| format!("Failed to scaffold '{}': {}", name, e))?;
    tracing::info!(project = %name, files = files.len(), "scaffolded project");

    Ok(format!(
        "Scaffolded '{}' with {} entities.\nRun `sh start.sh` in the project folder to serve it on port {}.\n\nFiles:\n{}",
        name,
        doc.entities.len(),
        port,
        files.join("\n")
    ))
}

fn reply(result: Result<String, String>) -> Result<CallToolResult, McpError> {
    Ok(match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => CallToolResult::error(vec![Content::text(e)]),
    })
}

// --- Server ---

#[derive(Clone)]
pub struct ProtoforgeServer {
    store: ProjectStore,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ProtoforgeServer {
    pub fn new(store: ProjectStore) -> Self {
        Self {
            store,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List all generated projects")]
    fn list_projects(&self) -> Result<CallToolResult, McpError> {
        reply(list_projects(&self.store))
    }

    #[tool(
        description = "Get a project: its file list, the stored JDL and a summary of its entities ({name, collection, fields, relationships})."
    )]
    fn get_project(
        &self,
        Parameters(req): Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        reply(get_project(&self.store, &req.name))
    }

    #[tool(
        description = "Parse JDL text and return the entities and enums as JSON, plus warnings for anything the scanner skipped. Use this to check JDL before scaffold_project."
    )]
    fn parse_jdl(
        &self,
        Parameters(req): Parameters<ParseJdlRequest>,
    ) -> Result<CallToolResult, McpError> {
        reply(parse_jdl(&req.jdl))
    }

    #[tool(
        description = "Rule-based extraction of entities, fields and simple relationships from plain-language requirements. Returns JDL text you can refine and pass to scaffold_project."
    )]
    fn extract_entities(
        &self,
        Parameters(req): Parameters<ExtractEntitiesRequest>,
    ) -> Result<CallToolResult, McpError> {
        reply(extract_entities(&req.requirements))
    }

    #[tool(
        description = "Regenerate db.json for an existing project from its stored data.jdl. Records are deterministic and foreign keys point at existing ids."
    )]
    fn generate_mock_data(
        &self,
        Parameters(req): Parameters<GenerateMockDataRequest>,
    ) -> Result<CallToolResult, McpError> {
        reply(generate_mock_data(&self.store, &req.name, req.records))
    }

    #[tool(
        description = "Create or overwrite a complete project from JDL: data.jdl, db.json, json-server launch files, the CRUD front-end and a static prototype page."
    )]
    fn scaffold_project(
        &self,
        Parameters(req): Parameters<ScaffoldProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        reply(scaffold_project(&self.store, &req))
    }
}

#[tool_handler]
impl ServerHandler for ProtoforgeServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## JDL Rules\n{}",
            INSTRUCTIONS,
            protoforge_core::rules::JDL_RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"protoforge turns a data model into a runnable prototype project. Projects live in the public directory, one folder per project.

## Workflow
1. Call `extract_entities` with the user's requirements to get a first JDL draft, or write JDL yourself following the rules below.
2. Check the draft with `parse_jdl`. Fix every warning before continuing.
3. Call `scaffold_project` with the final JDL. It writes all project files at once.
4. After editing a project's data.jdl by hand, call `generate_mock_data` to refresh db.json.

All tools are deterministic and work offline."#;
