//! Project files written next to `db.json`: the json-server wrapper, the CRUD
//! front-end and the fallback HTML prototype.

use std::path::PathBuf;

use heck::ToTitleCase;
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

use crate::mock::Db;
use crate::store::INDEX_FILE;
use crate::{field_label, EntityConfig, JdlDocument, ProjectStore, Result};

pub const ENTITY_CONFIG_FILE: &str = "static/config/entities.json";
pub const CRUD_FILE: &str = "static/crud.html";

// Names ending in `.html` are autoescaped by tera.
const TEMPLATES: &[(&str, &str)] = &[
    ("api.js", include_str!("../templates/api.js.tera")),
    ("package.json", include_str!("../templates/package.json.tera")),
    ("start.sh", include_str!("../templates/start.sh.tera")),
    ("start.bat", include_str!("../templates/start.bat.tera")),
    ("README.md", include_str!("../templates/README.md.tera")),
    ("crud.html", include_str!("../templates/crud.html.tera")),
    ("prototype.html", include_str!("../templates/prototype.html.tera")),
];

/// Front-end assets copied into every CRUD project as-is.
const ASSETS: &[(&str, &str)] = &[
    ("static/js/crud-grid.js", include_str!("../templates/static/js/crud-grid.js")),
    ("static/js/tabs.js", include_str!("../templates/static/js/tabs.js")),
    ("static/js/navbar.js", include_str!("../templates/static/js/navbar.js")),
    ("static/css/prototype.css", include_str!("../templates/static/css/prototype.css")),
];

const JSON_SERVER_FILES: &[&str] = &["api.js", "package.json", "start.sh", "start.bat", "README.md"];

const PREVIEW_ROWS: usize = 10;

fn templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES.iter().copied())?;
    Ok(tera)
}

/// "pet-store" -> "Pet Store"
pub fn project_title(name: &str) -> String {
    name.to_title_case()
}

/// Write the files that run `db.json` under `npx json-server`. Returns the
/// written paths relative to the project directory.
pub fn write_json_server(
    store: &ProjectStore,
    name: &str,
    collections: &[String],
    port: u16,
) -> Result<Vec<String>> {
    let tera = templates()?;
    let mut ctx = Context::new();
    ctx.insert("name", name);
    ctx.insert("title", &project_title(name));
    ctx.insert("port", &port);
    ctx.insert("collections", collections);

    let mut written = Vec::with_capacity(JSON_SERVER_FILES.len());
    for file in JSON_SERVER_FILES {
        let contents = tera.render(file, &ctx)?;
        store.write_artifact(name, file, &contents)?;
        written.push(file.to_string());
    }
    store.set_executable(name, "start.sh")?;
    tracing::info!(project = name, port, collections = collections.len(), "wrote json-server files");
    Ok(written)
}

/// Write the CRUD page, its entity configs and the static assets it loads.
pub fn write_crud_frontend(
    store: &ProjectStore,
    name: &str,
    configs: &[EntityConfig],
) -> Result<Vec<String>> {
    let tera = templates()?;
    let mut ctx = Context::new();
    ctx.insert("title", &project_title(name));
    ctx.insert("configs", configs);

    let mut written = Vec::with_capacity(ASSETS.len() + 2);
    store.write_artifact(name, CRUD_FILE, &tera.render("crud.html", &ctx)?)?;
    written.push(CRUD_FILE.to_string());
    store.write_artifact(name, ENTITY_CONFIG_FILE, &serde_json::to_string_pretty(configs)?)?;
    written.push(ENTITY_CONFIG_FILE.to_string());
    for (rel, contents) in ASSETS {
        store.write_artifact(name, rel, contents)?;
        written.push(rel.to_string());
    }
    tracing::info!(project = name, entities = configs.len(), "wrote crud front-end");
    Ok(written)
}

#[derive(Serialize)]
struct PreviewTable {
    key: String,
    title: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Static prototype used when the model's HTML is unusable: one tab per
/// entity with a table of sample records from `db`.
pub fn fallback_prototype(title: &str, doc: &JdlDocument, db: &Db) -> Result<String> {
    let entities: Vec<PreviewTable> = doc
        .entities
        .iter()
        .map(|entity| {
            let mut keys = vec!["id".to_string()];
            keys.extend(entity.fields.iter().map(|f| f.name.clone()));
            keys.extend(
                entity
                    .relationships
                    .iter()
                    .filter(|r| r.holds_foreign_key() && doc.entity(&r.with).is_some())
                    .map(|r| format!("{}Id", r.field)),
            );
            let rows = db
                .get(&entity.collection())
                .and_then(Value::as_array)
                .map(|records| {
                    records
                        .iter()
                        .take(PREVIEW_ROWS)
                        .map(|rec| keys.iter().map(|k| cell(rec.get(k))).collect())
                        .collect()
                })
                .unwrap_or_default();
            PreviewTable {
                key: entity.collection(),
                title: crate::pluralize(&entity.name).to_title_case(),
                columns: keys.iter().map(|k| field_label(k)).collect(),
                rows,
            }
        })
        .collect();

    let mut ctx = Context::new();
    ctx.insert("title", title);
    ctx.insert("entities", &entities);
    Ok(templates()?.render("prototype.html", &ctx)?)
}

pub fn write_prototype(store: &ProjectStore, name: &str, html: &str) -> Result<PathBuf> {
    store.write_artifact(name, INDEX_FILE, html)
}
