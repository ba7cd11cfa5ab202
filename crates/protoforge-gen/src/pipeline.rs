use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use protoforge_core::config::{configs_for, EntityConfig, DEFAULT_ITEMS_PER_PAGE};
use protoforge_core::mock::{self, Db};
use protoforge_core::scaffold::{self, project_title};
use protoforge_core::store::INDEX_FILE;
use protoforge_core::{extract, jdl, JdlDocument, ProjectStore};

use crate::engine::{ChatPrompt, LlmError, TextGenerator};
use crate::parse::{clean_response, extract_html, extract_json_object, parse_object_array};
use crate::prompt;

pub const DEFAULT_RECORDS: usize = 5;
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Core(#[from] protoforge_core::Error),
}

/// Where a generated artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Llm,
    Fallback,
    /// Partly model output, partly deterministic fallback.
    Mixed,
}

impl Source {
    fn from_counts(llm: usize, fallback: usize) -> Source {
        match (llm, fallback) {
            (0, _) => Source::Fallback,
            (_, 0) => Source::Llm,
            _ => Source::Mixed,
        }
    }

    fn combine(sources: impl IntoIterator<Item = Source>) -> Source {
        let (mut llm, mut fallback) = (0, 0);
        for s in sources {
            match s {
                Source::Llm => llm += 1,
                Source::Fallback => fallback += 1,
                Source::Mixed => return Source::Mixed,
            }
        }
        Source::from_counts(llm, fallback)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Generated<T> {
    pub value: T,
    pub source: Source,
}

#[derive(Debug, Clone, Serialize)]
pub struct JdlOutput {
    pub jdl: String,
    pub document: JdlDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub topic: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub files: Vec<String>,
    pub sources: BTreeMap<String, Source>,
}

// --- Locks ---

/// One async mutex per project name. Guards are owned so they can be held
/// across awaits and moved into spawned tasks. Entries nobody holds or waits
/// on are dropped on the next `lock` call.
#[derive(Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn optional<T>(result: protoforge_core::Result<T>) -> protoforge_core::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(protoforge_core::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Keep every model collection that conforms, fill the rest from `fallback`.
fn merge_db(llm_text: &str, fallback: Db) -> (Db, Source) {
    let llm_db: Db = extract_json_object(llm_text)
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();
    let mut db = Db::new();
    let (mut from_llm, mut from_fallback) = (0, 0);
    for (key, fallback_value) in fallback {
        match llm_db.get(&key) {
            Some(value) if mock::collection_conforms(value) => {
                let mut value = value.clone();
                if let Some(records) = value.as_array_mut() {
                    mock::ensure_ids(records);
                }
                db.insert(key, value);
                from_llm += 1;
            }
            _ => {
                db.insert(key, fallback_value);
                from_fallback += 1;
            }
        }
    }
    (db, Source::from_counts(from_llm, from_fallback))
}

/// Pair model configs with entities by name. The caller's URL and paging
/// always win over the model's.
fn merge_configs(llm: Vec<EntityConfig>, fallback: Vec<EntityConfig>) -> (Vec<EntityConfig>, Source) {
    let (mut from_llm, mut from_fallback) = (0, 0);
    let merged = fallback
        .into_iter()
        .map(|fb| {
            match llm
                .iter()
                .find(|c| c.entity_name.eq_ignore_ascii_case(&fb.entity_name) && c.is_usable())
            {
                Some(c) => {
                    from_llm += 1;
                    EntityConfig {
                        api_base_url: fb.api_base_url,
                        items_per_page: fb.items_per_page,
                        ..c.clone()
                    }
                }
                None => {
                    from_fallback += 1;
                    fb
                }
            }
        })
        .collect();
    (merged, Source::from_counts(from_llm, from_fallback))
}

// --- Pipeline ---

/// Generators for every project artifact. Project names must already be
/// sanitized; see [`protoforge_core::sanitize_project_name`].
#[derive(Clone)]
pub struct Pipeline {
    llm: Arc<dyn TextGenerator>,
    store: ProjectStore,
    locks: ProjectLocks,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, store: ProjectStore) -> Self {
        Self {
            llm,
            store,
            locks: ProjectLocks::new(),
        }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    pub fn describe_llm(&self) -> String {
        self.llm.describe()
    }

    async fn ask(&self, prompt: ChatPrompt) -> Result<String, LlmError> {
        let raw = self.llm.generate(&prompt).await?;
        tracing::debug!(raw = %raw, "llm output");
        let cleaned = clean_response(&raw);
        if cleaned.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(cleaned)
    }

    pub async fn generate_jdl(
        &self,
        name: &str,
        requirements: &str,
    ) -> Result<Generated<JdlOutput>, GenError> {
        let _guard = self.locks.lock(name).await;
        self.jdl_step(name, requirements).await
    }

    async fn jdl_step(&self, name: &str, requirements: &str) -> Result<Generated<JdlOutput>, GenError> {
        let from_llm = match self.ask(prompt::jdl_prompt(requirements)).await {
            Ok(text) => {
                let document = jdl::parse(&text);
                if document.is_empty() {
                    tracing::warn!(project = name, "llm jdl has no entities, using rule-based extraction");
                    None
                } else {
                    Some((text, document))
                }
            }
            Err(e) => {
                tracing::warn!(project = name, error = %e, "llm jdl failed, using rule-based extraction");
                None
            }
        };

        let (jdl, document, source) = match from_llm {
            Some((text, document)) => (format!("{}\n", text.trim_end()), document, Source::Llm),
            None => {
                let document = extract::extract_entities(requirements);
                (jdl::render(&document), document, Source::Fallback)
            }
        };

        self.store.write_jdl(name, &jdl)?;
        tracing::info!(project = name, entities = document.entities.len(), source = ?source, "wrote data.jdl");
        Ok(Generated {
            value: JdlOutput { jdl, document },
            source,
        })
    }

    /// Mock data for `name`. Uses `jdl` when given (and stores it), else the
    /// project's `data.jdl`.
    pub async fn generate_mock_data(
        &self,
        name: &str,
        jdl: Option<&str>,
        records: usize,
    ) -> Result<Generated<Db>, GenError> {
        let _guard = self.locks.lock(name).await;
        self.mock_step(name, jdl, records).await
    }

    async fn mock_step(
        &self,
        name: &str,
        jdl_text: Option<&str>,
        records: usize,
    ) -> Result<Generated<Db>, GenError> {
        let text = match jdl_text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => {
                self.store.write_jdl(name, &format!("{text}\n"))?;
                text.to_string()
            }
            None => self.store.read_jdl(name)?,
        };
        let doc = jdl::parse(&text);
        let records = records.clamp(1, mock::MAX_RECORDS);
        let fallback = mock::generate(&doc, records);

        let (db, source) = if doc.is_empty() {
            (fallback, Source::Fallback)
        } else {
            match self.ask(prompt::mock_data_prompt(&doc, records)).await {
                Ok(text) => merge_db(&text, fallback),
                Err(e) => {
                    tracing::warn!(project = name, error = %e, "llm mock data failed, using fallback");
                    (fallback, Source::Fallback)
                }
            }
        };
        if source != Source::Llm {
            tracing::warn!(project = name, source = ?source, "mock data filled from fallback");
        }

        self.store.write_db(name, &db)?;
        tracing::info!(project = name, collections = db.len(), "wrote db.json");
        Ok(Generated { value: db, source })
    }

    /// Write `static/index.html`. Returns its path relative to the project.
    pub async fn generate_prototype(
        &self,
        name: &str,
        requirements: &str,
    ) -> Result<Generated<String>, GenError> {
        let _guard = self.locks.lock(name).await;
        self.prototype_step(name, requirements).await
    }

    async fn prototype_step(&self, name: &str, requirements: &str) -> Result<Generated<String>, GenError> {
        let stored = optional(self.store.read_jdl(name))?
            .map(|text| jdl::parse(&text))
            .unwrap_or_default();
        let doc = if stored.is_empty() {
            extract::extract_entities(requirements)
        } else {
            stored
        };

        let html = match self.ask(prompt::prototype_prompt(requirements, &doc)).await {
            Ok(text) => {
                let html = extract_html(&text);
                if html.is_none() {
                    tracing::warn!(project = name, "llm output has no html document, using fallback prototype");
                }
                html
            }
            Err(e) => {
                tracing::warn!(project = name, error = %e, "llm prototype failed, using fallback prototype");
                None
            }
        };

        let (html, source) = match html {
            Some(html) => (html, Source::Llm),
            None => {
                let db = match optional(self.store.read_db(name))? {
                    Some(db) => db,
                    None => mock::generate(&doc, DEFAULT_RECORDS),
                };
                let html = scaffold::fallback_prototype(&project_title(name), &doc, &db)?;
                (html, Source::Fallback)
            }
        };

        scaffold::write_prototype(&self.store, name, &html)?;
        tracing::info!(project = name, bytes = html.len(), source = ?source, "wrote prototype");
        Ok(Generated {
            value: INDEX_FILE.to_string(),
            source,
        })
    }

    /// Write the json-server wrapper files, synthesizing `db.json` from
    /// `data.jdl` when it is missing.
    pub async fn generate_json_server(&self, name: &str, port: u16) -> Result<Vec<String>, GenError> {
        let _guard = self.locks.lock(name).await;
        self.json_server_step(name, port)
    }

    fn json_server_step(&self, name: &str, port: u16) -> Result<Vec<String>, GenError> {
        let db = match optional(self.store.read_db(name))? {
            Some(db) => db,
            None => {
                let doc = jdl::parse(&self.store.read_jdl(name)?);
                let db = mock::generate(&doc, DEFAULT_RECORDS);
                self.store.write_db(name, &db)?;
                tracing::info!(project = name, "synthesized db.json from data.jdl");
                db
            }
        };
        let collections: Vec<String> = db.keys().cloned().collect();
        Ok(scaffold::write_json_server(&self.store, name, &collections, port)?)
    }

    pub async fn generate_crud(
        &self,
        name: &str,
        base_url: &str,
        items_per_page: u32,
    ) -> Result<Generated<Vec<EntityConfig>>, GenError> {
        let _guard = self.locks.lock(name).await;
        self.crud_step(name, base_url, items_per_page).await
    }

    async fn crud_step(
        &self,
        name: &str,
        base_url: &str,
        items_per_page: u32,
    ) -> Result<Generated<Vec<EntityConfig>>, GenError> {
        let doc = jdl::parse(&self.store.read_jdl(name)?);
        let fallback = configs_for(&doc, base_url, items_per_page);

        let (configs, source) = if doc.is_empty() {
            (fallback, Source::Fallback)
        } else {
            match self
                .ask(prompt::entity_config_prompt(&doc, base_url, items_per_page))
                .await
            {
                Ok(text) => merge_configs(parse_object_array(&text), fallback),
                Err(e) => {
                    tracing::warn!(project = name, error = %e, "llm entity configs failed, using fallback");
                    (fallback, Source::Fallback)
                }
            }
        };

        scaffold::write_crud_frontend(&self.store, name, &configs)?;
        Ok(Generated {
            value: configs,
            source,
        })
    }

    /// Run every step in order under a single project lock.
    pub async fn generate_project(
        &self,
        name: &str,
        requirements: &str,
        records: usize,
        port: u16,
    ) -> Result<Generated<ProjectSummary>, GenError> {
        let _guard = self.locks.lock(name).await;
        let mut sources = BTreeMap::new();

        let jdl = self.jdl_step(name, requirements).await?;
        sources.insert("jdl".to_string(), jdl.source);
        let data = self.mock_step(name, None, records).await?;
        sources.insert("data".to_string(), data.source);
        let prototype = self.prototype_step(name, requirements).await?;
        sources.insert("prototype".to_string(), prototype.source);
        self.json_server_step(name, port)?;
        let base_url = format!("http://localhost:{port}");
        let crud = self.crud_step(name, &base_url, DEFAULT_ITEMS_PER_PAGE).await?;
        sources.insert("crud".to_string(), crud.source);

        let files = self.store.files(name)?;
        let source = Source::combine(sources.values().copied());
        tracing::info!(project = name, files = files.len(), source = ?source, "generated project");
        Ok(Generated {
            value: ProjectSummary { files, sources },
            source,
        })
    }

    /// Single model call; errors propagate, there is no fallback.
    pub async fn generate_code(
        &self,
        language: &str,
        description: &str,
        context: Option<&str>,
    ) -> Result<String, GenError> {
        Ok(self
            .ask(prompt::code_prompt(language, description, context))
            .await?)
    }

    /// Model review of the requirements. Returns empty vec on failure.
    pub async fn research(&self, requirements: &str) -> Vec<Suggestion> {
        match self.ask(prompt::research_prompt(requirements)).await {
            Ok(text) => {
                let suggestions: Vec<Suggestion> = parse_object_array(&text);
                suggestions
                    .into_iter()
                    .filter(|s| !s.topic.trim().is_empty())
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "research failed");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedGenerator;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pipeline(generator: ScriptedGenerator) -> (TempDir, Arc<ScriptedGenerator>, Pipeline) {
        let tmp = TempDir::new().unwrap();
        let generator = Arc::new(generator);
        let pipeline = Pipeline::new(generator.clone(), ProjectStore::new(tmp.path()));
        (tmp, generator, pipeline)
    }

    const LIBRARY: &str = "entity Author { name String }\nentity Book { title String }";

    #[tokio::test]
    async fn jdl_from_llm_is_stored() {
        let (_tmp, generator, pipeline) = pipeline(
            ScriptedGenerator::new().reply("<think>ok</think>```jdl\nentity Book { title String required }\n```"),
        );
        let out = pipeline.generate_jdl("lib", "A library catalog of books").await.unwrap();
        assert_eq!(out.source, Source::Llm);
        assert_eq!(out.value.document.entities[0].name, "Book");
        assert_eq!(
            pipeline.store().read_jdl("lib").unwrap(),
            "entity Book { title String required }\n"
        );
        assert!(generator.prompts()[0].messages[1].content.contains("library catalog"));
    }

    #[tokio::test]
    async fn unusable_jdl_falls_back_to_extraction() {
        let (_tmp, generator, pipeline) = pipeline(
            ScriptedGenerator::new()
                .reply("Sorry, I cannot help with that.")
                .fail(LlmError::Timeout(Duration::from_secs(60))),
        );
        let requirements = "The app must track books and authors.";
        let first = pipeline.generate_jdl("lib", requirements).await.unwrap();
        assert_eq!(generator.remaining(), 1);
        let second = pipeline.generate_jdl("lib", requirements).await.unwrap();
        assert_eq!(generator.remaining(), 0);
        assert_eq!(first.source, Source::Fallback);
        assert_eq!(second.source, Source::Fallback);
        assert_eq!(first.value.document, extract::extract_entities(requirements));
        assert_eq!(first.value.jdl, second.value.jdl);
        assert_eq!(pipeline.store().read_jdl("lib").unwrap(), first.value.jdl);
    }

    #[tokio::test]
    async fn mock_data_keeps_conforming_llm_collections() {
        let (_tmp, _gen, pipeline) = pipeline(
            ScriptedGenerator::new().reply(r#"{"books": [{"title": "Dune"}], "authors": "oops"}"#),
        );
        let out = pipeline.generate_mock_data("lib", Some(LIBRARY), 3).await.unwrap();
        assert_eq!(out.source, Source::Mixed);
        assert_eq!(out.value["books"], json!([{"title": "Dune", "id": 1}]));
        assert_eq!(out.value["authors"].as_array().unwrap().len(), 3);
        assert_eq!(pipeline.store().read_db("lib").unwrap(), out.value);
        assert!(pipeline.store().read_jdl("lib").unwrap().contains("entity Author"));
    }

    #[tokio::test]
    async fn mock_data_needs_some_jdl() {
        let (_tmp, _gen, pipeline) = pipeline(ScriptedGenerator::new());
        let err = pipeline.generate_mock_data("nothing", None, 3).await.unwrap_err();
        assert!(matches!(err, GenError::Core(protoforge_core::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn prototype_uses_llm_html_when_present() {
        let html = "<!DOCTYPE html><html><body>Books</body></html>";
        let (_tmp, _gen, pipeline) =
            pipeline(ScriptedGenerator::new().reply(format!("Here:\n```html\n{html}\n```")));
        let out = pipeline
            .generate_prototype("lib", "Track books and authors in a library")
            .await
            .unwrap();
        assert_eq!(out.source, Source::Llm);
        assert_eq!(out.value, INDEX_FILE);
        assert_eq!(pipeline.store().read_artifact("lib", INDEX_FILE).unwrap(), html);
    }

    #[tokio::test]
    async fn prototype_falls_back_to_template() {
        let (_tmp, _gen, pipeline) = pipeline(ScriptedGenerator::new().reply("I'd rather not."));
        pipeline.store().write_jdl("lib", LIBRARY).unwrap();
        let out = pipeline.generate_prototype("lib", "Track books and authors").await.unwrap();
        assert_eq!(out.source, Source::Fallback);
        let page = pipeline.store().read_artifact("lib", INDEX_FILE).unwrap();
        assert!(page.contains("id=\"tab-authors\""));
        assert!(page.contains("<td>Title 1</td>"));
    }

    #[tokio::test]
    async fn json_server_synthesizes_missing_db() {
        let (_tmp, generator, pipeline) = pipeline(ScriptedGenerator::new());
        pipeline.store().write_jdl("lib", LIBRARY).unwrap();
        let files = pipeline.generate_json_server("lib", 4000).await.unwrap();
        assert!(files.contains(&"start.sh".to_string()));
        let db = pipeline.store().read_db("lib").unwrap();
        assert_eq!(db["books"].as_array().unwrap().len(), DEFAULT_RECORDS);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn crud_merges_llm_configs_with_derived_ones() {
        let (_tmp, _gen, pipeline) = pipeline(ScriptedGenerator::new().reply(
            r#"[{"entityName":"book","title":"Catalog","apiBaseUrl":"http://wrong","itemsPerPage":3,
                "attributes":[{"name":"title","label":"Book title","type":"text","required":true}]},
               {"entityName":"author","title":"Writers","attributes":[]}"#,
        ));
        pipeline.store().write_jdl("lib", LIBRARY).unwrap();
        let out = pipeline
            .generate_crud("lib", "http://localhost:3001", 20)
            .await
            .unwrap();
        assert_eq!(out.source, Source::Mixed);
        let author = &out.value[0];
        assert_eq!(author.title, "Authors");
        let book = &out.value[1];
        assert_eq!(book.title, "Catalog");
        assert_eq!(book.api_base_url, "http://localhost:3001/books");
        assert_eq!(book.items_per_page, 20);
        assert!(pipeline.store().files("lib").unwrap().contains(&"static/crud.html".to_string()));
    }

    #[tokio::test]
    async fn project_survives_a_dead_llm() {
        let (_tmp, _gen, pipeline) = pipeline(ScriptedGenerator::new());
        let out = pipeline
            .generate_project("shop", "Manage products and suppliers for a store.", 4, 3005)
            .await
            .unwrap();
        assert_eq!(out.source, Source::Fallback);
        assert_eq!(out.value.sources.len(), 4);
        for file in [
            "README.md",
            "api.js",
            "data.jdl",
            "db.json",
            "package.json",
            "start.bat",
            "start.sh",
            "static/config/entities.json",
            "static/crud.html",
            "static/index.html",
        ] {
            assert!(out.value.files.iter().any(|f| f == file), "missing {file}");
        }
        let api = pipeline.store().read_artifact("shop", "api.js").unwrap();
        assert!(api.contains("http://localhost:3005"));
    }

    #[tokio::test]
    async fn code_errors_propagate_and_research_degrades() {
        let (_tmp, _gen, pipeline) = pipeline(
            ScriptedGenerator::new()
                .reply("```rust\nfn main() {}\n```")
                .fail(LlmError::EmptyResponse),
        );
        let code = pipeline.generate_code("rust", "empty program", None).await.unwrap();
        assert_eq!(code, "fn main() {}");
        assert!(matches!(
            pipeline.generate_code("rust", "again", None).await,
            Err(GenError::Llm(LlmError::EmptyResponse))
        ));
        assert!(pipeline.research("A shop for books and more").await.is_empty());
    }

    #[tokio::test]
    async fn research_parses_suggestions() {
        let (_tmp, _gen, pipeline) = pipeline(ScriptedGenerator::new().reply(
            r#"[{"topic":"Orders","detail":"Customers probably place orders."},{"topic":" ","detail":"x"}]"#,
        ));
        let suggestions = pipeline.research("A shop for books").await;
        assert_eq!(
            suggestions,
            [Suggestion {
                topic: "Orders".into(),
                detail: "Customers probably place orders.".into()
            }]
        );
    }

    #[tokio::test]
    async fn locks_are_per_project() {
        let locks = ProjectLocks::new();
        let held = locks.lock("a").await;
        assert!(tokio::time::timeout(Duration::from_millis(50), locks.lock("a"))
            .await
            .is_err());
        let _other = tokio::time::timeout(Duration::from_millis(50), locks.lock("b"))
            .await
            .unwrap();
        drop(held);
        let _again = tokio::time::timeout(Duration::from_millis(50), locks.lock("a"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let locks = ProjectLocks::new();
        for name in ["one", "two", "three"] {
            drop(locks.lock(name).await);
        }
        let held = locks.lock("kept").await;
        assert_eq!(locks.tracked(), 1);
        drop(locks.lock("next").await);
        assert_eq!(locks.tracked(), 2);
        drop(held);
    }
}
