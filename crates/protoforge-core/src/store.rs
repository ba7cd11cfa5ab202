use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::mock::Db;
use crate::{sanitize_project_name, Error, Result};

pub const JDL_FILE: &str = "data.jdl";
pub const DB_FILE: &str = "db.json";
pub const INDEX_FILE: &str = "static/index.html";

/// Generated projects, one directory per sanitized name under `root`.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a project. `name` must already be in sanitized form.
    pub fn project_dir(&self, name: &str) -> Result<PathBuf> {
        if sanitize_project_name(name)? != name {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.project_dir(name).is_ok_and(|dir| dir.is_dir())
    }

    /// List all project names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if !entry.file_type().ok()?.is_dir() {
                    return None;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                (!name.starts_with('.')).then_some(name)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn artifact_path(&self, name: &str, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        let safe = !rel.is_empty()
            && rel_path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(Error::InvalidPath(rel.to_string()));
        }
        Ok(self.project_dir(name)?.join(rel_path))
    }

    pub fn read_artifact(&self, name: &str, rel: &str) -> Result<String> {
        let path = self.artifact_path(name, rel)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("{name}/{rel}")),
            _ => Error::Io(e),
        })
    }

    /// Write an artifact, creating parent directories.
    ///
    /// Uses a temp file + rename so readers (the mock API, a browser reloading
    /// a prototype) never observe a half-written file.
    pub fn write_artifact(&self, name: &str, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.artifact_path(name, rel)?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::InvalidPath(rel.to_string()))?;
        fs::create_dir_all(dir)?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidPath(rel.to_string()))?;
        let tmp = dir.join(format!(".{file_name}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(project = name, artifact = rel, bytes = contents.len(), "wrote artifact");
        Ok(path)
    }

    #[cfg(unix)]
    pub fn set_executable(&self, name: &str, rel: &str) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let path = self.artifact_path(name, rel)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn set_executable(&self, _name: &str, _rel: &str) -> Result<()> {
        Ok(())
    }

    /// Relative paths of every file in the project, sorted, `/`-separated.
    pub fn files(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.project_dir(name)?;
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("project '{name}'")));
        }
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&dir)
            .standard_filters(false)
            .hidden(true)
            .build();
        for entry in walker {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&dir) {
                let parts: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect();
                files.push(parts.join("/"));
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let dir = self.project_dir(name)?;
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("project '{name}'")));
        }
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    pub fn read_jdl(&self, name: &str) -> Result<String> {
        self.read_artifact(name, JDL_FILE)
    }

    pub fn write_jdl(&self, name: &str, jdl: &str) -> Result<PathBuf> {
        self.write_artifact(name, JDL_FILE, jdl)
    }

    pub fn read_db(&self, name: &str) -> Result<Db> {
        let raw = self.read_artifact(name, DB_FILE)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_db(&self, name: &str, db: &Db) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(db)?;
        self.write_artifact(name, DB_FILE, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let tmp = TempDir::new().unwrap();
        let store = ProjectStore::new(tmp.path().join("public"));
        (tmp, store)
    }

    #[test]
    fn write_then_read_artifacts() {
        let (_tmp, store) = store();
        store.write_artifact("shop", "static/js/app.js", "console.log(1)").unwrap();
        assert_eq!(store.read_artifact("shop", "static/js/app.js").unwrap(), "console.log(1)");
        assert!(store.exists("shop"));
        assert_eq!(store.files("shop").unwrap(), ["static/js/app.js"]);
    }

    #[test]
    fn temp_files_do_not_linger() {
        let (_tmp, store) = store();
        store.write_jdl("shop", "entity A { x String }").unwrap();
        store.write_jdl("shop", "entity B { y String }").unwrap();
        let dir = store.project_dir("shop").unwrap();
        let names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["data.jdl"]);
        assert!(store.read_jdl("shop").unwrap().contains("entity B"));
    }

    #[test]
    fn rejects_escaping_paths_and_unsanitized_names() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.write_artifact("shop", "../evil.txt", "x"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            store.write_artifact("shop", "/etc/passwd", "x"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            store.write_artifact("My Shop", "a.txt", "x"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn list_and_delete() {
        let (_tmp, store) = store();
        assert!(store.list().unwrap().is_empty());
        store.write_jdl("zoo", "").unwrap();
        store.write_jdl("aquarium", "").unwrap();
        assert_eq!(store.list().unwrap(), ["aquarium", "zoo"]);
        store.delete("zoo").unwrap();
        assert_eq!(store.list().unwrap(), ["aquarium"]);
        assert!(matches!(store.delete("zoo"), Err(Error::NotFound(_))));
    }

    #[test]
    fn missing_artifacts_are_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(store.read_db("nothing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn db_round_trip() {
        let (_tmp, store) = store();
        let mut db = Db::new();
        db.insert("items".into(), json!([{"id": 1}]));
        store.write_db("shop", &db).unwrap();
        assert_eq!(store.read_db("shop").unwrap(), db);
    }
}
