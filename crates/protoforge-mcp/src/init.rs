//! `protoforge-mcp init`: register this binary with the agent CLIs found on
//! `PATH`, pinned to the project folder it was run from.

use std::path::{Path, PathBuf};

use protoforge_core::ProjectStore;

type InitResult = Result<(), Box<dyn std::error::Error>>;

const SERVER_KEY: &str = "protoforge";
const PUBLIC_DIR_VAR: &str = "PROTOFORGE_PUBLIC_DIR";

/// What gets written into each agent config.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub command: String,
    pub public_dir: PathBuf,
}

impl Registration {
    /// Resolve `public_dir` against `cwd` so the registered server finds the
    /// same projects whatever directory the agent starts it from.
    pub fn new(command: impl Into<String>, cwd: &Path, public_dir: &str) -> Self {
        let public_dir = Path::new(public_dir);
        let public_dir = if public_dir.is_absolute() {
            public_dir.to_path_buf()
        } else {
            cwd.join(public_dir.strip_prefix(".").unwrap_or(public_dir))
        };
        Self {
            command: command.into(),
            public_dir,
        }
    }

    fn public_dir_str(&self) -> String {
        self.public_dir.to_string_lossy().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Agent {
    ClaudeCode,
    Codex,
}

impl Agent {
    const ALL: [Agent; 2] = [Agent::ClaudeCode, Agent::Codex];

    fn binary(self) -> &'static str {
        match self {
            Agent::ClaudeCode => "claude",
            Agent::Codex => "codex",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Agent::ClaudeCode => "Claude Code",
            Agent::Codex => "Codex",
        }
    }

    fn register(self, cwd: &Path, reg: &Registration) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match self {
            Agent::ClaudeCode => write_claude_config(cwd, reg),
            Agent::Codex => write_codex_config(cwd, reg),
        }
    }
}

pub fn init_project(public_dir: &str) -> InitResult {
    let command = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();
    let cwd = std::env::current_dir()?;
    let reg = Registration::new(command, &cwd, public_dir);

    let agents: Vec<Agent> = Agent::ALL.into_iter().filter(|a| on_path(a.binary())).collect();
    if agents.is_empty() {
        return Err(
            "neither `claude` nor `codex` found in PATH; install one, then re-run `protoforge-mcp init`"
                .into(),
        );
    }

    std::fs::create_dir_all(&reg.public_dir)?;
    for agent in &agents {
        let path = agent.register(&cwd, &reg)?;
        eprintln!("Wrote {}", path.display());
    }

    let projects = ProjectStore::new(reg.public_dir.clone()).list()?;
    let labels: Vec<&str> = agents.iter().map(|a| a.label()).collect();
    eprintln!(
        "\nDone. {} will manage projects in {} ({} existing).",
        labels.join(" and "),
        reg.public_dir.display(),
        projects.len()
    );
    Ok(())
}

fn on_path(name: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths)
            .any(|dir| dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file())
    })
}

/// `.mcp.json`; other servers in an existing file are kept.
fn write_claude_config(cwd: &Path, reg: &Registration) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = cwd.join(".mcp.json");
    let existing = std::fs::read_to_string(&path).ok();
    let mut root = existing
        .as_deref()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .filter(serde_json::Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}));

    if !root.get("mcpServers").is_some_and(serde_json::Value::is_object) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_KEY] = serde_json::json!({
        "type": "stdio",
        "command": reg.command,
        "args": [],
        "env": { PUBLIC_DIR_VAR: reg.public_dir_str() },
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    Ok(path)
}

/// `.codex/config.toml`, edited in place with `toml_edit` so comments and
/// unrelated keys survive.
fn write_codex_config(cwd: &Path, reg: &Registration) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = cwd.join(".codex");
    let path = dir.join("config.toml");
    let mut doc: toml_edit::DocumentMut = std::fs::read_to_string(&path)
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or_default();

    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let mut env = toml_edit::InlineTable::new();
    env.insert(PUBLIC_DIR_VAR, reg.public_dir_str().into());

    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(reg.command.as_str()));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    server.insert("env", toml_edit::value(env));
    doc["mcp_servers"][SERVER_KEY] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, doc.to_string())?;
    Ok(path)
}
