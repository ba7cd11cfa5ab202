pub mod config;
pub mod error;
pub mod extract;
pub mod jdl;
pub mod mock;
pub mod rules;
pub mod scaffold;
pub mod store;

use heck::{ToLowerCamelCase, ToTitleCase};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub use config::{Attribute, AttributeKind, EntityConfig};
pub use error::{Error, Result};
pub use store::ProjectStore;

// --- Types ---

/// A JDL field type. Built-in names map to their own variant; a name that
/// matches a declared `enum` becomes `Enum`, anything else is kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FieldType {
    String,
    TextBlob,
    Integer,
    Long,
    BigDecimal,
    Float,
    Double,
    Boolean,
    LocalDate,
    Instant,
    ZonedDateTime,
    Duration,
    Uuid,
    Blob,
    Enum(String),
    Other(String),
}

/// Coarse grouping used by the mock generator and the UI descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Text,
    Int,
    Float,
    Bool,
    Date,
    Enum,
}

impl FieldType {
    pub fn parse(name: &str, known_enums: &[EnumDef]) -> FieldType {
        match name {
            "String" => FieldType::String,
            "TextBlob" => FieldType::TextBlob,
            "Integer" => FieldType::Integer,
            "Long" => FieldType::Long,
            "BigDecimal" => FieldType::BigDecimal,
            "Float" => FieldType::Float,
            "Double" => FieldType::Double,
            "Boolean" => FieldType::Boolean,
            "LocalDate" => FieldType::LocalDate,
            "Instant" => FieldType::Instant,
            "ZonedDateTime" => FieldType::ZonedDateTime,
            "Duration" => FieldType::Duration,
            "UUID" => FieldType::Uuid,
            "Blob" | "AnyBlob" | "ImageBlob" => FieldType::Blob,
            other if known_enums.iter().any(|e| e.name == other) => {
                FieldType::Enum(other.to_string())
            }
            other => FieldType::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldType::String => "String",
            FieldType::TextBlob => "TextBlob",
            FieldType::Integer => "Integer",
            FieldType::Long => "Long",
            FieldType::BigDecimal => "BigDecimal",
            FieldType::Float => "Float",
            FieldType::Double => "Double",
            FieldType::Boolean => "Boolean",
            FieldType::LocalDate => "LocalDate",
            FieldType::Instant => "Instant",
            FieldType::ZonedDateTime => "ZonedDateTime",
            FieldType::Duration => "Duration",
            FieldType::Uuid => "UUID",
            FieldType::Blob => "Blob",
            FieldType::Enum(name) | FieldType::Other(name) => name,
        }
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            FieldType::Integer | FieldType::Long | FieldType::Duration => TypeCategory::Int,
            FieldType::BigDecimal | FieldType::Float | FieldType::Double => TypeCategory::Float,
            FieldType::Boolean => TypeCategory::Bool,
            FieldType::LocalDate | FieldType::Instant | FieldType::ZonedDateTime => {
                TypeCategory::Date
            }
            FieldType::Enum(_) => TypeCategory::Enum,
            _ => TypeCategory::Text,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, FieldType::Enum(_) | FieldType::Other(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> String {
        t.name().to_string()
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> FieldType {
        FieldType::parse(&s, &[])
    }
}

/// A field validation, serialized as its JDL token (`required`, `minlength(3)`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Validation {
    Required,
    Unique,
    MinLength(u32),
    MaxLength(u32),
    Min(f64),
    Max(f64),
    Pattern(String),
    Other(String),
}

impl Validation {
    /// Parse a single token such as `required` or `maxlength(50)`.
    pub fn parse(token: &str) -> Validation {
        let token = token.trim();
        let (name, arg) = match token.find('(') {
            Some(open) if token.ends_with(')') => {
                (&token[..open], Some(token[open + 1..token.len() - 1].trim()))
            }
            _ => (token, None),
        };
        let parsed = match (name.to_ascii_lowercase().as_str(), arg) {
            ("required", None) => Some(Validation::Required),
            ("unique", None) => Some(Validation::Unique),
            ("minlength", Some(a)) => a.parse().ok().map(Validation::MinLength),
            ("maxlength", Some(a)) => a.parse().ok().map(Validation::MaxLength),
            ("min" | "minbytes", Some(a)) => finite(a).map(Validation::Min),
            ("max" | "maxbytes", Some(a)) => finite(a).map(Validation::Max),
            ("pattern", Some(a)) => Some(Validation::Pattern(
                a.trim_matches('/').trim_matches('\'').to_string(),
            )),
            _ => None,
        };
        parsed.unwrap_or_else(|| Validation::Other(token.to_string()))
    }
}

/// `f64::from_str` also takes `NaN` and `inf`; those are not usable bounds.
fn finite(arg: &str) -> Option<f64> {
    arg.parse::<f64>().ok().filter(|x| x.is_finite())
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Required => f.write_str("required"),
            Validation::Unique => f.write_str("unique"),
            Validation::MinLength(n) => write!(f, "minlength({n})"),
            Validation::MaxLength(n) => write!(f, "maxlength({n})"),
            Validation::Min(x) => write!(f, "min({x})"),
            Validation::Max(x) => write!(f, "max({x})"),
            Validation::Pattern(p) => write!(f, "pattern(/{p}/)"),
            Validation::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<Validation> for String {
    fn from(v: Validation) -> String {
        v.to_string()
    }
}

impl From<String> for Validation {
    fn from(s: String) -> Validation {
        Validation::parse(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub validations: Vec<Validation>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            validations: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.validations.push(Validation::Required);
        self
    }

    pub fn is_required(&self) -> bool {
        self.validations.contains(&Validation::Required)
    }

    pub fn min_length(&self) -> Option<u32> {
        self.validations.iter().find_map(|v| match v {
            Validation::MinLength(n) => Some(*n),
            _ => None,
        })
    }

    pub fn max_length(&self) -> Option<u32> {
        self.validations.iter().find_map(|v| match v {
            Validation::MaxLength(n) => Some(*n),
            _ => None,
        })
    }

    pub fn min(&self) -> Option<f64> {
        self.validations.iter().find_map(|v| match v {
            Validation::Min(x) => Some(*x),
            _ => None,
        })
    }

    pub fn max(&self) -> Option<f64> {
        self.validations.iter().find_map(|v| match v {
            Validation::Max(x) => Some(*x),
            _ => None,
        })
    }

    pub fn pattern(&self) -> Option<&str> {
        self.validations.iter().find_map(|v| match v {
            Validation::Pattern(p) => Some(p.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipKind {
    pub fn parse(s: &str) -> Option<RelationshipKind> {
        match s {
            "OneToOne" => Some(RelationshipKind::OneToOne),
            "OneToMany" => Some(RelationshipKind::OneToMany),
            "ManyToOne" => Some(RelationshipKind::ManyToOne),
            "ManyToMany" => Some(RelationshipKind::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "OneToOne",
            RelationshipKind::OneToMany => "OneToMany",
            RelationshipKind::ManyToOne => "ManyToOne",
            RelationshipKind::ManyToMany => "ManyToMany",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub with: String,
    pub field: String,
    pub is_source: bool,
}

impl Relationship {
    /// Whether records of the owning entity carry a `<field>Id` foreign key.
    pub fn holds_foreign_key(&self) -> bool {
        match self.kind {
            RelationshipKind::ManyToOne | RelationshipKind::OneToOne => self.is_source,
            RelationshipKind::OneToMany => !self.is_source,
            RelationshipKind::ManyToMany => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn collection(&self) -> String {
        collection_name(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// Everything the JDL scanner recognized in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JdlDocument {
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumDef>,
}

impl JdlDocument {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn enum_values(&self, name: &str) -> Option<&[String]> {
        self.enums
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.values.as_slice())
    }

    pub fn collections(&self) -> Vec<String> {
        self.entities.iter().map(Entity::collection).collect()
    }
}

// --- Naming ---

/// JSON-Server collection name for an entity: lowercase English plural.
pub fn collection_name(entity: &str) -> String {
    pluralize(&entity.to_lower_camel_case()).to_lowercase()
}

pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() > 3 && lower.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if ["sses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|s| lower.ends_with(s))
    {
        word[..word.len() - 2].to_string()
    } else if lower.len() > 2
        && lower.ends_with('s')
        && !["ss", "us", "is"].iter().any(|s| lower.ends_with(s))
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Human label for a camelCase or snake_case field name.
pub fn field_label(name: &str) -> String {
    name.to_title_case()
}

/// Normalize a user-supplied project name into a safe directory name. The
/// result must keep at least one ASCII letter or digit.
pub fn sanitize_project_name(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().to_lowercase().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            ch
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed: String = out.trim_matches('-').chars().take(64).collect();
    let trimmed = trimmed.trim_end_matches('-').to_string();
    if trimmed.chars().any(|c| c.is_ascii_alphanumeric()) {
        Ok(trimmed)
    } else {
        Err(Error::InvalidName(raw.to_string()))
    }
}

// --- LLM Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub stream: bool,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            api_key: String::new(),
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
            stream: false,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Overlay `LLM_*` variables from `lookup` on top of the current values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.model = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("LLM_BASE_URL") {
            self.base_url = v;
        }
        if let Some(secs) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = secs;
        }
        if let Some(v) = lookup("LLM_STREAM") {
            self.stream = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

/// Resolve the per-user settings directory (~/.protoforge/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".protoforge")
}

fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Read settings from disk (defaults if missing or unreadable), then apply
/// environment overrides.
pub fn read_settings() -> LlmSettings {
    let path = settings_path();
    let mut settings: LlmSettings = fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    settings.apply_env(|key| std::env::var(key).ok());
    settings
}

pub fn write_settings(settings: &LlmSettings) -> Result<()> {
    if settings.provider.trim().is_empty() || settings.model.trim().is_empty() {
        return Err(Error::Settings("provider and model must be set".to_string()));
    }
    let dir = settings_dir();
    fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(settings_path(), json)?;
    Ok(())
}

pub fn ai_configured(settings: &LlmSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
