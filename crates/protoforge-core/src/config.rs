use heck::{ToLowerCamelCase, ToTitleCase};
use serde::{Deserialize, Serialize};

use crate::{field_label, pluralize, Entity, FieldType, JdlDocument, TypeCategory};

pub const DEFAULT_ITEMS_PER_PAGE: u32 = 10;

/// Input control used by the CRUD grid for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Date,
    Select,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// UI-rendering descriptor consumed by `crud-grid.js`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    pub entity_name: String,
    pub title: String,
    pub api_base_url: String,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
    pub attributes: Vec<Attribute>,
}

fn default_items_per_page() -> u32 {
    DEFAULT_ITEMS_PER_PAGE
}

impl EntityConfig {
    /// Derive a descriptor from a scanned entity. `base_url` is the mock API
    /// root, without a trailing slash.
    pub fn from_entity(
        doc: &JdlDocument,
        entity: &Entity,
        base_url: &str,
        items_per_page: u32,
    ) -> EntityConfig {
        let attributes = entity
            .fields
            .iter()
            .map(|f| {
                let options = match &f.field_type {
                    FieldType::Enum(name) => doc.enum_values(name).map(<[String]>::to_vec),
                    _ => None,
                };
                let kind = match f.field_type.category() {
                    TypeCategory::Int | TypeCategory::Float => AttributeKind::Number,
                    TypeCategory::Bool => AttributeKind::Checkbox,
                    TypeCategory::Date => AttributeKind::Date,
                    TypeCategory::Enum if options.is_some() => AttributeKind::Select,
                    _ if f.field_type == FieldType::TextBlob
                        || f.max_length().is_some_and(|n| n > 255) =>
                    {
                        AttributeKind::Textarea
                    }
                    _ if f.name.to_lowercase().contains("email") => AttributeKind::Email,
                    _ => AttributeKind::Text,
                };
                Attribute {
                    name: f.name.clone(),
                    label: field_label(&f.name),
                    kind,
                    required: f.is_required(),
                    options,
                    min: f.min(),
                    max: f.max(),
                    min_length: f.min_length(),
                    max_length: f.max_length(),
                    pattern: f.pattern().map(str::to_string),
                }
            })
            .collect();

        EntityConfig {
            entity_name: entity.name.to_lower_camel_case(),
            title: pluralize(&entity.name).to_title_case(),
            api_base_url: format!("{}/{}", base_url.trim_end_matches('/'), entity.collection()),
            items_per_page: items_per_page.clamp(1, 100),
            attributes,
        }
    }

    /// A config is only usable if it names an entity and has attributes.
    pub fn is_usable(&self) -> bool {
        !self.entity_name.trim().is_empty()
            && !self.api_base_url.trim().is_empty()
            && !self.attributes.is_empty()
            && self.attributes.iter().all(|a| !a.name.trim().is_empty())
    }
}

/// Descriptors for every entity in the document.
pub fn configs_for(doc: &JdlDocument, base_url: &str, items_per_page: u32) -> Vec<EntityConfig> {
    doc.entities
        .iter()
        .map(|e| EntityConfig::from_entity(doc, e, base_url, items_per_page))
        .collect()
}
