use protoforge_core::{rules::JDL_RULES, JdlDocument};

use crate::engine::ChatPrompt;

/// Compact text form of a document for model consumption.
pub fn serialize_entities(doc: &JdlDocument) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str("ENTITIES:\n");
    for entity in &doc.entities {
        out.push_str("[E] ");
        out.push_str(&entity.name);
        out.push_str(" (");
        out.push_str(&entity.collection());
        out.push_str(")\n");
        for field in &entity.fields {
            out.push_str("  ");
            out.push_str(&field.name);
            out.push(' ');
            out.push_str(field.field_type.name());
            for v in &field.validations {
                out.push(' ');
                out.push_str(&v.to_string());
            }
            out.push('\n');
        }
        // Target sides are listed only when they carry the foreign key.
        for rel in entity.relationships.iter().filter(|r| r.is_source || r.holds_foreign_key()) {
            if rel.is_source {
                out.push_str("  -> ");
                out.push_str(&rel.field);
                out.push_str(": ");
                out.push_str(rel.kind.as_str());
                out.push(' ');
            } else {
                out.push_str("  <- ");
                out.push_str(&rel.field);
                out.push_str(": ");
            }
            out.push_str(&rel.with);
            if rel.holds_foreign_key() {
                out.push_str(" (fk ");
                out.push_str(&rel.field);
                out.push_str("Id)");
            }
            out.push('\n');
        }
    }

    if !doc.enums.is_empty() {
        out.push_str("ENUMS:\n");
        for e in &doc.enums {
            out.push_str("  ");
            out.push_str(&e.name);
            out.push_str(": ");
            out.push_str(&e.values.join(", "));
            out.push('\n');
        }
    }

    out
}

pub fn jdl_prompt(requirements: &str) -> ChatPrompt {
    ChatPrompt::new()
        .system(format!(
            "You are a data modeling assistant. Turn application requirements into \
JHipster Domain Language (JDL).\n\n\
## JDL Rules\n{JDL_RULES}\n\n\
Output ONLY JDL, nothing else."
        ))
        .user(requirements.trim())
}

pub fn mock_data_prompt(doc: &JdlDocument, records: usize) -> ChatPrompt {
    let keys = doc.collections().join(", ");
    ChatPrompt::new()
        .system(format!(
            "You generate realistic sample data for a JSON Server mock API.\n\
Output ONLY a JSON object whose keys are exactly: {keys}.\n\
Each key maps to an array of {records} objects. Every object has a numeric \"id\" \
starting at 1, every listed field, and a numeric \"<field>Id\" for each foreign key \
pointing at an existing record. Respect the listed validations. \
Values must be plausible for the domain, not placeholders."
        ))
        .user(serialize_entities(doc))
}

pub fn prototype_prompt(requirements: &str, doc: &JdlDocument) -> ChatPrompt {
    ChatPrompt::new()
        .system(
            "You are a front-end designer. Build a single-file HTML prototype: \
a top navigation bar, one tab per entity, and a table of example records in each tab. \
Inline all CSS and JavaScript. No external assets, no build step.\n\
Output ONLY the complete HTML document starting with <!DOCTYPE html>.",
        )
        .user(format!(
            "Requirements:\n{}\n\n{}",
            requirements.trim(),
            serialize_entities(doc)
        ))
}

pub fn entity_config_prompt(doc: &JdlDocument, base_url: &str, items_per_page: u32) -> ChatPrompt {
    ChatPrompt::new()
        .system(format!(
            "You configure a generic CRUD grid. For every entity output one object:\n\
{{\"entityName\":\"<lowerCamel>\",\"title\":\"<plural title>\",\
\"apiBaseUrl\":\"{base}/<collection>\",\"itemsPerPage\":{items_per_page},\
\"attributes\":[{{\"name\":\"<field>\",\"label\":\"<label>\",\
\"type\":\"text|textarea|email|number|checkbox|date|select\",\"required\":true|false,\
\"options\":[...] (select only),\"min\":n,\"max\":n,\"minLength\":n,\"maxLength\":n}}]}}\n\
Output ONLY a JSON array of these objects, nothing else.",
            base = base_url.trim_end_matches('/'),
        ))
        .user(serialize_entities(doc))
}

pub fn code_prompt(language: &str, description: &str, context: Option<&str>) -> ChatPrompt {
    let mut user = format!("Language: {language}\nTask: {}", description.trim());
    if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
        user.push_str("\n\nContext:\n");
        user.push_str(ctx);
    }
    ChatPrompt::new()
        .system(format!(
            "You are a senior {language} developer. Write complete, working code for the task. \
Output ONLY the code in a single fenced block."
        ))
        .user(user)
}

pub fn research_prompt(requirements: &str) -> ChatPrompt {
    ChatPrompt::new()
        .system(
            "You review application requirements before they are turned into a data model. \
Point out missing entities, unclear relationships, fields that will obviously be needed, \
and ambiguities worth resolving.\n\
Output ONLY a JSON array. Each item: {\"topic\":\"<short title>\",\"detail\":\"<one or two sentences>\"}. \
If nothing to suggest, output [].",
        )
        .user(requirements.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Role;
    use protoforge_core::jdl;

    #[test]
    fn serializes_fields_relationships_and_enums() {
        let doc = jdl::parse(
            "enum Status { OPEN, CLOSED }\n\
             entity Ticket { title String required, status Status }\n\
             entity User { login String }\n\
             relationship ManyToOne { Ticket{assignee} to User }",
        );
        let text = serialize_entities(&doc);
        assert!(text.contains("[E] Ticket (tickets)\n  title String required\n  status Status\n"));
        assert!(text.contains("  -> assignee: ManyToOne User (fk assigneeId)\n"));
        assert!(text.contains("ENUMS:\n  Status: OPEN, CLOSED\n"));
        assert!(!text.contains("-> ticket"));
        assert!(!text.contains("<- ticket"));
    }

    #[test]
    fn one_to_many_targets_show_their_foreign_key() {
        let doc = jdl::parse(
            "entity Customer { name String }\n\
             entity Order { total BigDecimal }\n\
             relationship OneToMany { Customer{orders} to Order{customer} }",
        );
        let text = serialize_entities(&doc);
        assert!(text.contains("  -> orders: OneToMany Order\n"));
        assert!(text.contains("  <- customer: Customer (fk customerId)\n"));
    }

    #[test]
    fn jdl_prompt_embeds_rules() {
        let prompt = jdl_prompt("  A shop that sells books.  ");
        assert_eq!(prompt.messages[0].role, Role::System);
        assert!(prompt.messages[0].content.contains(JDL_RULES));
        assert_eq!(prompt.messages[1].content, "A shop that sells books.");
    }

    #[test]
    fn mock_prompt_lists_collections() {
        let doc = jdl::parse("entity Book { title String }\nentity Category { name String }");
        let prompt = mock_data_prompt(&doc, 4);
        assert!(prompt.messages[0].content.contains("exactly: books, categories"));
        assert!(prompt.messages[0].content.contains("array of 4 objects"));
    }

    #[test]
    fn code_prompt_skips_blank_context() {
        let with = code_prompt("rust", "parse a csv", Some("use serde"));
        assert!(with.messages[1].content.ends_with("Context:\nuse serde"));
        let without = code_prompt("rust", "parse a csv", Some("   "));
        assert!(!without.messages[1].content.contains("Context"));
    }
}
