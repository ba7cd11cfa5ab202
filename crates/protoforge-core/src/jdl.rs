//! Best-effort JDL scanning.
//!
//! This is a regex and brace-matching scan, not a grammar. Anything it does not
//! recognize is skipped; `parse` never fails. `lint` reports what was skipped.

use heck::ToLowerCamelCase;
use regex::Regex;
use std::sync::LazyLock;

use crate::{Entity, EnumDef, Field, FieldType, JdlDocument, Relationship, RelationshipKind, Validation};

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("valid regex"));
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static ENUM_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\benum\s+([A-Za-z_]\w*)\s*\{").expect("valid regex"));
static ENTITY_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bentity\s+([A-Za-z_]\w*)\s*(?:\([^)]*\))?\s*\{").expect("valid regex")
});
static RELATIONSHIP_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brelationship\s+(\w+)\s*\{").expect("valid regex"));
static ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^@\w+(?:\([^)]*\))?\s*"#).expect("valid regex"));
static FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\s+([A-Za-z_]\w*)(.*)$").expect("valid regex"));
static VALIDATION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pattern\s*\(\s*(?:/(?:\\.|[^/\\])*/|'[^']*')\s*\)|[A-Za-z]\w*(?:\s*\([^)]*\))?")
        .expect("valid regex")
});
static RELATIONSHIP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*(?:\{([^}]*)\})?\s+to\s+([A-Za-z_]\w*)\s*(?:\{([^}]*)\})?")
        .expect("valid regex")
});
static LEADING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_]\w*)").expect("valid regex"));

/// Scan JDL text for enums, entities and relationships.
pub fn parse(text: &str) -> JdlDocument {
    scan(text).0
}

/// Warnings for constructs the scanner skipped or could not resolve.
pub fn lint(text: &str) -> Vec<String> {
    scan(text).1
}

fn strip_comments(text: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(text, "");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Body of the block whose opening brace sits at `open`, plus the index just
/// past its closing brace. `None` when the block is never closed.
fn block_body(text: &str, open: usize) -> Option<(&str, usize)> {
    let mut depth = 0usize;
    for (i, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let close = open + i;
                    return Some((&text[open + 1..close], close + 1));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a block body on newlines and on commas outside of parentheses/braces.
fn split_entries(body: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' | '{' => depth += 1,
            ')' | '}' => depth -= 1,
            '\n' | ',' if depth <= 0 => {
                entries.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(body[start..].trim());
    entries.into_iter().filter(|e| !e.is_empty()).collect()
}

fn strip_annotations(entry: &str) -> &str {
    let mut rest = entry.trim();
    while let Some(m) = ANNOTATION.find(rest) {
        rest = rest[m.end()..].trim_start();
    }
    rest
}

fn scan(text: &str) -> (JdlDocument, Vec<String>) {
    let clean = strip_comments(text);
    let mut warnings = Vec::new();

    let enums = scan_enums(&clean);
    let mut entities = scan_entities(&clean, &enums, &mut warnings);
    scan_relationships(&clean, &mut entities, &mut warnings);

    for entity in &entities {
        for field in &entity.fields {
            if let FieldType::Other(name) = &field.field_type {
                warnings.push(format!(
                    "field '{}.{}' has unknown type '{}'",
                    entity.name, field.name, name
                ));
            }
        }
    }

    (JdlDocument { entities, enums }, warnings)
}

fn scan_enums(text: &str) -> Vec<EnumDef> {
    let mut enums: Vec<EnumDef> = Vec::new();
    for caps in ENUM_HEAD.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some((body, _)) = block_body(text, whole.end() - 1) else {
            continue;
        };
        if enums.iter().any(|e| e.name == name.as_str()) {
            continue;
        }
        let values = split_entries(body)
            .into_iter()
            .filter_map(|entry| LEADING_WORD.captures(entry))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        enums.push(EnumDef {
            name: name.as_str().to_string(),
            values,
        });
    }
    enums
}

fn scan_entities(text: &str, enums: &[EnumDef], warnings: &mut Vec<String>) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::new();
    for caps in ENTITY_HEAD.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let Some((body, _)) = block_body(text, whole.end() - 1) else {
            warnings.push(format!("entity '{name}' is never closed"));
            continue;
        };
        if entities.iter().any(|e| e.name == name) {
            warnings.push(format!("duplicate entity '{name}' ignored"));
            continue;
        }

        let mut entity = Entity::new(name);
        for entry in split_entries(body) {
            let entry = strip_annotations(entry);
            let Some(field) = FIELD.captures(entry) else {
                if !entry.is_empty() {
                    warnings.push(format!("ignored '{entry}' in entity '{name}'"));
                }
                continue;
            };
            let field_name = &field[1];
            if entity.fields.iter().any(|f| f.name == field_name) {
                continue;
            }
            let validations = VALIDATION_TOKEN
                .find_iter(&field[3])
                .map(|m| Validation::parse(m.as_str()))
                .collect();
            entity.fields.push(Field {
                name: field_name.to_string(),
                field_type: FieldType::parse(&field[2], enums),
                validations,
            });
        }
        if entity.fields.is_empty() {
            warnings.push(format!("entity '{name}' has no recognized fields"));
        }
        entities.push(entity);
    }
    entities
}

fn side_field(raw: Option<regex::Match<'_>>, other_entity: &str) -> String {
    raw.and_then(|m| LEADING_WORD.captures(m.as_str()))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| other_entity.to_lower_camel_case())
}

fn scan_relationships(text: &str, entities: &mut [Entity], warnings: &mut Vec<String>) {
    for caps in RELATIONSHIP_HEAD.captures_iter(text) {
        let (Some(whole), Some(kind_name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some((body, _)) = block_body(text, whole.end() - 1) else {
            continue;
        };
        let Some(kind) = RelationshipKind::parse(kind_name.as_str()) else {
            warnings.push(format!(
                "unknown relationship kind '{}' ignored",
                kind_name.as_str()
            ));
            continue;
        };

        for entry in split_entries(body) {
            let entry = strip_annotations(entry);
            let Some(line) = RELATIONSHIP_LINE.captures(entry) else {
                warnings.push(format!("ignored relationship '{entry}'"));
                continue;
            };
            let from = &line[1];
            let to = &line[3];
            let from_idx = entities.iter().position(|e| e.name == from);
            let to_idx = entities.iter().position(|e| e.name == to);
            let (Some(from_idx), Some(to_idx)) = (from_idx, to_idx) else {
                for missing in [from, to] {
                    if !entities.iter().any(|e| e.name == missing) {
                        warnings.push(format!(
                            "relationship references unknown entity '{missing}'"
                        ));
                    }
                }
                continue;
            };

            let from_field = side_field(line.get(2), to);
            let to_field = side_field(line.get(4), from);
            entities[from_idx].relationships.push(Relationship {
                kind,
                with: to.to_string(),
                field: from_field,
                is_source: true,
            });
            entities[to_idx].relationships.push(Relationship {
                kind,
                with: from.to_string(),
                field: to_field,
                is_source: false,
            });
        }
    }
}

/// Render a document back to canonical JDL.
pub fn render(doc: &JdlDocument) -> String {
    let mut out = String::with_capacity(1024);

    for e in &doc.enums {
        out.push_str("enum ");
        out.push_str(&e.name);
        out.push_str(" {\n  ");
        out.push_str(&e.values.join(",\n  "));
        out.push_str("\n}\n\n");
    }

    for entity in &doc.entities {
        out.push_str("entity ");
        out.push_str(&entity.name);
        out.push_str(" {\n");
        let lines: Vec<String> = entity
            .fields
            .iter()
            .map(|f| {
                let mut line = format!("  {} {}", f.name, f.field_type);
                for v in &f.validations {
                    line.push(' ');
                    line.push_str(&v.to_string());
                }
                line
            })
            .collect();
        out.push_str(&lines.join(",\n"));
        if !lines.is_empty() {
            out.push('\n');
        }
        out.push_str("}\n\n");
    }

    // Group source-side relationships by kind, in order of first appearance.
    let mut groups: Vec<(RelationshipKind, Vec<String>)> = Vec::new();
    for entity in &doc.entities {
        for rel in entity.relationships.iter().filter(|r| r.is_source) {
            let target_field = doc
                .entity(&rel.with)
                .and_then(|target| {
                    target.relationships.iter().find(|r| {
                        !r.is_source && r.kind == rel.kind && r.with == entity.name
                    })
                })
                .map(|r| r.field.clone())
                .unwrap_or_else(|| entity.name.to_lower_camel_case());
            let line = format!(
                "  {}{{{}}} to {}{{{}}}",
                entity.name, rel.field, rel.with, target_field
            );
            match groups.iter_mut().find(|(k, _)| *k == rel.kind) {
                Some((_, lines)) => lines.push(line),
                None => groups.push((rel.kind, vec![line])),
            }
        }
    }
    for (kind, lines) in groups {
        out.push_str("relationship ");
        out.push_str(kind.as_str());
        out.push_str(" {\n");
        out.push_str(&lines.join(",\n"));
        out.push_str("\n}\n\n");
    }

    out.trim_end().to_string() + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeCategory;

    const SHOP: &str = r#"
        /* Online shop */
        enum OrderStatus { PENDING, SHIPPED (Shipped), DELIVERED }

        entity Customer (customer_tbl) {
            firstName String required maxlength(50),
            email String required pattern(/^[^@]+@[^@]+$/)
            // loyalty program
            points Integer min(0) max(1000)
        }

        entity Order {
            placedAt Instant required
            status OrderStatus
            total BigDecimal
        }

        relationship OneToMany {
            Customer{orders} to Order{customer(firstName) required}
        }
    "#;

    #[test]
    fn extracts_entities_fields_and_validations() {
        let doc = parse(SHOP);
        assert_eq!(doc.entities.len(), 2);

        let customer = doc.entity("Customer").unwrap();
        assert_eq!(customer.fields.len(), 3);
        let first = customer.field("firstName").unwrap();
        assert_eq!(first.field_type, FieldType::String);
        assert!(first.is_required());
        assert_eq!(first.max_length(), Some(50));
        assert_eq!(customer.field("email").unwrap().pattern(), Some("^[^@]+@[^@]+$"));
        let points = customer.field("points").unwrap();
        assert_eq!((points.min(), points.max()), (Some(0.0), Some(1000.0)));

        let order = doc.entity("Order").unwrap();
        assert_eq!(
            order.field("status").unwrap().field_type,
            FieldType::Enum("OrderStatus".into())
        );
        assert_eq!(order.field("total").unwrap().field_type.category(), TypeCategory::Float);
    }

    #[test]
    fn enum_labels_are_dropped() {
        let doc = parse(SHOP);
        assert_eq!(
            doc.enum_values("OrderStatus").unwrap(),
            ["PENDING", "SHIPPED", "DELIVERED"]
        );
    }

    #[test]
    fn links_both_sides_of_a_relationship() {
        let doc = parse(SHOP);
        let customer = doc.entity("Customer").unwrap();
        assert_eq!(
            customer.relationships,
            vec![Relationship {
                kind: RelationshipKind::OneToMany,
                with: "Order".into(),
                field: "orders".into(),
                is_source: true,
            }]
        );
        let order = doc.entity("Order").unwrap();
        assert_eq!(order.relationships[0].field, "customer");
        assert!(!order.relationships[0].is_source);
    }

    #[test]
    fn relationship_fields_default_to_entity_names() {
        let doc = parse(
            "entity OrderItem { qty Integer }\nentity Order { total Float }\n\
             relationship ManyToOne { OrderItem to Order }",
        );
        let item = doc.entity("OrderItem").unwrap();
        assert_eq!(item.relationships[0].field, "order");
        let order = doc.entity("Order").unwrap();
        assert_eq!(order.relationships[0].field, "orderItem");
    }

    #[test]
    fn unknown_endpoints_and_kinds_are_skipped() {
        let text = "entity A { x String }\n\
                    relationship ManyToOne { A{b} to Missing }\n\
                    relationship Sideways { A to A }";
        let doc = parse(text);
        assert!(doc.entity("A").unwrap().relationships.is_empty());
        let warnings = lint(text);
        assert!(warnings.iter().any(|w| w.contains("unknown entity 'Missing'")));
        assert!(warnings.iter().any(|w| w.contains("Sideways")));
    }

    #[test]
    fn malformed_input_never_panics() {
        for text in [
            "",
            "entity",
            "entity Broken {",
            "entity { name String }",
            "relationship OneToOne {{{{",
            "}}}} entity X { ( ) , , }",
            "entity Ünïcode { naïve String }",
        ] {
            let _ = parse(text);
            let _ = lint(text);
        }
        assert!(parse("entity Broken { name String").is_empty());
    }

    #[test]
    fn duplicate_entities_keep_the_first() {
        let doc = parse("entity A { x String }\nentity A { y Integer }");
        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].fields[0].name, "x");
    }

    #[test]
    fn lint_reports_empty_entities_and_unknown_types() {
        let warnings = lint("entity Empty { }\nentity T { amount Money }");
        assert!(warnings.iter().any(|w| w.contains("'Empty' has no recognized fields")));
        assert!(warnings.iter().any(|w| w.contains("unknown type 'Money'")));
    }

    #[test]
    fn render_then_parse_keeps_the_model() {
        let doc = parse(SHOP);
        let rendered = render(&doc);
        assert!(rendered.contains("relationship OneToMany {\n  Customer{orders} to Order{customer}\n}"));
        assert_eq!(parse(&rendered), doc);
    }
}
