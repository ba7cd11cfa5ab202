//! Rule-based entity extraction from free-text requirements.
//!
//! Used when the LLM is unavailable or returns unusable JDL. The result only
//! depends on the input text.

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use regex::Regex;
use std::sync::LazyLock;

use crate::{pluralize, singularize, Entity, Field, FieldType, JdlDocument, Relationship, RelationshipKind, Validation};

/// Words that introduce a noun worth modeling ("manage orders", "each invoice").
const CUE_WORDS: &[&str] = &[
    "manage", "manages", "managing", "track", "tracks", "tracking", "create", "creates", "store",
    "stores", "register", "registers", "add", "adds", "each", "every", "browse", "book", "books",
    "schedule", "schedules", "assign", "assigns", "upload", "uploads", "record", "records",
];

/// Nouns that introduce a collection when followed by "of" ("list of customers").
const COLLECTION_WORDS: &[&str] = &["list", "catalog", "catalogue", "set", "collection", "number"];

const SKIP_WORDS: &[&str] = &[
    "the", "a", "an", "their", "our", "all", "new", "existing", "multiple", "several", "many",
    "various", "any", "own", "its", "his", "her", "my", "your", "some", "other", "different",
    "individual", "personal", "available", "these", "those", "this", "that", "and", "or",
];

const GENERIC_NOUNS: &[&str] = &[
    "system", "application", "app", "data", "information", "info", "page", "screen", "ability",
    "way", "feature", "website", "site", "platform", "dashboard", "list", "thing", "detail",
    "record", "tool", "interface", "ui", "api", "json", "rest", "time", "option", "kind", "type",
    "support", "can", "should", "must", "will", "need", "want", "i", "we", "they", "it", "he",
    "she", "you", "user's", "also", "then", "when", "where", "which", "who", "with", "for", "from",
];

const STOP_WORDS: &[&str] = &[
    "which", "that", "so", "for", "to", "in", "on", "by", "from", "where", "when", "while",
];

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n;]+").expect("valid regex"));
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*|,").expect("valid regex"));
static HAS_MANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]\w*)\s+(?:has|have|contains?|holds?)\s+(?:many|multiple|several)\s+([a-z]\w*)")
        .expect("valid regex")
});
static BELONGS_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]\w*)\s+belongs?\s+to\s+(?:an?\s+|the\s+|one\s+)?([a-z]\w*)")
        .expect("valid regex")
});
static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),|\band\b|\bor\b").expect("valid regex"));

fn is_in(word: &str, list: &[&str]) -> bool {
    list.contains(&word.to_lowercase().as_str())
}

/// Singular PascalCase entity name for a candidate noun, or `None` if the noun
/// is too generic to model.
fn entity_name(word: &str) -> Option<String> {
    let word = word.trim_matches(|c: char| c == '\'' || c == '-');
    if word.len() < 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let singular = singularize(&word.to_lowercase());
    if is_in(&singular, GENERIC_NOUNS) || is_in(&singular, SKIP_WORDS) || is_in(&singular, CUE_WORDS) {
        return None;
    }
    Some(singular.to_upper_camel_case())
}

fn is_acronym(word: &str) -> bool {
    word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase())
}

fn candidates(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |name: Option<String>| {
        if let Some(name) = name {
            if !found.contains(&name) {
                found.push(name);
            }
        }
    };

    for sentence in SENTENCE.find_iter(text) {
        let words: Vec<&str> = TOKEN.find_iter(sentence.as_str()).map(|m| m.as_str()).collect();
        for i in 0..words.len() {
            let word = words[i];
            let start = if is_in(word, CUE_WORDS) {
                Some(i + 1)
            } else if is_in(word, COLLECTION_WORDS)
                && words.get(i + 1).is_some_and(|w| w.eq_ignore_ascii_case("of"))
            {
                Some(i + 2)
            } else {
                None
            };

            if let Some(mut j) = start {
                loop {
                    while words.get(j).is_some_and(|w| is_in(w, SKIP_WORDS)) {
                        j += 1;
                    }
                    let Some(noun) = words.get(j) else { break };
                    push(entity_name(noun));
                    match words.get(j + 1) {
                        Some(sep) if *sep == "," || is_in(sep, &["and", "or"]) => j += 2,
                        _ => break,
                    }
                }
            }

            let capitalized = word.chars().next().is_some_and(|c| c.is_ascii_uppercase());
            if i > 0 && capitalized && !is_acronym(word) {
                push(entity_name(word));
            }
        }
    }
    found
}

/// Guess a JDL type from a field name.
pub fn infer_type(field: &str) -> FieldType {
    let snake = field.to_snake_case();
    let words: Vec<&str> = snake.split('_').filter(|w| !w.is_empty()).collect();
    let has = |needles: &[&str]| words.iter().any(|w| needles.contains(w));
    let last = words.last().copied().unwrap_or_default();

    if has(&["email", "phone", "url", "website", "address", "code", "sku", "number"]) {
        FieldType::String
    } else if has(&["price", "amount", "cost", "total", "salary", "balance", "fee", "budget"]) {
        FieldType::BigDecimal
    } else if has(&["quantity", "count", "stock", "age", "qty", "rating", "year", "capacity", "score"]) {
        FieldType::Integer
    } else if last == "date" || last == "at" || has(&["birthday", "deadline", "dob"]) {
        FieldType::LocalDate
    } else if (words.len() > 1 && words[0] == "is")
        || matches!(
            snake.as_str(),
            "active" | "enabled" | "completed" | "done" | "available" | "published" | "paid"
        )
    {
        FieldType::Boolean
    } else if has(&["description", "notes", "bio", "content", "comment", "body", "summary"]) {
        FieldType::TextBlob
    } else {
        FieldType::String
    }
}

fn field_for(name: &str) -> Field {
    let field_type = infer_type(name);
    let mut field = Field::new(name, field_type.clone());
    let is_label = matches!(name, "name" | "title");
    if is_label {
        field.validations.push(Validation::Required);
    }
    match field_type {
        FieldType::String => field.validations.push(Validation::MaxLength(if is_label {
            100
        } else {
            255
        })),
        FieldType::BigDecimal | FieldType::Integer => field.validations.push(Validation::Min(0.0)),
        _ => {}
    }
    field
}

/// Field names listed after "<entity> with ..." phrases anywhere in the text.
fn listed_fields(text: &str, entity: &str) -> Vec<String> {
    let singular = entity.to_lowercase();
    let plural = pluralize(&singular);
    let pattern = format!(
        r"(?i)\b(?:{}|{})\s+(?:with|having|containing|that\s+ha(?:s|ve))\s+([^.;\n!?]+)",
        regex::escape(&plural),
        regex::escape(&singular)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(list) = caps.get(1) else { continue };
        for part in LIST_SEPARATOR.split(list.as_str()) {
            let mut words: Vec<&str> = Vec::new();
            for w in part.split_whitespace() {
                if is_in(w, STOP_WORDS) {
                    break;
                }
                if words.is_empty() && is_in(w, SKIP_WORDS) {
                    continue;
                }
                if !w.chars().all(|c| c.is_ascii_alphabetic()) {
                    break;
                }
                words.push(w);
            }
            if words.is_empty() || words.len() > 3 {
                continue;
            }
            let name = words.join(" ").to_lower_camel_case();
            if name != "id" && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn link(entities: &mut [Entity], kind: RelationshipKind, from: &str, to: &str) {
    let from_idx = entities.iter().position(|e| e.name == from);
    let to_idx = entities.iter().position(|e| e.name == to);
    let (Some(from_idx), Some(to_idx)) = (from_idx, to_idx) else {
        return;
    };
    if from_idx == to_idx
        || entities[from_idx]
            .relationships
            .iter()
            .any(|r| r.with == to && r.is_source)
    {
        return;
    }
    let from_field = match kind {
        RelationshipKind::OneToMany | RelationshipKind::ManyToMany => pluralize(&to.to_lower_camel_case()),
        _ => to.to_lower_camel_case(),
    };
    entities[from_idx].relationships.push(Relationship {
        kind,
        with: to.to_string(),
        field: from_field,
        is_source: true,
    });
    entities[to_idx].relationships.push(Relationship {
        kind,
        with: from.to_string(),
        field: from.to_lower_camel_case(),
        is_source: false,
    });
}

/// Extract entities, fields and simple relationships from requirements text.
pub fn extract_entities(requirements: &str) -> JdlDocument {
    let mut entities: Vec<Entity> = candidates(requirements)
        .into_iter()
        .map(|name| {
            let mut entity = Entity::new(&name);
            let names = listed_fields(requirements, &name);
            if !names.iter().any(|n| n == "name" || n == "title") {
                entity.fields.push(field_for("name"));
            }
            entity.fields.extend(names.iter().map(|n| field_for(n)));
            entity
        })
        .collect();

    for caps in HAS_MANY.captures_iter(requirements) {
        if let (Some(a), Some(b)) = (entity_name(&caps[1]), entity_name(&caps[2])) {
            link(&mut entities, RelationshipKind::OneToMany, &a, &b);
        }
    }
    for caps in BELONGS_TO.captures_iter(requirements) {
        if let (Some(a), Some(b)) = (entity_name(&caps[1]), entity_name(&caps[2])) {
            link(&mut entities, RelationshipKind::ManyToOne, &a, &b);
        }
    }

    tracing::debug!(count = entities.len(), "extracted entities from requirements");
    JdlDocument {
        entities,
        enums: Vec::new(),
    }
}
