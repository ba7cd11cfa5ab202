//! Deterministic fallback mock data.
//!
//! Every value is a function of (entity, field, record index), so the same
//! document always produces the same `db.json`.

use chrono::{Days, NaiveDate};
use serde_json::{json, Map, Value};

use crate::{field_label, Entity, Field, FieldType, JdlDocument, TypeCategory};

/// A JSON-Server database: collection name -> array of records.
pub type Db = Map<String, Value>;

pub const MAX_RECORDS: usize = 1000;

/// Upper bound for generated text, whatever `minlength` asks for.
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Build `n` records for every entity in `doc`, keyed by collection name.
pub fn generate(doc: &JdlDocument, n: usize) -> Db {
    let n = n.clamp(1, MAX_RECORDS);
    let mut db = Db::new();
    for entity in &doc.entities {
        let records: Vec<Value> = (1..=n)
            .map(|i| Value::Object(record(doc, entity, i, n)))
            .collect();
        db.insert(entity.collection(), Value::Array(records));
    }
    db
}

fn record(doc: &JdlDocument, entity: &Entity, index: usize, n: usize) -> Map<String, Value> {
    let mut rec = Map::new();
    rec.insert("id".to_string(), json!(index));
    for field in &entity.fields {
        rec.insert(field.name.clone(), value_for(doc, entity, field, index));
    }
    for rel in entity.relationships.iter().filter(|r| r.holds_foreign_key()) {
        if doc.entity(&rel.with).is_none() {
            continue;
        }
        let target = (index * 3 - 1) % n + 1;
        rec.insert(format!("{}Id", rel.field), json!(target));
    }
    rec
}

fn seed(entity: &Entity, field: &Field) -> usize {
    entity
        .name
        .bytes()
        .chain(field.name.bytes())
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
}

fn value_for(doc: &JdlDocument, entity: &Entity, field: &Field, index: usize) -> Value {
    match field.field_type.category() {
        TypeCategory::Int => json!(int_value(field, index, seed(entity, field))),
        TypeCategory::Float => json!(float_value(field, index)),
        TypeCategory::Bool => json!(index % 2 == 1),
        TypeCategory::Date => json!(date_value(&field.field_type, index)),
        TypeCategory::Enum => {
            let values: &[String] = match &field.field_type {
                FieldType::Enum(name) => doc.enum_values(name).unwrap_or_default(),
                _ => &[],
            };
            if values.is_empty() {
                json!(text_value(entity, field, index))
            } else {
                json!(values[(index - 1) % values.len()])
            }
        }
        TypeCategory::Text if field.field_type == FieldType::Uuid => json!(format!(
            "00000000-0000-4000-8000-{:012x}",
            (seed(entity, field) % 0xffff_ffff) * 1000 + index
        )),
        TypeCategory::Text => json!(text_value(entity, field, index)),
    }
}

fn int_value(field: &Field, index: usize, seed: usize) -> i64 {
    // `as` saturates out-of-range floats at the i64 limits.
    let lo = field.min().map(|m| m.ceil() as i64).unwrap_or(0);
    let hi = field
        .max()
        .map(|m| m.floor() as i64)
        .unwrap_or(lo.saturating_add(1000))
        .max(lo);
    let span = (hi as i128 - lo as i128 + 1) as u128;
    let offset = (index as u128 * 7 + seed as u128) % span;
    (lo as i128 + offset as i128) as i64
}

fn float_value(field: &Field, index: usize) -> f64 {
    let lo = field.min().filter(|x| x.is_finite()).unwrap_or(0.0);
    let hi = field
        .max()
        .filter(|x| x.is_finite())
        .unwrap_or(lo + 1000.0)
        .max(lo);
    let fraction = ((index * 37) % 100) as f64 / 100.0;
    let value = ((lo + (hi - lo) * fraction) * 100.0).round() / 100.0;
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        lo
    }
}

fn date_value(field_type: &FieldType, index: usize) -> String {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let day = base
        .checked_add_days(Days::new(index as u64 - 1))
        .unwrap_or(base);
    match field_type {
        FieldType::LocalDate => day.format("%Y-%m-%d").to_string(),
        _ => format!("{}T09:00:00Z", day.format("%Y-%m-%d")),
    }
}

fn text_value(entity: &Entity, field: &Field, index: usize) -> String {
    let lower = field.name.to_lowercase();
    let label = field_label(&field.name);
    let base = if lower.contains("email") {
        format!("{}{}@example.com", entity.name.to_lowercase(), index)
    } else if lower.contains("phone") {
        format!("+1-555-{:04}", 100 + index)
    } else if lower.contains("url") || lower.contains("website") {
        format!("https://example.com/{}/{}", entity.collection(), index)
    } else if lower == "name" {
        format!("{} {}", field_label(&entity.name), index)
    } else if lower.contains("description") || field.field_type == FieldType::TextBlob {
        format!("Sample {} for {} {}.", label.to_lowercase(), entity.name, index)
    } else {
        format!("{} {}", label, index)
    };
    fit_length(base, field.min_length(), field.max_length())
}

fn fit_length(mut value: String, min: Option<u32>, max: Option<u32>) -> String {
    let min = min.map_or(0, |m| (m as usize).min(MAX_TEXT_LENGTH));
    let max = max.map_or(MAX_TEXT_LENGTH, |m| (m as usize).min(MAX_TEXT_LENGTH));
    let len = value.chars().count();
    if len < min {
        value.extend(std::iter::repeat('x').take(min - len));
    }
    if len.max(min) > max {
        value = value.chars().take(max).collect();
    }
    value
}

/// A collection is usable when it is a non-empty array of objects.
pub fn collection_conforms(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|records| !records.is_empty() && records.iter().all(Value::is_object))
}

/// Whether `db` has a usable collection for every entity in `doc`.
pub fn conforms(db: &Db, doc: &JdlDocument) -> bool {
    doc.entities
        .iter()
        .all(|e| db.get(&e.collection()).is_some_and(collection_conforms))
}

/// Give every record without a numeric `id` the next free one.
pub fn ensure_ids(records: &mut [Value]) {
    let mut next = max_id(records) + 1;
    for rec in records.iter_mut() {
        if let Some(obj) = rec.as_object_mut() {
            if !obj.get("id").is_some_and(Value::is_u64) {
                obj.insert("id".to_string(), json!(next));
                next += 1;
            }
        }
    }
}

pub fn max_id(records: &[Value]) -> u64 {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_u64))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jdl;

    const LIBRARY: &str = r#"
        enum Genre { FICTION, SCIENCE, HISTORY }
        entity Author {
            name String required maxlength(12)
            email String
            born LocalDate
        }
        entity Book {
            title String required minlength(20)
            price BigDecimal min(5) max(50)
            pages Integer min(10) max(20)
            inPrint Boolean
            genre Genre
            isbn UUID
            publishedAt Instant
            extra Money
        }
        relationship ManyToOne { Book{author} to Author }
    "#;

    #[test]
    fn produces_exactly_n_records_with_every_field() {
        let doc = jdl::parse(LIBRARY);
        let db = generate(&doc, 7);
        assert_eq!(db.len(), 2);
        for entity in &doc.entities {
            let records = db[&entity.collection()].as_array().unwrap();
            assert_eq!(records.len(), 7);
            for (i, rec) in records.iter().enumerate() {
                assert_eq!(rec["id"], json!(i + 1));
                for field in &entity.fields {
                    assert!(!rec[&field.name].is_null(), "{}.{} missing", entity.name, field.name);
                }
            }
        }
    }

    #[test]
    fn output_is_deterministic() {
        let doc = jdl::parse(LIBRARY);
        assert_eq!(generate(&doc, 5), generate(&doc, 5));
    }

    #[test]
    fn values_respect_validations() {
        let doc = jdl::parse(LIBRARY);
        let db = generate(&doc, 30);
        for rec in db["books"].as_array().unwrap() {
            let price = rec["price"].as_f64().unwrap();
            assert!((5.0..=50.0).contains(&price));
            let pages = rec["pages"].as_i64().unwrap();
            assert!((10..=20).contains(&pages));
            assert!(rec["title"].as_str().unwrap().len() >= 20);
            let genre = rec["genre"].as_str().unwrap();
            assert!(["FICTION", "SCIENCE", "HISTORY"].contains(&genre));
            let author_id = rec["authorId"].as_u64().unwrap();
            assert!((1..=30).contains(&author_id));
        }
        for rec in db["authors"].as_array().unwrap() {
            assert!(rec["name"].as_str().unwrap().chars().count() <= 12);
        }
    }

    #[test]
    fn type_specific_shapes() {
        let doc = jdl::parse(LIBRARY);
        let db = generate(&doc, 2);
        let author = &db["authors"][0];
        assert_eq!(author["email"], json!("author1@example.com"));
        assert_eq!(author["born"], json!("2024-01-01"));
        let book = &db["books"][1];
        assert_eq!(book["publishedAt"], json!("2024-01-02T09:00:00Z"));
        assert_eq!(book["inPrint"], json!(false));
        assert_eq!(book["extra"], json!("Extra 2"));
    }

    #[test]
    fn extreme_numeric_bounds_stay_in_range() {
        let doc = jdl::parse(
            "entity Meter {
                full Long min(-9223372036854775808) max(9223372036854775807)
                huge Long min(0) max(99999999999999999999)
                low Integer max(-1e20)
                reading Float min(NaN)
                ceiling BigDecimal max(inf)
            }",
        );
        let db = generate(&doc, 3);
        for rec in db["meters"].as_array().unwrap() {
            assert!(rec["full"].is_i64());
            assert!(rec["huge"].as_i64().unwrap() >= 0);
            assert!(rec["low"].is_i64());
            let reading = rec["reading"].as_f64().unwrap();
            assert!((0.0..=1000.0).contains(&reading));
            assert!(rec["ceiling"].as_f64().unwrap().is_finite());
        }
    }

    #[test]
    fn text_length_is_capped() {
        let doc = jdl::parse("entity Post { body String minlength(4000000000) }");
        let db = generate(&doc, 2);
        for rec in db["posts"].as_array().unwrap() {
            assert_eq!(rec["body"].as_str().unwrap().chars().count(), MAX_TEXT_LENGTH);
        }
    }

    #[test]
    fn record_count_is_clamped() {
        let doc = jdl::parse("entity A { x String }");
        assert_eq!(generate(&doc, 0)["as"].as_array().unwrap().len(), 1);
        assert_eq!(generate(&doc, 5000)["as"].as_array().unwrap().len(), MAX_RECORDS);
    }

    #[test]
    fn conformance_checks_every_collection() {
        let doc = jdl::parse(LIBRARY);
        let mut db = generate(&doc, 2);
        assert!(conforms(&db, &doc));
        db.insert("books".to_string(), json!([]));
        assert!(!conforms(&db, &doc));
        db.insert("books".to_string(), json!([1, 2]));
        assert!(!conforms(&db, &doc));
    }

    #[test]
    fn ensure_ids_fills_gaps_after_the_max() {
        let mut records = vec![json!({"id": 4}), json!({"name": "a"}), json!({"id": "x"})];
        ensure_ids(&mut records);
        assert_eq!(records[1]["id"], json!(5));
        assert_eq!(records[2]["id"], json!(6));
    }
}
