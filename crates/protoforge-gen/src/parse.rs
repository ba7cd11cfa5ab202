use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
});

/// Strip reasoning blocks and unwrap the first fenced code block.
pub fn clean_response(raw: &str) -> String {
    let mut text = THINK_BLOCK.replace_all(raw, "").into_owned();
    if let Some(idx) = text.find("<think>") {
        text.truncate(idx);
    }
    if let Some(body) = FENCE.captures(&text).and_then(|c| c.get(1)) {
        return body.as_str().trim().to_string();
    }
    text.trim().to_string()
}

fn between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn extract_json_object(text: &str) -> Option<&str> {
    between(text, '{', '}')
}

pub fn extract_json_array(text: &str) -> Option<&str> {
    between(text, '[', ']')
}

/// Parse the top-level objects of a malformed JSON array one at a time.
/// Objects that fail to deserialize are dropped.
pub fn recover_objects<T: DeserializeOwned>(text: &str) -> Vec<T> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        if let Ok(item) = serde_json::from_str::<T>(&text[s..=i]) {
                            out.push(item);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    out
}

/// Array of `T` from model output: whole-array parse first, then per-object
/// recovery. Empty on total failure.
pub fn parse_object_array<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    if let Some(json) = extract_json_array(raw) {
        if let Ok(items) = serde_json::from_str::<Vec<T>>(json) {
            return items;
        }
    }
    // A truncated array's last `]` may belong to a nested value, so recover
    // from the full text.
    recover_objects(raw)
}

/// The HTML document inside model output, if it contains one.
pub fn extract_html(text: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    if !lower.contains("<html") && !lower.contains("<body") {
        return None;
    }
    let start = lower
        .find("<!doctype")
        .or_else(|| lower.find("<html"))
        .unwrap_or(0);
    let end = lower
        .rfind("</html>")
        .map(|i| i + "</html>".len())
        .unwrap_or(text.len());
    if end <= start {
        return None;
    }
    Some(text[start..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn strips_think_blocks_and_fences() {
        let raw = "<think>hmm, entities...</think>\nHere you go:\n```jdl\nentity A { x String }\n```\nthanks";
        assert_eq!(clean_response(raw), "entity A { x String }");
    }

    #[test]
    fn unterminated_think_is_dropped() {
        assert_eq!(clean_response("  answer  <think>still thinking"), "answer");
    }

    #[test]
    fn plain_text_is_trimmed() {
        assert_eq!(clean_response("\n  [1, 2]\n"), "[1, 2]");
    }

    #[test]
    fn fence_without_language() {
        assert_eq!(clean_response("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn json_spans_first_open_to_last_close() {
        assert_eq!(extract_json_object("x {\"a\": {\"b\": 1}} y"), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_array("noise [1, [2]] tail"), Some("[1, [2]]"));
        assert_eq!(extract_json_array("] backwards ["), None);
        assert_eq!(extract_json_object("no json"), None);
    }

    #[test]
    fn recovers_valid_objects_from_broken_arrays() {
        let broken = r#"[{"a": "has } brace"}, {"a": 2,}, {"a": {"nested": true}}, {"a": "#;
        let items: Vec<Value> = recover_objects(broken);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["a"], "has } brace");
        assert_eq!(items[1]["a"]["nested"], true);
    }

    #[test]
    fn parse_object_array_prefers_the_whole_array() {
        let items: Vec<Value> = parse_object_array("Result: [{\"x\": 1}, {\"x\": 2}]");
        assert_eq!(items.len(), 2);
        let none: Vec<Value> = parse_object_array("nothing here");
        assert!(none.is_empty());
        let truncated: Vec<Value> =
            parse_object_array(r#"[{"name": "a", "tags": ["x"]}, {"name": "b", "tags": ["#);
        assert_eq!(truncated.len(), 1);
        assert_eq!(truncated[0]["name"], "a");
    }

    #[test]
    fn html_is_cut_from_doctype_to_closing_tag() {
        let text = "Sure!\n<!DOCTYPE html>\n<html><body>Hi</body></html>\nEnjoy.";
        assert_eq!(
            extract_html(text).as_deref(),
            Some("<!DOCTYPE html>\n<html><body>Hi</body></html>")
        );
        assert_eq!(
            extract_html("<HTML><BODY>x</BODY></HTML>").as_deref(),
            Some("<HTML><BODY>x</BODY></HTML>")
        );
        assert_eq!(extract_html("<div>not a page</div>"), None);
    }
}
