//! Pulls a JSON object out of free-form model output.
//!
//! Small models wrap JSON in markdown fences or surround it with chatter.
//! This module only decodes; callers decide whether to retry.

use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Parsed(Map<String, JsonValue>),
    Unparsable(String),
}

impl Decoded {
    pub fn ok(self) -> Option<Map<String, JsonValue>> {
        match self {
            Decoded::Parsed(obj) => Some(obj),
            Decoded::Unparsable(_) => None,
        }
    }
}

pub fn decode_json(raw: &str) -> Decoded {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decoded::Unparsable("empty response".to_string());
    }

    for block in fenced_blocks(trimmed) {
        if let Some(obj) = first_object(block) {
            return Decoded::Parsed(obj);
        }
    }

    match first_object(trimmed) {
        Some(obj) => Decoded::Parsed(obj),
        None => Decoded::Unparsable(format!(
            "no JSON object found in {} bytes of output",
            trimmed.len()
        )),
    }
}

/// Contents of each ``` fenced block, language tag stripped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let body_start = match after_open.find('\n') {
            Some(nl) if !after_open[..nl].contains('{') => nl + 1,
            _ => 0,
        };
        let body = &after_open[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => break,
        }
    }
    blocks
}

/// First balanced `{...}` span that parses as a JSON object.
fn first_object(text: &str) -> Option<Map<String, JsonValue>> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(JsonValue::Object(obj)) = serde_json::from_str(&text[open..=close]) {
                return Some(obj);
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reads a number that models sometimes emit as a string ("7.5").
pub fn number_field(obj: &Map<String, JsonValue>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a non-empty string field, trimmed.
pub fn string_field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> Map<String, JsonValue> {
        match decode_json(raw) {
            Decoded::Parsed(obj) => obj,
            Decoded::Unparsable(reason) => panic!("expected JSON, got: {}", reason),
        }
    }

    #[test]
    fn reads_bare_object() {
        let obj = parsed(r#"{"score": 7.5, "passed": true}"#);
        assert_eq!(obj["score"], 7.5);
    }

    #[test]
    fn reads_fenced_object_with_language_tag() {
        let raw = "Here you go:\n```json\n{\"hint\": \"think about hashing\"}\n```\nGood luck!";
        assert_eq!(parsed(raw)["hint"], "think about hashing");
    }

    #[test]
    fn reads_object_surrounded_by_chatter_with_nested_braces() {
        let raw = r#"Sure! {"question_text": "Use {} in f-strings?", "options": {"A": "yes", "B": "no"}} hope that helps"#;
        let obj = parsed(raw);
        assert_eq!(obj["question_text"], "Use {} in f-strings?");
        assert_eq!(obj["options"]["B"], "no");
    }

    #[test]
    fn skips_broken_candidate_and_finds_the_next_one() {
        let raw = r#"{not json} then {"score": 3}"#;
        assert_eq!(parsed(raw)["score"], 3);
    }

    #[test]
    fn reports_unparsable_output() {
        assert!(matches!(decode_json("I cannot grade this."), Decoded::Unparsable(_)));
        assert!(matches!(decode_json("   "), Decoded::Unparsable(_)));
        assert!(matches!(decode_json(r#"{"score": 7"#), Decoded::Unparsable(_)));
    }

    #[test]
    fn numbers_may_arrive_as_strings() {
        let obj = parsed(r#"{"score": "8.5", "max_score": 10}"#);
        assert_eq!(number_field(&obj, "score"), Some(8.5));
        assert_eq!(number_field(&obj, "max_score"), Some(10.0));
        assert_eq!(number_field(&obj, "missing"), None);
    }
}
