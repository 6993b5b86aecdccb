use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

pub const NO_CONTENT: &str = "[No content]";

const FUNCTION_RESPONSE_MARKER: &str = "function_response:";

static FUNCTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)function ([a-zA-Z0-9_]+) executed",
        r"(?i)([a-zA-Z0-9_]+)\(\) called",
        r"(?i)called ([a-zA-Z0-9_]+) function",
        r"(?i)executed ([a-zA-Z0-9_]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// First present, non-null field among `keys`.
pub fn pick_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// First non-empty string field among `keys`.
pub fn pick_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Identifier fields may be numbers in some exports.
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// String lists (comments, agents) are kept only when they are arrays; non-string
/// entries are rendered.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Text shown to a reviewer for a message payload.
///
/// Structured payloads carrying a `convo` field show that field, other objects are
/// pretty-printed, strings that hold such a JSON object are unwrapped as well.
pub fn display_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => convo_of(&map).unwrap_or_else(|| s.clone()),
            _ => s.clone(),
        },
        Value::Object(map) => convo_of(map)
            .unwrap_or_else(|| serde_json::to_string_pretty(content).unwrap_or_default()),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

fn convo_of(map: &Map<String, Value>) -> Option<String> {
    match map.get("convo") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(v) if !v.is_null() && v.as_str().is_none() => Some(v.to_string()),
        _ => None,
    }
}

/// Bodies of the `function_response:` blocks embedded in a response.
pub fn function_responses(text: &str) -> Vec<String> {
    text.split(FUNCTION_RESPONSE_MARKER)
        .skip(1)
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Tool calls mentioned by a response that contains function output.
pub fn function_names(text: &str) -> Vec<String> {
    if !text.contains(FUNCTION_RESPONSE_MARKER) {
        return Vec::new();
    }

    let mut names: Vec<String> = Vec::new();
    for pattern in FUNCTION_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push_unique(&mut names, m.as_str());
            }
        }
    }

    if names.is_empty() {
        let lowered = text.to_lowercase();
        if lowered.contains("mail") {
            push_unique(&mut names, "send_email");
        }
        if text.contains("send") {
            push_unique(&mut names, "send_message");
        }
        if text.contains("project") || text.contains("task") {
            push_unique(&mut names, "create_task");
            push_unique(&mut names, "assign_task");
        }
    }

    names
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_prefers_convo() {
        assert_eq!(display_text(&json!({"convo": "hello"})), "hello");
        assert_eq!(display_text(&json!("{\"convo\": \"inner\"}")), "inner");
        assert_eq!(display_text(&json!("plain")), "plain");
        assert_eq!(display_text(&json!(null)), "");
        assert!(display_text(&json!({"a": 1})).contains("\"a\": 1"));
    }

    #[test]
    fn explicit_function_names() {
        let text = "function_response: status: success\nfunction create_invoice executed";
        assert_eq!(function_names(text), vec!["create_invoice".to_string()]);
    }

    #[test]
    fn inferred_function_names() {
        let text = "I will send the mail. function_response: status: success";
        assert_eq!(
            function_names(text),
            vec!["send_email".to_string(), "send_message".to_string()]
        );
        assert!(function_names("no tools used, just mail").is_empty());
    }

    #[test]
    fn splits_function_responses() {
        let text = "ok function_response: status: success function_response: emails: []";
        assert_eq!(
            function_responses(text),
            vec!["status: success".to_string(), "emails: []".to_string()]
        );
    }

    #[test]
    fn string_list_only_from_arrays() {
        assert!(string_list(Some(&json!("nope"))).is_empty());
        assert!(string_list(None).is_empty());
        assert_eq!(
            string_list(Some(&json!(["a", 2, null]))),
            vec!["a".to_string(), "2".to_string()]
        );
    }
}
