//! Field extraction from decoded JSON.

use serde_json::Value;

/// Longest rendering kept for an object value without a `text` field.
const OBJECT_PREVIEW_CHARS: usize = 100;

/// Walk a dot-notation path. Numeric segments index into arrays.
pub fn extract_path<'a>(data: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return data;
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).unwrap_or(&Value::Null),
            Value::Array(arr) => match key.parse::<usize>() {
                Ok(idx) => arr.get(idx).unwrap_or(&Value::Null),
                Err(_) => &Value::Null,
            },
            _ => &Value::Null,
        };
    }

    current
}

/// Read `selector` out of `node` as a string. Never fails; misses give "".
pub fn extract_value(node: &Value, selector: &str) -> String {
    if selector.is_empty() {
        return String::new();
    }
    value_to_string(extract_path(node, selector))
}

/// String form of a JSON value, following the record coercion rules.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Rich-text objects carry their rendered form under `text`.
        Value::Object(map) => match map.get("text") {
            Some(text) => scalar_string(text),
            None => value.to_string().chars().take(OBJECT_PREVIEW_CHARS).collect(),
        },
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Bare string for strings, compact JSON for everything else.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Items under `list_path`: array elements, a lone object, or nothing.
pub fn list_items<'a>(data: &'a Value, list_path: Option<&str>) -> Vec<&'a Value> {
    match extract_path(data, list_path.unwrap_or_default()) {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Interpret a JSON flag loosely: false, 0, "", "false" and null are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_path_nested_and_indexed() {
        let data = json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
        assert_eq!(extract_path(&data, "a.b.1.c"), &json!(2));
        assert_eq!(extract_path(&data, "a.missing"), &Value::Null);
        assert_eq!(extract_path(&data, "a.b.x"), &Value::Null);
        assert_eq!(extract_path(&data, ""), &data);
    }

    #[test]
    fn test_coercion_rules() {
        let item = json!({
            "title": "Hello",
            "votes": 42,
            "hot": true,
            "gone": null,
            "excerpt": {"text": "rich", "html": "<b>rich</b>"},
            "tags": ["a", 1, true],
            "meta": {"k": "v"}
        });
        assert_eq!(extract_value(&item, "title"), "Hello");
        assert_eq!(extract_value(&item, "votes"), "42");
        assert_eq!(extract_value(&item, "hot"), "true");
        assert_eq!(extract_value(&item, "gone"), "");
        assert_eq!(extract_value(&item, "excerpt"), "rich");
        assert_eq!(extract_value(&item, "tags"), "a,1,true");
        assert_eq!(extract_value(&item, "meta"), r#"{"k":"v"}"#);
        assert_eq!(extract_value(&item, "nope.deeper"), "");
        assert_eq!(extract_value(&item, ""), "");
    }

    #[test]
    fn test_object_rendering_is_capped() {
        let long = "x".repeat(500);
        let item = json!({"blob": {"body": long}});
        assert_eq!(extract_value(&item, "blob").chars().count(), 100);
    }

    #[test]
    fn test_list_items_shapes() {
        let data = json!({"data": [{"id": 1}, {"id": 2}], "one": {"id": 3}});
        assert_eq!(list_items(&data, Some("data")).len(), 2);
        assert_eq!(list_items(&data, Some("one")).len(), 1);
        assert!(list_items(&data, Some("missing")).is_empty());
        assert_eq!(list_items(&json!([1, 2, 3]), None).len(), 3);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&Value::Null));
    }
}
