use serde_json::Value;

/// Keys tried, in order, when a field value is a relationship-like object.
const OBJECT_LABEL_KEYS: &[&str] = &["post_title", "title", "label", "name", "url"];

/// Separator for multi-valued fields (checkboxes, multi-selects, relationships)
pub const MULTI_VALUE_SEPARATOR: &str = ", ";

/// Flatten a loosely-typed field value into the single string written to CSV.
///
/// Booleans follow the usual form-post convention: `true` is `"1"`, `false`
/// is empty.
pub fn normalize_field_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(normalize_field_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR),
        Value::Object(map) => OBJECT_LABEL_KEYS
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::Null) | None => None,
                Some(inner) => Some(normalize_field_value(inner)),
            })
            .unwrap_or_else(|| value.to_string()),
    }
}

/// Normalize a stored value column. Stored values are JSON-encoded; anything
/// that does not parse as JSON is taken verbatim.
pub fn normalize_stored_value(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => normalize_field_value(&value),
            Err(_) => text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(normalize_field_value(&json!(null)), "");
        assert_eq!(normalize_field_value(&json!("Jane")), "Jane");
        assert_eq!(normalize_field_value(&json!(42)), "42");
        assert_eq!(normalize_field_value(&json!(4.5)), "4.5");
        assert_eq!(normalize_field_value(&json!(true)), "1");
        assert_eq!(normalize_field_value(&json!(false)), "");
    }

    #[test]
    fn test_checkbox_array() {
        assert_eq!(normalize_field_value(&json!(["red", "", "blue"])), "red, blue");
        assert_eq!(normalize_field_value(&json!([])), "");
    }

    #[test]
    fn test_relationship_objects() {
        let value = json!([{"ID": 7, "post_title": "First"}, {"ID": 9, "post_title": "Second"}]);
        assert_eq!(normalize_field_value(&value), "First, Second");
        assert_eq!(normalize_field_value(&json!({"url": "https://x.test/a.png"})), "https://x.test/a.png");
    }

    #[test]
    fn test_unknown_object_falls_back_to_json() {
        assert_eq!(normalize_field_value(&json!({"lat": 1})), r#"{"lat":1}"#);
    }

    #[test]
    fn test_stored_values() {
        assert_eq!(normalize_stored_value(None), "");
        assert_eq!(normalize_stored_value(Some(r#""Jane""#)), "Jane");
        assert_eq!(normalize_stored_value(Some(r#"["a","b"]"#)), "a, b");
        assert_eq!(normalize_stored_value(Some("plain text")), "plain text");
    }
}
