//! Value-to-schema inference.
//!
//! Converts observed raw values (header/query/cookie strings, decoded JSON
//! bodies) into [`Schema`] fragments. Only structural metadata is retained;
//! observed values are discarded after inference.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::{Schema, StringFormat};
use crate::merge::merge_schemas;

/// Delimiters probed, in priority order, when checking whether a single raw
/// value encodes a collection.
const COLLECTION_DELIMITERS: [char; 4] = [',', ' ', '\t', '|'];

struct FormatPatterns {
    email: Regex,
    json_pointer: Regex,
}

fn format_patterns() -> &'static FormatPatterns {
    static PATTERNS: OnceLock<FormatPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FormatPatterns {
        email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compilation failed"),
        json_pointer: Regex::new(r"^(/([^/~]|~[01])*)+$")
            .expect("json-pointer regex compilation failed"),
    })
}

/// Detect a string format. First matching format wins; unmatched values stay
/// formatless.
pub fn detect_string_format(value: &str) -> Option<StringFormat> {
    if uuid::Uuid::parse_str(value).is_ok() {
        return Some(StringFormat::Uuid);
    }
    if format_patterns().email.is_match(value) {
        return Some(StringFormat::Email);
    }
    if value.parse::<std::net::Ipv4Addr>().is_ok() {
        return Some(StringFormat::Ipv4);
    }
    if value.parse::<std::net::Ipv6Addr>().is_ok() {
        return Some(StringFormat::Ipv6);
    }
    detect_temporal_format(value).or_else(|| {
        format_patterns().json_pointer.is_match(value).then_some(StringFormat::JsonPointer)
    })
}

/// Detect date/time-like textual formats only. Checked before numeric
/// inference so numeric-looking dates are not misread as numbers.
fn detect_temporal_format(value: &str) -> Option<StringFormat> {
    if chrono::DateTime::parse_from_rfc3339(value).is_ok() {
        return Some(StringFormat::DateTime);
    }
    if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return Some(StringFormat::Date);
    }
    if chrono::NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok() {
        return Some(StringFormat::Time);
    }
    None
}

fn is_strict_integer(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty()
        && digits.bytes().all(|byte| byte.is_ascii_digit())
        && value.parse::<i64>().is_ok()
}

fn is_float(value: &str) -> bool {
    value.bytes().any(|byte| byte.is_ascii_digit()) && value.parse::<f64>().is_ok()
}

/// Infer a schema from a single raw string value.
pub fn infer_string(value: &str) -> Schema {
    if let Some(format) = detect_temporal_format(value) {
        return Schema::String(Some(format));
    }
    if is_strict_integer(value) {
        return Schema::Integer;
    }
    if is_float(value) {
        return Schema::Number;
    }
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return Schema::Boolean;
    }
    Schema::String(detect_string_format(value))
}

/// Try to split a raw value into a delimiter-separated collection. The first
/// delimiter producing at least two non-empty parts is accepted.
pub fn split_collection(value: &str) -> Option<Vec<&str>> {
    for delimiter in COLLECTION_DELIMITERS {
        let parts: Vec<&str> =
            value.split(delimiter).filter(|part| !part.is_empty()).collect();
        if parts.len() >= 2 {
            return Some(parts);
        }
    }
    None
}

/// Infer a header or cookie value: these locations never carry repeated
/// instances, but may carry delimiter-style collections.
pub fn infer_delimited_value(value: &str) -> Schema {
    match split_collection(value) {
        Some(parts) => Schema::Array(Box::new(infer_string(parts[0]))),
        None => infer_string(value),
    }
}

/// Infer a query or form parameter from its observed instances: repeated
/// instances of the same key make a real collection.
pub fn infer_repeatable_values(values: &[String]) -> Schema {
    match values {
        [] => Schema::plain_string(),
        [single] => infer_string(single),
        [first, ..] => Schema::Array(Box::new(infer_string(first))),
    }
}

/// Infer a schema from a decoded JSON value.
pub fn infer_json_value(value: &Value) -> Schema {
    match value {
        // Null carries no type information; inferred as string.
        Value::Null => Schema::plain_string(),
        Value::Bool(_) => Schema::Boolean,
        Value::Number(number) => {
            if number.is_i64() || number.is_u64() {
                Schema::Integer
            } else {
                Schema::Number
            }
        }
        Value::String(string) => Schema::String(detect_string_format(string)),
        Value::Array(items) => Schema::Array(Box::new(infer_array_items(items))),
        Value::Object(object) => {
            let properties = object
                .iter()
                .map(|(key, property)| {
                    (key.replace('"', "\\\""), infer_json_value(property))
                })
                .collect();
            Schema::Object(properties)
        }
    }
}

/// Infer the item schema of a JSON array: elements are bucketed by inferred
/// type and collapsed into one schema when they all agree; disagreeing
/// elements produce a minimal mixed-type schema. An empty array defaults to
/// string items — a schema cannot describe an array without an item type.
fn infer_array_items(items: &[Value]) -> Schema {
    if items.is_empty() {
        return Schema::plain_string();
    }

    let mut buckets: BTreeMap<&'static str, Schema> = BTreeMap::new();
    for item in items {
        let schema = infer_json_value(item);
        match buckets.remove(schema.type_name()) {
            Some(existing) => {
                let (merged, _) = merge_schemas(&existing, &schema, "items");
                buckets.insert(merged.type_name(), merged);
            }
            None => {
                buckets.insert(schema.type_name(), schema);
            }
        }
    }

    if buckets.len() == 1 {
        return buckets.into_values().next().unwrap_or_else(Schema::plain_string);
    }
    Schema::Mixed(buckets.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_primitives() {
        assert_eq!(infer_string("42"), Schema::Integer);
        assert_eq!(infer_string("-7"), Schema::Integer);
        assert_eq!(infer_string("2.5"), Schema::Number);
        assert_eq!(infer_string("true"), Schema::Boolean);
        assert_eq!(infer_string("FALSE"), Schema::Boolean);
        assert_eq!(infer_string("hello"), Schema::plain_string());
    }

    #[test]
    fn test_dates_checked_before_numbers() {
        assert_eq!(infer_string("2023-10-18"), Schema::String(Some(StringFormat::Date)));
        assert_eq!(infer_string("12:30:00"), Schema::String(Some(StringFormat::Time)));
        assert_eq!(
            infer_string("2023-10-18T12:00:00Z"),
            Schema::String(Some(StringFormat::DateTime))
        );
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            detect_string_format("550e8400-e29b-41d4-a716-446655440000"),
            Some(StringFormat::Uuid)
        );
        assert_eq!(detect_string_format("user@example.com"), Some(StringFormat::Email));
        assert_eq!(detect_string_format("10.0.0.1"), Some(StringFormat::Ipv4));
        assert_eq!(detect_string_format("::1"), Some(StringFormat::Ipv6));
        assert_eq!(detect_string_format("/a/b/0"), Some(StringFormat::JsonPointer));
        assert_eq!(detect_string_format("plain text here"), None);
    }

    #[test]
    fn test_integer_overflow_degrades_to_number() {
        assert_eq!(infer_string("99999999999999999999999999"), Schema::Number);
    }

    #[test]
    fn test_split_collection_delimiter_priority() {
        assert_eq!(split_collection("a,b,c"), Some(vec!["a", "b", "c"]));
        // Comma is probed before space.
        assert_eq!(split_collection("a,b c"), Some(vec!["a", "b c"]));
        assert_eq!(split_collection("a|b"), Some(vec!["a", "b"]));
        assert_eq!(split_collection("single"), None);
        assert_eq!(split_collection("trailing,"), None);
    }

    #[test]
    fn test_infer_delimited_value() {
        assert_eq!(
            infer_delimited_value("1,2,3"),
            Schema::Array(Box::new(Schema::Integer))
        );
        assert_eq!(infer_delimited_value("42"), Schema::Integer);
    }

    #[test]
    fn test_infer_repeatable_values() {
        assert_eq!(infer_repeatable_values(&["7".to_string()]), Schema::Integer);
        assert_eq!(
            infer_repeatable_values(&["7".to_string(), "8".to_string()]),
            Schema::Array(Box::new(Schema::Integer))
        );
    }

    #[test]
    fn test_infer_json_object() {
        let schema = infer_json_value(&json!({"id": 3, "name": "x", "active": true}));
        let Schema::Object(properties) = schema else { panic!("expected object") };
        assert_eq!(properties["id"], Schema::Integer);
        assert_eq!(properties["name"], Schema::plain_string());
        assert_eq!(properties["active"], Schema::Boolean);
    }

    #[test]
    fn test_json_null_is_string() {
        assert_eq!(infer_json_value(&Value::Null), Schema::plain_string());
    }

    #[test]
    fn test_json_string_stays_string() {
        // "123" in a JSON body is already typed; it must not become an integer.
        assert_eq!(infer_json_value(&json!("123")), Schema::plain_string());
    }

    #[test]
    fn test_empty_array_defaults_to_string_items() {
        assert_eq!(
            infer_json_value(&json!([])),
            Schema::Array(Box::new(Schema::plain_string()))
        );
    }

    #[test]
    fn test_homogeneous_array_collapses() {
        assert_eq!(
            infer_json_value(&json!([1, 2, 3])),
            Schema::Array(Box::new(Schema::Integer))
        );
    }

    #[test]
    fn test_homogeneous_object_array_merges_properties() {
        let schema = infer_json_value(&json!([{"a": 1}, {"b": "x"}]));
        let Schema::Array(items) = schema else { panic!("expected array") };
        let Schema::Object(properties) = *items else { panic!("expected object items") };
        assert_eq!(properties["a"], Schema::Integer);
        assert_eq!(properties["b"], Schema::plain_string());
    }

    #[test]
    fn test_mixed_array_produces_one_of() {
        let schema = infer_json_value(&json!([1, "x", true]));
        let Schema::Array(items) = schema else { panic!("expected array") };
        let Schema::Mixed(variants) = *items else { panic!("expected mixed items") };
        assert_eq!(variants.len(), 3);
    }

    #[test]
    fn test_property_name_quotes_escaped() {
        let mut object = serde_json::Map::new();
        object.insert("weird\"name".to_string(), json!(1));
        let schema = infer_json_value(&Value::Object(object));
        let Schema::Object(properties) = schema else { panic!("expected object") };
        assert!(properties.contains_key("weird\\\"name"));
    }
}
