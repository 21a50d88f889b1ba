use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

// Any character followed by a capitalised word, e.g. "dateOf" -> "date_Of"
static WORD_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.)([A-Z][a-z]+)").unwrap());
// A lowercase letter or digit followed by an uppercase letter, e.g. "tH" -> "t_H"
static CASE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Converts a camelCase or PascalCase key to snake_case
///
/// Keys already in snake_case are returned unchanged.
pub fn to_snake_case(key: &str) -> String {
    let key = WORD_BOUNDARY.replace_all(key, "${1}_${2}");
    let key = CASE_BOUNDARY.replace_all(&key, "${1}_${2}");
    key.to_lowercase()
}

/// Rewrites every mapping key of a json document to snake_case
///
/// Works recursively through nested objects and arrays, leaf values
/// (strings, numbers, booleans, null) are passed through untouched.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::with_capacity(map.len());
            for (key, value) in map {
                normalized.insert(to_snake_case(&key), normalize_keys(value));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        leaf => leaf,
    }
}
