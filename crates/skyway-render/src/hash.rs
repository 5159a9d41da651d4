//! stable content hashing for state payloads.
//!
//! peers compare manifests by hash alone, so the hash of a payload must not
//! depend on field order or serialization quirks: keys are concatenated with
//! their values in ascending lexicographic key order and digested with sha-1.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

/// hash a json object: sha-1 hex over `key1 value1 key2 value2 ...` with
/// keys in ascending lexicographic order.
pub fn hash_of_data(data: &Map<String, Value>) -> String {
    let mut hasher = Sha1::new();
    // serde_json's map is ordered by key
    for (key, value) in data {
        hasher.update(key.as_bytes());
        hasher.update(scalar_text(value).as_bytes());
    }
    hex_digest(hasher)
}

/// hash a json object, ignoring any value that is itself a nested object.
pub fn hash_of_object_no_children(data: &Map<String, Value>) -> String {
    let mut hasher = Sha1::new();
    for (key, value) in data {
        if value.is_object() {
            continue;
        }
        hasher.update(key.as_bytes());
        hasher.update(scalar_text(value).as_bytes());
    }
    hex_digest(hasher)
}

/// hash a plain text payload.
pub fn hash_of_text(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex_digest(hasher)
}

/// hash a plain string map (secret data, link descriptors).
pub fn hash_of_string_map(data: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha1::new();
    for (key, value) in data {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hex_digest(hasher)
}

/// textual form of a json value for hashing purposes.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        // arrays and nested objects hash as their compact json form;
        // serde_json objects are key-ordered so this stays stable
        other => other.to_string(),
    }
}

fn hex_digest(hasher: Sha1) -> String {
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn hash_is_insensitive_to_insertion_order() {
        let a = obj(json!({"a": 1, "b": 2}));
        let b = obj(json!({"b": 2, "a": 1}));
        assert_eq!(hash_of_data(&a), hash_of_data(&b));
    }

    #[test]
    fn hash_differs_on_value_change() {
        let a = obj(json!({"a": 1, "b": 2}));
        let b = obj(json!({"a": 1, "b": 3}));
        assert_ne!(hash_of_data(&a), hash_of_data(&b));
    }

    #[test]
    fn hash_differs_on_key_change() {
        let a = obj(json!({"a": 1}));
        let b = obj(json!({"b": 1}));
        assert_ne!(hash_of_data(&a), hash_of_data(&b));
    }

    #[test]
    fn no_children_ignores_nested_objects() {
        let flat = obj(json!({"a": 1, "b": "x"}));
        let nested = obj(json!({"a": 1, "b": "x", "child": {"deep": true}}));
        assert_eq!(
            hash_of_object_no_children(&flat),
            hash_of_object_no_children(&nested)
        );
        assert_ne!(hash_of_data(&flat), hash_of_data(&nested));
    }

    #[test]
    fn string_map_hash_matches_json_form() {
        let mut strings = BTreeMap::new();
        strings.insert("a".to_string(), "1".to_string());
        strings.insert("b".to_string(), "2".to_string());

        let as_json = obj(json!({"a": "1", "b": "2"}));
        assert_eq!(hash_of_string_map(&strings), hash_of_data(&as_json));
    }

    #[test]
    fn known_digest_shape() {
        let empty = Map::new();
        let hash = hash_of_data(&empty);
        // sha-1 of the empty string
        assert_eq!(hash, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
