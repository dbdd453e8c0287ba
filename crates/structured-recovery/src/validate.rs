//! Strict shape checks on already-parsed values.

use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationResult};

pub const DEFAULT_MAPPING_MESSAGE: &str = "Expected JSON object";
pub const DEFAULT_SEQUENCE_MESSAGE: &str = "Expected JSON array";

/// Require `value` to be an object, failing with `message` otherwise.
pub fn require_object<'a>(value: &'a Value, message: &str) -> ValidationResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::NotAMapping(message.to_string()))
}

/// Require `value` to be an array, failing with `message` otherwise.
pub fn require_array<'a>(value: &'a Value, message: &str) -> ValidationResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ValidationError::NotASequence(message.to_string()))
}

/// Require every key in `keys` to be present in `map`.
///
/// The error lists all missing keys in the order they were requested, not
/// just the first one.
pub fn require_keys<'a, I, K>(map: &'a Map<String, Value>, keys: I) -> ValidationResult<&'a Map<String, Value>>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    let missing: Vec<String> = keys
        .into_iter()
        .filter(|key| !map.contains_key(key.as_ref()))
        .map(|key| key.as_ref().to_string())
        .collect();

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(ValidationError::MissingKeys { keys: missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_and_array_checks() {
        let obj = json!({"a": 1});
        let arr = json!([1, 2]);

        assert!(require_object(&obj, DEFAULT_MAPPING_MESSAGE).is_ok());
        assert_eq!(
            require_object(&arr, "need a plan object"),
            Err(ValidationError::NotAMapping("need a plan object".to_string()))
        );

        assert_eq!(require_array(&arr, DEFAULT_SEQUENCE_MESSAGE).map(Vec::len), Ok(2));
        assert_eq!(
            require_array(&obj, DEFAULT_SEQUENCE_MESSAGE),
            Err(ValidationError::NotASequence(DEFAULT_SEQUENCE_MESSAGE.to_string()))
        );
    }

    #[test]
    fn require_keys_names_every_missing_key() {
        let value = json!({"a": 1});
        let map = require_object(&value, DEFAULT_MAPPING_MESSAGE).expect("object");

        let err = require_keys(map, ["a", "b", "c"]).expect_err("b and c are missing");
        assert_eq!(
            err,
            ValidationError::MissingKeys {
                keys: vec!["b".to_string(), "c".to_string()]
            }
        );
    }

    #[test]
    fn require_keys_returns_map_unchanged() {
        let value = json!({"a": 1, "b": null});
        let map = require_object(&value, DEFAULT_MAPPING_MESSAGE).expect("object");
        let same = require_keys(map, vec!["a".to_string(), "b".to_string()]).expect("present");
        assert!(std::ptr::eq(map, same));
    }
}
