//! Small conveniences around `serde_json` used by agent code.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Parse `text` directly, returning `fallback` on any parse error.
///
/// Unlike the pipeline this accepts scalars: `safe_loads("42", ..)` is `42`.
pub fn safe_loads(text: &str, fallback: Value) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "JSON parse error; using fallback");
            fallback
        }
    }
}

/// Render with two-space indentation, keeping non-ASCII text as-is.
pub fn to_pretty_text<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safe_loads_accepts_scalars_and_falls_back() {
        assert_eq!(safe_loads("42", json!(null)), json!(42));
        assert_eq!(safe_loads("{oops", json!({})), json!({}));
    }

    #[test]
    fn pretty_text_keeps_unicode() {
        let text = to_pretty_text(&json!({"name": "café"})).expect("render");
        assert_eq!(text, "{\n  \"name\": \"café\"\n}");
    }
}
