//! End-to-end recovery behaviour on realistic model output.

use serde_json::{json, Value};
use structured_recovery::{
    recover, recover_with, require_keys, require_object, ParseOutcome, RecoveryPipeline, Tier,
    ValidationError,
};

fn plan_document() -> Value {
    json!({
        "plan": "decompose then retrieve",
        "steps": [
            {"id": 1, "tool": "rag_search", "query": "definition of entropy"},
            {"id": 2, "tool": "code_execution", "query": "print(2 ** 10)"}
        ],
        "confidence": 0.82,
        "final": false
    })
}

#[test]
fn fenced_and_bare_documents_recover_to_the_same_value() {
    let doc = plan_document();
    let text = serde_json::to_string_pretty(&doc).expect("serialize");

    let fenced = recover(&format!("Here is the plan:\n```json\n{text}\n```\nLet me know."));
    assert_eq!(fenced.tier(), Some(Tier::CodeBlock));
    assert_eq!(fenced.value(), &doc);

    let bare = recover(&text);
    assert_eq!(bare.tier(), Some(Tier::Direct));
    assert_eq!(bare.value(), &doc);
}

#[test]
fn embedded_code_with_quotes_and_newlines_survives_intact() {
    let snippet = "def foo():\n    print(\"hello, \\\"world\\\"\")\n    return {'a': [1, 2]}\n";
    let doc = json!({
        "tool_calls": [{"type": "code_execution", "query": snippet}]
    });
    let text = serde_json::to_string(&doc).expect("serialize");

    // Surrounded by prose so only the fragment tier can find it.
    let outcome = recover(&format!("I will run this: {text} and report back."));
    assert_eq!(outcome.tier(), Some(Tier::Fragment));
    assert_eq!(
        outcome.value()["tool_calls"][0]["query"].as_str(),
        Some(snippet)
    );
}

#[test]
fn triple_quoted_code_block_is_repaired() {
    let raw = r#"
    {
      "tool_calls": [
        {
          "type": "code_execution",
          "query": """
def foo():
    print("hello")
"""
        }
      ]
    }
    "#;

    let outcome = recover(raw);
    assert_eq!(outcome.tier(), Some(Tier::Repaired));
    let value = outcome.into_value();
    assert_eq!(value["tool_calls"][0]["type"], json!("code_execution"));
    let query = value["tool_calls"][0]["query"].as_str().expect("query string");
    assert!(query.contains("def foo"));
    assert!(query.contains("print(\"hello\")"));
}

#[test]
fn prose_without_structure_yields_empty_object() {
    let outcome = recover("I'm sorry, I could not find anything relevant to that question.");
    assert_eq!(outcome, ParseOutcome::Fallback { value: json!({}) });
}

#[test]
fn caller_fallback_is_returned_verbatim() {
    let fallback = json!({"steps": [], "final": true});
    let pipeline = RecoveryPipeline::without_repair();
    let outcome = pipeline.recover_with("{\"steps\": [1, 2", fallback.clone());
    assert!(outcome.is_fallback());
    assert_eq!(outcome.into_value(), fallback);

    let outcome = recover_with("no data at all", json!(null));
    assert_eq!(outcome.value(), &Value::Null);
}

#[test]
fn array_fragment_is_found_when_no_object_exists() {
    let outcome = recover("Candidates: [\"k1\", \"k2\"] (ranked)");
    assert_eq!(outcome.tier(), Some(Tier::Fragment));
    assert_eq!(outcome.value(), &json!(["k1", "k2"]));
}

#[test]
fn validation_after_recovery_reports_all_missing_keys() {
    let outcome = recover("{\"a\": 1}");
    let map = require_object(outcome.value(), "response must be an object").expect("object");

    match require_keys(map, ["a", "b", "c"]) {
        Err(ValidationError::MissingKeys { keys }) => assert_eq!(keys, vec!["b", "c"]),
        other => panic!("expected MissingKeys, got {other:?}"),
    }
}

#[test]
fn json_after_a_code_fence_is_still_found() {
    let outcome = recover("Run this first:\n```python\nprint(1)\n```\nResult: {\"a\": 1}");
    assert_eq!(outcome.tier(), Some(Tier::Fragment));
    assert_eq!(outcome.value(), &json!({"a": 1}));
}

#[test]
fn fence_markers_inside_a_string_do_not_truncate_the_document() {
    let outcome =
        recover("```json\n{\"answer\": \"wrap it in ```code``` please\", \"n\": 2}\n```");
    assert_eq!(outcome.tier(), Some(Tier::CodeBlock));
    assert_eq!(
        outcome.value(),
        &json!({"answer": "wrap it in ```code``` please", "n": 2})
    );
}

#[test]
fn repair_sees_the_whole_fenced_document() {
    let outcome =
        recover("```json\n{\"answer\": \"wrap it in ```code``` please\", \"n\": 2,}\n```");
    assert_eq!(outcome.tier(), Some(Tier::Repaired));
    assert_eq!(
        outcome.value(),
        &json!({"answer": "wrap it in ```code``` please", "n": 2})
    );
}
