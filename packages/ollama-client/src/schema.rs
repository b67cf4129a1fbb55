//! Schema generation for Ollama structured outputs.
//!
//! Ollama constrains generation with the JSON schema passed in the `format`
//! field of a chat request. The grammar compiler behind it does not resolve
//! `$ref` pointers reliably, so every schema is fully inlined before it is
//! sent.
//!
//! # Example
//!
//! ```rust,ignore
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//! use ollama_client::StructuredOutput;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Verdict {
//!     is_relevant: bool,
//! }
//!
//! let schema = Verdict::format_schema();
//! ```

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Trait for types that can be requested as Ollama structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate the schema sent as the `format` constraint.
    ///
    /// References are inlined and the `definitions` / `$schema` keys removed.
    fn format_schema() -> Value {
        let schema = schema_for!(Self);
        serde_json::to_value(schema)
            .map(into_format)
            .unwrap_or_default()
    }

    /// Pretty-printed schema, for embedding into prompt text.
    fn schema_text() -> String {
        serde_json::to_string_pretty(&Self::format_schema()).unwrap_or_default()
    }

    /// Get the schema name for this type.
    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Nesting limit for `$ref` expansion; deeper references become `{}`.
const MAX_REF_DEPTH: usize = 8;

/// Turn a generated root schema into a self-contained `format` value.
///
/// The definition tables (`definitions` or `$defs`) and `$schema` are taken
/// off the root first, then every reference is replaced by a copy of its
/// target.
fn into_format(mut root: Value) -> Value {
    let mut defs = Map::new();
    if let Value::Object(map) = &mut root {
        map.remove("$schema");
        for key in ["definitions", "$defs"] {
            if let Some(Value::Object(table)) = map.remove(key) {
                defs.extend(table);
            }
        }
    }
    expand(root, &defs, 0)
}

fn expand(value: Value, defs: &Map<String, Value>, depth: usize) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                let name = target
                    .strip_prefix("#/definitions/")
                    .or_else(|| target.strip_prefix("#/$defs/"));
                return match name.and_then(|n| defs.get(n)) {
                    Some(def) if depth < MAX_REF_DEPTH => expand(def.clone(), defs, depth + 1),
                    // Unresolvable or too deep: accept anything
                    _ => Value::Object(Map::new()),
                };
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, expand(v, defs, depth)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| expand(v, defs, depth)).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Review {
        review_title: Option<String>,
        review_text: String,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Reviews {
        reviews: Vec<Review>,
    }

    #[test]
    fn test_schema_is_fully_inlined() {
        let schema = Reviews::format_schema();
        let text = serde_json::to_string(&schema).unwrap();

        assert!(!text.contains("$ref"));
        assert!(!text.contains("definitions"));
        assert!(!text.contains("$schema"));
        assert!(text.contains("review_text"));
    }

    #[test]
    fn test_defs_table_is_resolved_and_dropped() {
        let root = serde_json::json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "first": {"$ref": "#/$defs/Star"},
                "second": {"$ref": "#/definitions/Star"},
                "unknown": {"$ref": "#/definitions/Missing"}
            },
            "$defs": {"Star": {"type": "integer"}},
            "definitions": {"Star": {"type": "integer"}}
        });

        let format = into_format(root);

        assert_eq!(format["properties"]["first"]["type"], "integer");
        assert_eq!(format["properties"]["second"]["type"], "integer");
        assert_eq!(format["properties"]["unknown"], serde_json::json!({}));
        assert!(format.get("$defs").is_none());
        assert!(format.get("definitions").is_none());
        assert!(format.get("$schema").is_none());
    }

    #[test]
    fn test_self_referencing_definition_terminates() {
        let root = serde_json::json!({
            "type": "object",
            "properties": {"node": {"$ref": "#/definitions/Node"}},
            "definitions": {
                "Node": {"type": "object", "properties": {"next": {"$ref": "#/definitions/Node"}}}
            }
        });

        let text = serde_json::to_string(&into_format(root)).unwrap();
        assert!(!text.contains("$ref"));
    }

    #[test]
    fn test_root_is_object_schema() {
        let schema = Reviews::format_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["reviews"].is_object());
    }

    #[test]
    fn test_schema_text_is_pretty_json() {
        let text = Reviews::schema_text();
        assert!(text.contains('\n'));
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, Reviews::format_schema());
    }
}
