//! Structured extraction from untrusted advisor text.
//!
//! Strategy: the first fenced code block that holds valid JSON wins; otherwise
//! the whole reply is parsed as JSON. The value is then checked against a JSON
//! Schema before being deserialized.

use jsonschema::{Draft, Validator};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("advisor reply is empty")]
    Empty,
    #[error("advisor reply contains no JSON payload: {0}")]
    NoJson(#[source] serde_json::Error),
    #[error("advisor reply violates schema: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("advisor reply has unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Locate and parse the JSON payload of `text`.
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    for block in fenced_blocks(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            return Ok(value);
        }
    }
    serde_json::from_str(trimmed).map_err(ParseError::NoJson)
}

/// Extract, schema-check and deserialize `text` into `T`.
pub fn parse<T: DeserializeOwned>(text: &str, schema: &Validator) -> Result<T, ParseError> {
    let value = extract_json(text)?;
    let violations: Vec<String> = schema
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(ParseError::Schema(violations));
    }
    serde_json::from_value(value).map_err(ParseError::Shape)
}

/// Compile a JSON Schema (Draft 2020-12) from its source text.
pub fn compile_schema(raw: &str) -> Result<Validator, ParseError> {
    let schema: Value =
        serde_json::from_str(raw).map_err(|err| ParseError::InvalidSchema(err.to_string()))?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| ParseError::InvalidSchema(err.to_string()))
}

/// Bodies of ```-fenced blocks, in order. The info string (e.g. `json`) is skipped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
        let body = &after_fence[body_start..];
        let Some(close) = body.find("```") else {
            break;
        };
        blocks.push(body[..close].trim());
        rest = &body[close + 3..];
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const SCHEMA: &str = r#"{
        "type": "object",
        "required": ["action"],
        "properties": { "action": { "type": "string" } }
    }"#;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pick {
        action: String,
    }

    #[test]
    fn fenced_json_block_is_preferred() {
        let text = "Sure!\n```json\n{\"action\": \"lint\"}\n```\nanything {\"action\": \"x\"}";
        assert_eq!(extract_json(text).expect("json"), json!({"action": "lint"}));
    }

    #[test]
    fn unlabelled_fence_is_accepted() {
        let text = "```\n{\"action\": \"build\"}\n```";
        assert_eq!(extract_json(text).expect("json"), json!({"action": "build"}));
    }

    #[test]
    fn non_json_fence_falls_through_to_next_block() {
        let text = "```text\nnot json\n```\n```json\n{\"action\": \"test\"}\n```";
        assert_eq!(extract_json(text).expect("json"), json!({"action": "test"}));
    }

    #[test]
    fn raw_json_without_fence_parses() {
        assert_eq!(
            extract_json("  {\"action\": \"a\"}  ").expect("json"),
            json!({"action": "a"})
        );
    }

    #[test]
    fn prose_is_a_typed_error() {
        assert!(matches!(
            extract_json("I would pick lint."),
            Err(ParseError::NoJson(_))
        ));
        assert!(matches!(extract_json("   "), Err(ParseError::Empty)));
    }

    #[test]
    fn schema_violation_is_reported() {
        let schema = compile_schema(SCHEMA).expect("schema");
        let err = parse::<Pick>("{\"action\": 3}", &schema).expect_err("violation");
        assert!(matches!(err, ParseError::Schema(_)));
    }

    #[test]
    fn parse_returns_typed_value() {
        let schema = compile_schema(SCHEMA).expect("schema");
        let pick: Pick = parse("```json\n{\"action\": \"lint\"}\n```", &schema).expect("parse");
        assert_eq!(
            pick,
            Pick {
                action: "lint".to_string()
            }
        );
    }
}
