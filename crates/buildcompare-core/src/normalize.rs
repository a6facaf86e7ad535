//! Shape normalization for model-produced JSON.
//!
//! Vision models answer with a bare array, an object wrapping the array under
//! `materials` or `items`, or a single material object. [`classify`] names
//! which shape was seen; anything else is [`Normalized::Unrecognized`] and
//! callers treat it as a hard parse error.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKey {
    Materials,
    Items,
    /// A single material object, wrapped into a one-element list.
    SingleObject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Array(Vec<Value>),
    Wrapped { key: WrapperKey, items: Vec<Value> },
    Unrecognized(String),
}

impl Normalized {
    pub fn into_items(self) -> Result<Vec<Value>, NormalizeError> {
        match self {
            Self::Array(items) | Self::Wrapped { items, .. } => Ok(items),
            Self::Unrecognized(reason) => Err(NormalizeError::Unrecognized(reason)),
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unrecognized reply shape: {0}")]
    Unrecognized(String),
}

/// Removes Markdown code fences that models add even in JSON mode.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_owned()
}

pub fn classify(value: Value) -> Normalized {
    match value {
        Value::Array(items) => Normalized::Array(items),
        Value::Object(mut object) => {
            for (field, key) in [("materials", WrapperKey::Materials), ("items", WrapperKey::Items)] {
                match object.remove(field) {
                    Some(Value::Array(items)) => return Normalized::Wrapped { key, items },
                    Some(other) => {
                        return Normalized::Unrecognized(format!(
                            "'{field}' is {} rather than an array",
                            kind_of(&other)
                        ))
                    }
                    None => {}
                }
            }
            if object.contains_key("name") {
                Normalized::Wrapped {
                    key: WrapperKey::SingleObject,
                    items: vec![Value::Object(object)],
                }
            } else {
                Normalized::Unrecognized(String::from(
                    "object has no materials, items or name field",
                ))
            }
        }
        other => Normalized::Unrecognized(format!("top-level value is {}", kind_of(&other))),
    }
}

/// Fence-strips, parses and classifies a raw reply into a list of item objects.
pub fn parse_items(raw: &str) -> Result<Vec<Value>, NormalizeError> {
    let value: Value = serde_json::from_str(&strip_code_fences(raw))?;
    classify(value).into_items()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n[{\"name\":\"PPC Cement\"}]\n```";
        assert_eq!(strip_code_fences(raw), "[{\"name\":\"PPC Cement\"}]");
    }

    #[test]
    fn recognizes_every_supported_shape() {
        assert!(matches!(classify(json!([{"name": "a"}])), Normalized::Array(items) if items.len() == 1));
        assert!(matches!(
            classify(json!({"materials": [{"name": "a"}, {"name": "b"}]})),
            Normalized::Wrapped { key: WrapperKey::Materials, items } if items.len() == 2
        ));
        assert!(matches!(
            classify(json!({"items": []})),
            Normalized::Wrapped { key: WrapperKey::Items, .. }
        ));
        assert!(matches!(
            classify(json!({"name": "Corobrik Face Brick", "quantity": 500})),
            Normalized::Wrapped { key: WrapperKey::SingleObject, items } if items[0]["quantity"] == 500
        ));
    }

    #[test]
    fn rejects_scalars_and_unrelated_objects() {
        assert!(matches!(classify(json!("cement")), Normalized::Unrecognized(_)));
        assert!(matches!(classify(json!(42)), Normalized::Unrecognized(_)));
        assert!(matches!(classify(json!({"error": "no items"})), Normalized::Unrecognized(_)));
        assert!(matches!(classify(json!({"materials": "none"})), Normalized::Unrecognized(_)));
    }

    #[test]
    fn parse_items_reports_invalid_json() {
        assert!(matches!(parse_items("not json"), Err(NormalizeError::InvalidJson(_))));
        assert!(matches!(parse_items("null"), Err(NormalizeError::Unrecognized(_))));
        assert_eq!(parse_items("```json\n{\"items\":[{}]}\n```").map(|items| items.len()).ok(), Some(1));
    }
}
