use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Merge `patch` into `target` the way a set-with-merge does: nested objects
/// are merged field by field, every other value replaces what was there.
pub fn merge_into(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        if let Value::Object(incoming) = value {
            if let Some(Value::Object(existing)) = target.get_mut(&key) {
                merge_into(existing, incoming);
                continue;
            }
            target.insert(key, Value::Object(incoming));
        } else {
            target.insert(key, value);
        }
    }
}

/// Remove the field addressed by `path` (outermost key first).
/// Returns whether a field was removed.
pub fn delete_field(target: &mut Document, path: &[&str]) -> bool {
    match path {
        [] => false,
        [last] => target.remove(*last).is_some(),
        [head, rest @ ..] => match target.get_mut(*head) {
            Some(Value::Object(inner)) => delete_field(inner, rest),
            _ => false,
        },
    }
}

/// Serialize a value that must come out as a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            kind(&other)
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(doc))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
