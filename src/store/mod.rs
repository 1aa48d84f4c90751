//! Field store contract consumed by the wizard engine.
//!
//! The engine never owns form values. It reads and writes them through
//! [`FieldStore`], addressing values with [`FieldPath`]s such as
//! `rooms[1].surface`.

pub mod json_store;
pub mod path;

pub use json_store::JsonFieldStore;
pub use path::{FieldPath, FieldPathError, PathSegment};

use serde_json::Value;

use crate::errors::StoreError;

/// Key-addressable store of form field values for one in-progress record.
pub trait FieldStore {
    fn get(&self, path: &FieldPath) -> Option<&Value>;

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<(), StoreError>;

    /// Ordered items at `path`; empty when the path is missing or not a list.
    fn collection(&self, path: &FieldPath) -> &[Value];

    fn validate_required(&self, path: &FieldPath) -> bool {
        self.get(path).is_some_and(is_filled)
    }

    /// Deep copy of every value, handed to the submission trigger.
    fn snapshot(&self) -> Value;
}

/// Walks `path` inside a JSON value.
pub fn lookup<'a>(root: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.segments() {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(key)?,
            PathSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// Whether a value counts as "answered" for required-field checks.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Renders a scalar as display text; used for derived labels.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
