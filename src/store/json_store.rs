use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{lookup, FieldPath, FieldStore, PathSegment};
use crate::errors::StoreError;

/// In-memory [`FieldStore`] backed by a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonFieldStore {
    root: Value,
}

impl Default for JsonFieldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFieldStore {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing document, e.g. a record being edited.
    pub fn from_value(root: Value) -> Result<Self, StoreError> {
        match root {
            Value::Object(_) => Ok(Self { root }),
            Value::Null => Ok(Self::new()),
            _ => Err(StoreError::TypeMismatch {
                path: String::new(),
                expected: "an object",
            }),
        }
    }

    /// Parses `path` and writes `value` there.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let path = FieldPath::parse(path)?;
        self.set(&path, value.into())
    }

    /// Parses `path` and reads the value there.
    pub fn value(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).ok().and_then(|path| self.get(&path))
    }

    /// Removes the value at `path`; array items after it shift down.
    pub fn remove(&mut self, path: &FieldPath) -> Option<Value> {
        let (parent, last) = path.split_last()?;
        let container = lookup_mut(&mut self.root, parent.segments())?;
        match last {
            PathSegment::Key(key) => container.as_object_mut()?.remove(key),
            PathSegment::Index(index) => {
                let items = container.as_array_mut()?;
                (*index < items.len()).then(|| items.remove(*index))
            }
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

impl FieldStore for JsonFieldStore {
    fn get(&self, path: &FieldPath) -> Option<&Value> {
        lookup(&self.root, path)
    }

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::TypeMismatch {
                path: String::new(),
                expected: "a field path",
            });
        }
        set_in(&mut self.root, path.segments(), value, path)
    }

    fn collection(&self, path: &FieldPath) -> &[Value] {
        self.get(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn snapshot(&self) -> Value {
        self.root.clone()
    }
}

fn lookup_mut<'a>(root: &'a mut Value, segments: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.as_object_mut()?.get_mut(key)?,
            PathSegment::Index(index) => current.as_array_mut()?.get_mut(*index)?,
        };
    }
    Some(current)
}

fn set_in(
    slot: &mut Value,
    segments: &[PathSegment],
    value: Value,
    path: &FieldPath,
) -> Result<(), StoreError> {
    let Some((head, tail)) = segments.split_first() else {
        *slot = value;
        return Ok(());
    };

    match head {
        PathSegment::Key(key) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            let map = slot.as_object_mut().ok_or_else(|| StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "an object",
            })?;
            let child = map.entry(key.clone()).or_insert(Value::Null);
            set_in(child, tail, value, path)
        }
        PathSegment::Index(index) => {
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut().ok_or_else(|| StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "a list",
            })?;
            let len = items.len();
            if *index == len {
                items.push(Value::Null);
            } else if *index > len {
                return Err(StoreError::IndexOutOfRange {
                    path: path.to_string(),
                    index: *index,
                    len,
                });
            }
            set_in(&mut items[*index], tail, value, path)
        }
    }
}
