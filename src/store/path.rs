use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One hop inside a field path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Address of a value inside a [`FieldStore`](super::FieldStore).
///
/// Paths are written `property.address.city` or `rooms[2].surface`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid field path `{input}`: {reason}")]
pub struct FieldPathError {
    pub input: String,
    pub reason: String,
}

impl FieldPathError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl FieldPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// The empty path, addressing the whole store.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, FieldPathError> {
        parse_path(input)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn join(&self, other: &FieldPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Splits off the final segment, returning the parent path with it.
    pub fn split_last(&self) -> Option<(FieldPath, &PathSegment)> {
        let (last, parent) = self.segments.split_last()?;
        Some((FieldPath::new(parent.to_vec()), last))
    }
}

fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn parse_path(input: &str) -> Result<FieldPath, FieldPathError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FieldPathError::new(input, "path is empty"));
    }

    let mut segments = Vec::new();
    for part in trimmed.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() {
            return Err(FieldPathError::new(input, "every segment needs a key"));
        }
        if !key.chars().all(is_key_char) {
            return Err(FieldPathError::new(
                input,
                format!("`{key}` contains unsupported characters"),
            ));
        }
        segments.push(PathSegment::Key(key.to_string()));

        while !rest.is_empty() {
            let Some(open) = rest.strip_prefix('[') else {
                return Err(FieldPathError::new(
                    input,
                    format!("unexpected `{rest}` after index"),
                ));
            };
            let Some(close) = open.find(']') else {
                return Err(FieldPathError::new(input, "unclosed `[`"));
            };
            let index = open[..close].trim().parse::<usize>().map_err(|_| {
                FieldPathError::new(input, format!("`{}` is not an index", &open[..close]))
            })?;
            segments.push(PathSegment::Index(index));
            rest = &open[close + 1..];
        }
    }

    Ok(FieldPath { segments })
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if idx == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_path(&value)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = FieldPathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        parse_path(value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}
