//! Dotted field paths into the document's nested sections.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::PathError;

/// A parsed dotted path such as `security.securityAmount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        Ok(Self { segments })
    }

    /// Single-segment path for a known top-level key.
    pub fn key(name: &str) -> Self {
        Self {
            segments: vec![name.to_string()],
        }
    }

    /// First segment: the top-level key the path writes under.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment: the leaf field name.
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Parent path, if this path has more than one segment.
    pub fn parent(&self) -> Option<FieldPath> {
        (self.segments.len() > 1).then(|| FieldPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a segment.
    pub fn child(&self, segment: &str) -> FieldPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        FieldPath { segments }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Read the value at `path`, if every segment resolves to an object key.
pub fn get<'a>(root: &'a Map<String, Value>, path: &FieldPath) -> Option<&'a Value> {
    let (leaf, parents) = path.segments.split_last()?;
    let mut cursor = root;
    for segment in parents {
        cursor = cursor.get(segment)?.as_object()?;
    }
    cursor.get(leaf)
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// A non-object value found on the way is replaced by an empty object
/// (last write wins). Returns the previous value at `path`, if any.
pub fn set(root: &mut Map<String, Value>, path: &FieldPath, value: Value) -> Option<Value> {
    let (leaf, parents) = path.segments.split_last()?;
    let mut cursor = root;
    for segment in parents {
        let slot = cursor
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        cursor = slot.as_object_mut()?;
    }
    cursor.insert(leaf.clone(), value)
}
