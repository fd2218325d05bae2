//! Concurrency-safe hierarchical state store.
//!
//! Values form a tagged union. Path traversal is driven by the variant
//! tag: a `Mapping` segment looks up a key, a `Sequence` segment parses
//! an integer index. Image payloads are a further variant so the HTTP
//! layer can branch on whether bytes are already JPEG-encoded or still
//! a raw frame.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use crate::error::StateError;
use crate::image::ByteImage;

/// Either a raw frame buffer or already-encoded bytes (e.g. JPEG).
#[derive(Clone, Debug, PartialEq)]
pub enum ImagePayload {
    Raw(ByteImage),
    Encoded(Vec<u8>),
}

/// A node in the shared-state tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    Image(ImagePayload),
}

impl Value {
    pub fn mapping() -> Self {
        Value::Mapping(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// JSON-safe projection: opaque/unknown values become a human-readable
    /// type tag, mirroring the original's `str(type(value))` fallback.
    pub fn sanitize(&self) -> JsonValue {
        match self {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Null => JsonValue::Null,
            Value::Sequence(items) => JsonValue::Array(items.iter().map(Value::sanitize).collect()),
            Value::Mapping(map) => {
                JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.sanitize())).collect())
            }
            Value::Image(_) => JsonValue::String("<image>".to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Default path separator, matching the original's `resolve_path(..., sep="/")`.
pub const DEFAULT_SEP: char = '/';

fn split_path(path: &str, sep: char) -> Vec<&str> {
    path.split(sep).filter(|p| !p.is_empty()).collect()
}

/// Parses `true`/`false`, then integer, then float, else leaves as a
/// string — the coercion rule for `/api/set`.
pub fn coerce_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(raw.to_string())
}

fn get_path<'a>(root: &'a Value, parts: &[&str]) -> Result<&'a Value, StateError> {
    let mut node = root;
    for part in parts {
        node = match node {
            Value::Mapping(map) => map
                .get(*part)
                .ok_or_else(|| StateError::KeyMissing((*part).to_string()))?,
            Value::Sequence(seq) => {
                let idx: i64 = part
                    .parse()
                    .map_err(|_| StateError::BadIndex((*part).to_string()))?;
                let len = seq.len();
                if idx < 0 || idx as usize >= len {
                    return Err(StateError::IndexOutOfRange { index: idx, len });
                }
                &seq[idx as usize]
            }
            _ => return Err(StateError::NotContainer((*part).to_string())),
        };
    }
    Ok(node)
}

fn get_path_mut<'a>(root: &'a mut Value, parts: &[&str]) -> Result<&'a mut Value, StateError> {
    let mut node = root;
    for part in parts {
        node = match node {
            Value::Mapping(map) => map
                .get_mut(*part)
                .ok_or_else(|| StateError::KeyMissing((*part).to_string()))?,
            Value::Sequence(seq) => {
                let idx: i64 = part
                    .parse()
                    .map_err(|_| StateError::BadIndex((*part).to_string()))?;
                let len = seq.len();
                if idx < 0 || idx as usize >= len {
                    return Err(StateError::IndexOutOfRange { index: idx, len });
                }
                &mut seq[idx as usize]
            }
            _ => return Err(StateError::NotContainer((*part).to_string())),
        };
    }
    Ok(node)
}

/// Concurrency-safe hierarchical store. Cloning a [`SharedState`] clones
/// the `Arc`, giving every camera worker, the HTTP server, and external
/// callers the same underlying tree.
#[derive(Clone)]
pub struct SharedState {
    root: Arc<RwLock<Value>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self { root: Arc::new(RwLock::new(Value::mapping())) }
    }

    pub fn from_root(root: Value) -> Self {
        Self { root: Arc::new(RwLock::new(root)) }
    }

    /// Read the value at `path` (default separator `/`), cloning it out
    /// under a short-lived read lock.
    pub fn get(&self, path: &str) -> Result<Value, StateError> {
        self.get_sep(path, DEFAULT_SEP)
    }

    pub fn get_sep(&self, path: &str, sep: char) -> Result<Value, StateError> {
        let parts = split_path(path, sep);
        let guard = self.root.read().expect("state lock poisoned");
        if parts.is_empty() {
            return Ok(guard.clone());
        }
        get_path(&guard, &parts).cloned()
    }

    /// Resolve the parent of `path`, then assign the last segment.
    pub fn set(&self, path: &str, value: Value) -> Result<(), StateError> {
        self.set_sep(path, value, DEFAULT_SEP)
    }

    pub fn set_sep(&self, path: &str, value: Value, sep: char) -> Result<(), StateError> {
        let parts = split_path(path, sep);
        let (last, parent_parts) = parts.split_last().ok_or(StateError::EmptyPath)?;

        let mut guard = self.root.write().expect("state lock poisoned");
        let parent = get_path_mut(&mut guard, parent_parts)?;
        match parent {
            Value::Mapping(map) => {
                map.insert((*last).to_string(), value);
                Ok(())
            }
            Value::Sequence(seq) => {
                let idx: i64 = last.parse().map_err(|_| StateError::BadIndex((*last).to_string()))?;
                let len = seq.len();
                if idx < 0 || idx as usize >= len {
                    return Err(StateError::IndexOutOfRange { index: idx, len });
                }
                seq[idx as usize] = value;
                Ok(())
            }
            _ => Err(StateError::NotContainer((*last).to_string())),
        }
    }

    /// Publish a new image buffer at `path` by swapping the whole value in,
    /// never mutating one in place that a reader might be holding a clone
    /// of.
    pub fn publish_image(&self, path: &str, payload: ImagePayload) -> Result<(), StateError> {
        self.set(path, Value::Image(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SharedState {
        let mut b = BTreeMap::new();
        b.insert(
            "b".to_string(),
            Value::Sequence(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
        );
        let mut a = BTreeMap::new();
        a.insert("a".to_string(), Value::Mapping(b));
        SharedState::from_root(Value::Mapping(a))
    }

    #[test]
    fn path_resolution_reads_sequence_index() {
        let s = sample_state();
        assert_eq!(s.get("a/b/2").unwrap(), Value::Int(30));
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let s = sample_state();
        let err = s.get("a/b/5").unwrap_err();
        assert!(matches!(err, StateError::IndexOutOfRange { index: 5, len: 3 }));
    }

    #[test]
    fn set_then_get_round_trips() {
        let s = sample_state();
        s.set("a/b/1", Value::Int(99)).unwrap();
        assert_eq!(s.get("a/b/1").unwrap(), Value::Int(99));
    }

    #[test]
    fn missing_key_is_reported() {
        let s = sample_state();
        let err = s.get("a/missing").unwrap_err();
        assert_eq!(err, StateError::KeyMissing("missing".to_string()));
    }

    #[test]
    fn empty_path_on_set_is_rejected() {
        let s = sample_state();
        let err = s.set("", Value::Int(1)).unwrap_err();
        assert_eq!(err, StateError::EmptyPath);
    }

    #[test]
    fn root_path_resolves_to_whole_tree() {
        let s = sample_state();
        assert!(matches!(s.get("").unwrap(), Value::Mapping(_)));
    }

    #[test]
    fn coerce_value_guesses_types() {
        assert_eq!(coerce_value("true"), Value::Bool(true));
        assert_eq!(coerce_value("false"), Value::Bool(false));
        assert_eq!(coerce_value("42"), Value::Int(42));
        assert_eq!(coerce_value("3.5"), Value::Float(3.5));
        assert_eq!(coerce_value("READY"), Value::String("READY".to_string()));
    }
}
