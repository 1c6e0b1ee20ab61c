//! Structural diff types and their wire JSON codec.
//!
//! On the wire each entry is an object `{"o": <tag>, "v": <payload>}`:
//! `+` insert, `-` remove, `r` replace, `O` nested object diff, `L` nested
//! list diff (keys are source indices), `I` additive integer delta and `d`
//! a text delta against the current string.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{JsonDiffError, JsonDiffResult};

/// A structural diff of an object: per-key operations.
pub type ObjectDiff = BTreeMap<String, DiffEntry>;

/// A structural diff of an array: per-source-index operations.
pub type ListDiff = BTreeMap<usize, DiffEntry>;

/// A single structural diff operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffEntry {
    /// Key absent in the source, present in the target.
    Insert(Value),
    /// Key removed from the source.
    Remove,
    /// Value replaced wholesale (type change or scalar replacement).
    Replace(Value),
    /// Recurse into an object.
    Object(ObjectDiff),
    /// Recurse into an array.
    List(ListDiff),
    /// Additive integer delta.
    IntDelta(i64),
    /// Text delta against the current string value.
    TextDelta(String),
}

impl DiffEntry {
    /// The wire tag for this entry.
    pub fn tag(&self) -> &'static str {
        match self {
            DiffEntry::Insert(_) => "+",
            DiffEntry::Remove => "-",
            DiffEntry::Replace(_) => "r",
            DiffEntry::Object(_) => "O",
            DiffEntry::List(_) => "L",
            DiffEntry::IntDelta(_) => "I",
            DiffEntry::TextDelta(_) => "d",
        }
    }

    /// Encodes this entry as its wire JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("o".into(), Value::String(self.tag().into()));
        match self {
            DiffEntry::Insert(v) | DiffEntry::Replace(v) => {
                map.insert("v".into(), v.clone());
            }
            DiffEntry::Remove => {}
            DiffEntry::Object(diff) => {
                map.insert("v".into(), object_diff_to_value(diff));
            }
            DiffEntry::List(diff) => {
                map.insert("v".into(), list_diff_to_value(diff));
            }
            DiffEntry::IntDelta(n) => {
                map.insert("v".into(), Value::from(*n));
            }
            DiffEntry::TextDelta(delta) => {
                map.insert("v".into(), Value::String(delta.clone()));
            }
        }
        Value::Object(map)
    }

    /// Decodes an entry from its wire JSON object.
    pub fn from_value(value: &Value) -> JsonDiffResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| JsonDiffError::malformed("entry is not an object"))?;
        let tag = map
            .get("o")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonDiffError::malformed("entry has no op tag"))?;
        let payload = || {
            map.get("v")
                .ok_or_else(|| JsonDiffError::malformed(format!("op {tag:?} has no payload")))
        };
        match tag {
            "+" => Ok(DiffEntry::Insert(payload()?.clone())),
            "-" => Ok(DiffEntry::Remove),
            "r" => Ok(DiffEntry::Replace(payload()?.clone())),
            "O" => Ok(DiffEntry::Object(object_diff_from_value(payload()?)?)),
            "L" => Ok(DiffEntry::List(list_diff_from_value(payload()?)?)),
            "I" => payload()?
                .as_i64()
                .map(DiffEntry::IntDelta)
                .ok_or_else(|| JsonDiffError::malformed("integer delta payload")),
            "d" => payload()?
                .as_str()
                .map(|s| DiffEntry::TextDelta(s.to_string()))
                .ok_or_else(|| JsonDiffError::malformed("text delta payload")),
            other => Err(JsonDiffError::malformed(format!("unknown op tag {other:?}"))),
        }
    }
}

/// Encodes an object diff as wire JSON.
pub fn object_diff_to_value(diff: &ObjectDiff) -> Value {
    let mut map = Map::new();
    for (key, entry) in diff {
        map.insert(key.clone(), entry.to_value());
    }
    Value::Object(map)
}

/// Decodes an object diff from wire JSON.
pub fn object_diff_from_value(value: &Value) -> JsonDiffResult<ObjectDiff> {
    let map = value
        .as_object()
        .ok_or_else(|| JsonDiffError::malformed("object diff is not an object"))?;
    let mut diff = ObjectDiff::new();
    for (key, entry) in map {
        diff.insert(key.clone(), DiffEntry::from_value(entry)?);
    }
    Ok(diff)
}

/// Encodes a list diff as wire JSON (indices become string keys).
pub fn list_diff_to_value(diff: &ListDiff) -> Value {
    let mut map = Map::new();
    for (index, entry) in diff {
        map.insert(index.to_string(), entry.to_value());
    }
    Value::Object(map)
}

/// Decodes a list diff from wire JSON.
pub fn list_diff_from_value(value: &Value) -> JsonDiffResult<ListDiff> {
    let map = value
        .as_object()
        .ok_or_else(|| JsonDiffError::malformed("list diff is not an object"))?;
    let mut diff = ListDiff::new();
    for (key, entry) in map {
        let index: usize = key
            .parse()
            .map_err(|_| JsonDiffError::malformed(format!("bad list index {key:?}")))?;
        diff.insert(index, DiffEntry::from_value(entry)?);
    }
    Ok(diff)
}
