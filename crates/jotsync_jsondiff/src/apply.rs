//! Structural diff application.

use serde_json::{Number, Value};

use jotsync_textdiff::from_delta;

use crate::error::{JsonDiffError, JsonDiffResult};
use crate::types::{DiffEntry, ListDiff, ObjectDiff};
use crate::JsonDiff;

impl JsonDiff {
    /// Applies a single diff entry to a value, returning the new value.
    pub fn apply_entry(&self, base: &Value, entry: &DiffEntry) -> JsonDiffResult<Value> {
        match entry {
            DiffEntry::Insert(v) | DiffEntry::Replace(v) => Ok(v.clone()),
            DiffEntry::Remove => Err(JsonDiffError::malformed(
                "remove entry has no meaning at the value root",
            )),
            DiffEntry::Object(diff) => self.apply_object_diff(base, diff),
            DiffEntry::List(diff) => self.apply_list_diff(base, diff),
            DiffEntry::IntDelta(n) => add_int_delta(base, *n, "<root>"),
            DiffEntry::TextDelta(delta) => {
                let text = base.as_str().ok_or_else(|| {
                    JsonDiffError::type_mismatch("<root>", "string")
                })?;
                Ok(Value::String(self.apply_text_delta(text, delta, None)?))
            }
        }
    }

    /// Applies an object diff, returning the patched copy.
    ///
    /// The source value is never mutated; failures leave no partial state
    /// behind.
    pub fn apply_object_diff(&self, value: &Value, diff: &ObjectDiff) -> JsonDiffResult<Value> {
        self.apply_object_diff_inner(value, diff, None)
    }

    /// Applies an object diff while rewriting cursor offsets tracked
    /// inside the string field `field` through the same shifts the text
    /// undergoes.
    pub fn apply_object_diff_with_offsets(
        &self,
        value: &Value,
        diff: &ObjectDiff,
        field: &str,
        offsets: &mut [usize],
    ) -> JsonDiffResult<Value> {
        self.apply_object_diff_inner(value, diff, Some((field, offsets)))
    }

    fn apply_object_diff_inner(
        &self,
        value: &Value,
        diff: &ObjectDiff,
        mut tracked: Option<(&str, &mut [usize])>,
    ) -> JsonDiffResult<Value> {
        let map = value
            .as_object()
            .ok_or_else(|| JsonDiffError::type_mismatch("<root>", "object"))?;
        let mut out = map.clone();
        for (key, entry) in diff {
            match entry {
                DiffEntry::Insert(v) | DiffEntry::Replace(v) => {
                    out.insert(key.clone(), v.clone());
                }
                DiffEntry::Remove => {
                    out.remove(key);
                }
                DiffEntry::IntDelta(n) => {
                    let current = out
                        .get(key)
                        .ok_or_else(|| JsonDiffError::missing_target(key.as_str()))?;
                    let next = add_int_delta(current, *n, key)?;
                    out.insert(key.clone(), next);
                }
                DiffEntry::Object(nested) => {
                    let current = out
                        .get(key)
                        .ok_or_else(|| JsonDiffError::missing_target(key.as_str()))?;
                    let next = self.apply_object_diff(current, nested)?;
                    out.insert(key.clone(), next);
                }
                DiffEntry::List(nested) => {
                    let current = out
                        .get(key)
                        .ok_or_else(|| JsonDiffError::missing_target(key.as_str()))?;
                    let next = self.apply_list_diff(current, nested)?;
                    out.insert(key.clone(), next);
                }
                DiffEntry::TextDelta(delta) => {
                    let current = out
                        .get(key)
                        .and_then(Value::as_str)
                        .ok_or_else(|| JsonDiffError::type_mismatch(key.as_str(), "string"))?;
                    let offsets = match tracked.as_mut() {
                        Some((field, offsets)) if *field == key.as_str() => {
                            Some(&mut **offsets)
                        }
                        _ => None,
                    };
                    let next = self.apply_text_delta(current, delta, offsets)?;
                    out.insert(key.clone(), Value::String(next));
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Applies a list diff, returning the patched copy.
    ///
    /// Keys are source indices in ascending order; every deletion shifts
    /// the effective index of the operations behind it.
    pub fn apply_list_diff(&self, value: &Value, diff: &ListDiff) -> JsonDiffResult<Value> {
        let array = value
            .as_array()
            .ok_or_else(|| JsonDiffError::type_mismatch("<root>", "array"))?;
        let mut out = array.clone();
        let mut deleted: Vec<usize> = Vec::new();
        for (&key, entry) in diff {
            let shift = deleted.iter().filter(|&&d| d <= key).count();
            let index = key - shift;
            match entry {
                DiffEntry::Insert(v) => {
                    if index > out.len() {
                        return Err(JsonDiffError::IndexOutOfBounds {
                            index,
                            len: out.len(),
                        });
                    }
                    out.insert(index, v.clone());
                }
                DiffEntry::Remove => {
                    if index >= out.len() {
                        return Err(JsonDiffError::IndexOutOfBounds {
                            index,
                            len: out.len(),
                        });
                    }
                    out.remove(index);
                    deleted.push(key);
                }
                other => {
                    let current = out.get(index).ok_or(JsonDiffError::IndexOutOfBounds {
                        index,
                        len: out.len(),
                    })?;
                    let next = match other {
                        DiffEntry::Replace(v) => v.clone(),
                        DiffEntry::Object(nested) => self.apply_object_diff(current, nested)?,
                        DiffEntry::List(nested) => self.apply_list_diff(current, nested)?,
                        DiffEntry::IntDelta(n) => add_int_delta(current, *n, &key.to_string())?,
                        DiffEntry::TextDelta(delta) => {
                            let text = current.as_str().ok_or_else(|| {
                                JsonDiffError::type_mismatch(key.to_string(), "string")
                            })?;
                            Value::String(self.apply_text_delta(text, delta, None)?)
                        }
                        DiffEntry::Insert(_) | DiffEntry::Remove => unreachable!(),
                    };
                    out[index] = next;
                }
            }
        }
        Ok(Value::Array(out))
    }

    /// Decodes a delta against `text`, converts it to patches and applies
    /// them, optionally rewriting tracked cursor offsets.
    pub(crate) fn apply_text_delta(
        &self,
        text: &str,
        delta: &str,
        offsets: Option<&mut [usize]>,
    ) -> JsonDiffResult<String> {
        let diffs = from_delta(text, delta)?;
        let patches = self.text.patch_make_from_diffs(text, &diffs);
        let (patched, _) = match offsets {
            Some(offsets) => self.text.patch_apply_with_offsets(&patches, text, offsets),
            None => self.text.patch_apply(&patches, text),
        };
        Ok(patched)
    }
}

fn add_int_delta(current: &Value, delta: i64, path: &str) -> JsonDiffResult<Value> {
    let base = current
        .as_i64()
        .ok_or_else(|| JsonDiffError::type_mismatch(path, "integer"))?;
    Ok(Value::Number(Number::from(base + delta)))
}
