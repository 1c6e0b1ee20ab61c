//! Structural diff computation.

use serde_json::{Map, Value};

use jotsync_textdiff::to_delta;

use crate::types::{DiffEntry, ListDiff, ObjectDiff};
use crate::JsonDiff;

impl JsonDiff {
    /// Computes the structural diff between two values.
    ///
    /// Returns `None` when the values are structurally equal. Strings
    /// produce a compact text delta; objects recurse; every other type
    /// change or scalar edit is a wholesale replacement. Arrays are
    /// replaced at this level too (list diffs are applied and transformed
    /// but the canonical diff path does not emit them).
    pub fn diff(&self, a: &Value, b: &Value) -> Option<DiffEntry> {
        if a == b {
            return None;
        }
        match (a, b) {
            (Value::Object(a_map), Value::Object(b_map)) => {
                let diff = self.object_diff(a_map, b_map);
                if diff.is_empty() {
                    None
                } else {
                    Some(DiffEntry::Object(diff))
                }
            }
            (Value::String(a_text), Value::String(b_text)) => {
                Some(DiffEntry::TextDelta(self.text_delta(a_text, b_text)))
            }
            _ => Some(DiffEntry::Replace(b.clone())),
        }
    }

    /// Computes the per-key diff of two objects.
    pub fn object_diff(
        &self,
        a: &Map<String, Value>,
        b: &Map<String, Value>,
    ) -> ObjectDiff {
        let mut diff = ObjectDiff::new();
        for (key, a_value) in a {
            match b.get(key) {
                None => {
                    diff.insert(key.clone(), DiffEntry::Remove);
                }
                Some(b_value) => {
                    if let Some(entry) = self.diff(a_value, b_value) {
                        diff.insert(key.clone(), entry);
                    }
                }
            }
        }
        for (key, b_value) in b {
            if !a.contains_key(key) {
                diff.insert(key.clone(), DiffEntry::Insert(b_value.clone()));
            }
        }
        diff
    }

    /// Computes the per-index diff of two arrays.
    ///
    /// The common head and tail are stripped element-wise; keys are
    /// indices in the original `a` (trimmed position plus prefix length).
    pub fn list_diff(&self, a: &[Value], b: &[Value]) -> ListDiff {
        let mut prefix = 0usize;
        while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
            prefix += 1;
        }
        let mut suffix = 0usize;
        while suffix < a.len() - prefix
            && suffix < b.len() - prefix
            && a[a.len() - suffix - 1] == b[b.len() - suffix - 1]
        {
            suffix += 1;
        }
        let a_mid = &a[prefix..a.len() - suffix];
        let b_mid = &b[prefix..b.len() - suffix];

        let mut diff = ListDiff::new();
        for i in 0..a_mid.len().max(b_mid.len()) {
            let key = prefix + i;
            match (a_mid.get(i), b_mid.get(i)) {
                (Some(a_value), Some(b_value)) => {
                    if let Some(entry) = self.diff(a_value, b_value) {
                        diff.insert(key, entry);
                    }
                }
                (Some(_), None) => {
                    diff.insert(key, DiffEntry::Remove);
                }
                (None, Some(b_value)) => {
                    diff.insert(key, DiffEntry::Insert(b_value.clone()));
                }
                (None, None) => unreachable!("index below max of both lengths"),
            }
        }
        diff
    }

    /// Computes the delta between two strings, with an efficiency cleanup
    /// for fragmented edit scripts.
    pub(crate) fn text_delta(&self, a: &str, b: &str) -> String {
        let mut diffs = self.text.diff_main(a, b);
        if diffs.len() > 2 {
            self.text.cleanup_efficiency(&mut diffs);
        }
        to_delta(&diffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jd() -> JsonDiff {
        JsonDiff::new()
    }

    #[test]
    fn equal_values_produce_no_diff() {
        let cases = [
            json!(null),
            json!(true),
            json!(42),
            json!("same"),
            json!([1, 2, 3]),
            json!({"a": {"b": [1, "x"]}}),
        ];
        for value in cases {
            assert_eq!(jd().diff(&value, &value), None, "{value}");
        }
    }

    #[test]
    fn scalar_changes_replace() {
        assert_eq!(
            jd().diff(&json!(1), &json!(2)),
            Some(DiffEntry::Replace(json!(2)))
        );
        assert_eq!(
            jd().diff(&json!(true), &json!(false)),
            Some(DiffEntry::Replace(json!(false)))
        );
        // Type change is always a replacement, even object-to-scalar.
        assert_eq!(
            jd().diff(&json!({"a": 1}), &json!(7)),
            Some(DiffEntry::Replace(json!(7)))
        );
    }

    #[test]
    fn arrays_replace_wholesale() {
        assert_eq!(
            jd().diff(&json!([1, 2]), &json!([1, 3])),
            Some(DiffEntry::Replace(json!([1, 3])))
        );
    }

    #[test]
    fn strings_produce_deltas() {
        let entry = jd().diff(&json!("hello"), &json!("hello!")).unwrap();
        assert_eq!(entry, DiffEntry::TextDelta("=5\t+!".into()));
    }

    #[test]
    fn object_diff_covers_all_key_changes() {
        let a = json!({"keep": 1, "drop": 2, "edit": "abc"});
        let b = json!({"keep": 1, "edit": "abx", "add": true});
        let diff = jd().object_diff(a.as_object().unwrap(), b.as_object().unwrap());

        assert_eq!(diff.len(), 3);
        assert_eq!(diff["drop"], DiffEntry::Remove);
        assert_eq!(diff["add"], DiffEntry::Insert(json!(true)));
        assert!(matches!(diff["edit"], DiffEntry::TextDelta(_)));
        assert!(!diff.contains_key("keep"));
    }

    #[test]
    fn nested_objects_recurse() {
        let a = json!({"meta": {"tags": "old", "count": 3}});
        let b = json!({"meta": {"tags": "new", "count": 3}});
        let entry = jd().diff(&a, &b).unwrap();
        let DiffEntry::Object(diff) = entry else {
            panic!("expected object entry");
        };
        let DiffEntry::Object(meta) = &diff["meta"] else {
            panic!("expected nested object entry");
        };
        assert!(matches!(meta["tags"], DiffEntry::TextDelta(_)));
        assert!(!meta.contains_key("count"));
    }

    #[test]
    fn list_diff_strips_common_affixes() {
        let a = json!([1, 2, 3, 4, 5]);
        let b = json!([1, 2, 9, 4, 5]);
        let diff = jd().list_diff(a.as_array().unwrap(), b.as_array().unwrap());
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[&2], DiffEntry::Replace(json!(9)));
    }

    #[test]
    fn list_diff_keys_are_source_indices() {
        let a = json!(["a", "b"]);
        let b = json!(["a", "b", "c", "d"]);
        let diff = jd().list_diff(a.as_array().unwrap(), b.as_array().unwrap());
        assert_eq!(diff[&2], DiffEntry::Insert(json!("c")));
        assert_eq!(diff[&3], DiffEntry::Insert(json!("d")));

        let diff = jd().list_diff(b.as_array().unwrap(), a.as_array().unwrap());
        assert_eq!(diff[&2], DiffEntry::Remove);
        assert_eq!(diff[&3], DiffEntry::Remove);
    }
}
