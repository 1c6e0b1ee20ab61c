//! Operational transformation of structural diffs.
//!
//! `transform_object_diff(local, remote, base)` rewrites `local` (computed
//! against `base`) so it applies cleanly on top of `remote`'s result,
//! converging with the opposite composition order. Per shared key:
//!
//! - remove/remove collapses (the key is already gone)
//! - insert/insert drops when equal, otherwise re-diffs remote → local
//!   (last writer wins on scalars)
//! - a local modification against a remote removal resurrects the key
//!   with the locally-modified value
//! - nested object/list diffs merge recursively
//! - text deltas rebase through fuzzy patching
//!
//! Every other combination passes the local operation through unchanged.

use serde_json::Value;

use jotsync_textdiff::{from_delta, target_text};

use crate::error::{JsonDiffError, JsonDiffResult};
use crate::types::{DiffEntry, ListDiff, ObjectDiff};
use crate::JsonDiff;

impl JsonDiff {
    /// Rebases `local` over `remote` against their common ancestor `base`.
    pub fn transform_object_diff(
        &self,
        local: &ObjectDiff,
        remote: &ObjectDiff,
        base: &Value,
    ) -> JsonDiffResult<ObjectDiff> {
        let base_map = base
            .as_object()
            .ok_or_else(|| JsonDiffError::type_mismatch("<root>", "object"))?;
        let mut out = ObjectDiff::new();

        for (key, local_op) in local {
            let Some(remote_op) = remote.get(key) else {
                out.insert(key.clone(), local_op.clone());
                continue;
            };
            let base_value = || {
                base_map
                    .get(key)
                    .ok_or_else(|| JsonDiffError::missing_target(key.as_str()))
            };
            match (local_op, remote_op) {
                (DiffEntry::Remove, DiffEntry::Remove) => {
                    // Key already gone remotely.
                }
                (DiffEntry::Insert(local_value), DiffEntry::Insert(remote_value)) => {
                    if local_value != remote_value {
                        if let Some(entry) = self.diff(remote_value, local_value) {
                            out.insert(key.clone(), entry);
                        }
                    }
                }
                (
                    DiffEntry::Object(_)
                    | DiffEntry::List(_)
                    | DiffEntry::IntDelta(_)
                    | DiffEntry::TextDelta(_),
                    DiffEntry::Remove,
                ) => {
                    // The remote side removed a key we modified: resurrect
                    // it with our modification applied.
                    let restored = self.apply_entry(base_value()?, local_op)?;
                    out.insert(key.clone(), DiffEntry::Insert(restored));
                }
                (DiffEntry::Object(local_diff), DiffEntry::Object(remote_diff)) => {
                    let nested =
                        self.transform_object_diff(local_diff, remote_diff, base_value()?)?;
                    if !nested.is_empty() {
                        out.insert(key.clone(), DiffEntry::Object(nested));
                    }
                }
                (DiffEntry::List(local_diff), DiffEntry::List(remote_diff)) => {
                    let base_array = base_value()?
                        .as_array()
                        .ok_or_else(|| JsonDiffError::type_mismatch(key.as_str(), "array"))?;
                    let nested =
                        self.transform_list_diff(local_diff, remote_diff, base_array)?;
                    if !nested.is_empty() {
                        out.insert(key.clone(), DiffEntry::List(nested));
                    }
                }
                (DiffEntry::TextDelta(local_delta), DiffEntry::TextDelta(remote_delta)) => {
                    let base_text = base_value()?
                        .as_str()
                        .ok_or_else(|| JsonDiffError::type_mismatch(key.as_str(), "string"))?;
                    if let Some(entry) =
                        self.rebase_text_delta(base_text, local_delta, remote_delta)?
                    {
                        out.insert(key.clone(), entry);
                    }
                }
                _ => {
                    out.insert(key.clone(), local_op.clone());
                }
            }
        }
        Ok(out)
    }

    /// Rebases a local list diff over a remote one.
    ///
    /// Remote insertions at or before an index shift it right; remote
    /// deletions strictly before it shift it left. When the rekeyed index
    /// collides with a remote operation the per-entry rules from
    /// [`JsonDiff::transform_object_diff`] apply (a remote deletion at the
    /// same index shifts by its own removal only after the collision is
    /// resolved, so same-index delete/delete and edit-versus-delete behave
    /// as documented).
    pub fn transform_list_diff(
        &self,
        local: &ListDiff,
        remote: &ListDiff,
        base: &[Value],
    ) -> JsonDiffResult<ListDiff> {
        let remote_inserts: Vec<usize> = remote
            .iter()
            .filter(|(_, op)| matches!(op, DiffEntry::Insert(_)))
            .map(|(&i, _)| i)
            .collect();
        let remote_deletes: Vec<usize> = remote
            .iter()
            .filter(|(_, op)| matches!(op, DiffEntry::Remove))
            .map(|(&i, _)| i)
            .collect();

        let mut out = ListDiff::new();
        for (&index, local_op) in local {
            let shift_right = remote_inserts.iter().filter(|&&x| x <= index).count();
            let shift_left = remote_deletes.iter().filter(|&&x| x < index).count();
            let rekeyed = (index + shift_right).saturating_sub(shift_left);

            let base_value = || {
                base.get(index)
                    .ok_or(JsonDiffError::IndexOutOfBounds {
                        index,
                        len: base.len(),
                    })
            };
            let Some(remote_op) = remote.get(&rekeyed) else {
                out.insert(rekeyed, local_op.clone());
                continue;
            };
            match (local_op, remote_op) {
                (DiffEntry::Remove, DiffEntry::Remove) => {}
                (DiffEntry::Insert(local_value), DiffEntry::Insert(remote_value)) => {
                    if local_value != remote_value {
                        if let Some(entry) = self.diff(remote_value, local_value) {
                            out.insert(rekeyed, entry);
                        }
                    }
                }
                (
                    DiffEntry::Object(_)
                    | DiffEntry::List(_)
                    | DiffEntry::IntDelta(_)
                    | DiffEntry::TextDelta(_),
                    DiffEntry::Remove,
                ) => {
                    let restored = self.apply_entry(base_value()?, local_op)?;
                    out.insert(rekeyed, DiffEntry::Insert(restored));
                }
                (DiffEntry::Object(local_diff), DiffEntry::Object(remote_diff)) => {
                    let nested =
                        self.transform_object_diff(local_diff, remote_diff, base_value()?)?;
                    if !nested.is_empty() {
                        out.insert(rekeyed, DiffEntry::Object(nested));
                    }
                }
                (DiffEntry::List(local_diff), DiffEntry::List(remote_diff)) => {
                    let base_array = base_value()?
                        .as_array()
                        .ok_or_else(|| {
                            JsonDiffError::type_mismatch(index.to_string(), "array")
                        })?;
                    let nested =
                        self.transform_list_diff(local_diff, remote_diff, base_array)?;
                    if !nested.is_empty() {
                        out.insert(rekeyed, DiffEntry::List(nested));
                    }
                }
                (DiffEntry::TextDelta(local_delta), DiffEntry::TextDelta(remote_delta)) => {
                    let base_text = base_value()?
                        .as_str()
                        .ok_or_else(|| {
                            JsonDiffError::type_mismatch(index.to_string(), "string")
                        })?;
                    if let Some(entry) =
                        self.rebase_text_delta(base_text, local_delta, remote_delta)?
                    {
                        out.insert(rekeyed, entry);
                    }
                }
                _ => {
                    out.insert(rekeyed, local_op.clone());
                }
            }
        }
        Ok(out)
    }

    /// Rebases a local text delta over a remote one: apply the remote
    /// delta to the base, fuzzily patch the local edits on top, and
    /// re-diff. Returns `None` when the local edits dissolve entirely.
    fn rebase_text_delta(
        &self,
        base_text: &str,
        local_delta: &str,
        remote_delta: &str,
    ) -> JsonDiffResult<Option<DiffEntry>> {
        let remote_diffs = from_delta(base_text, remote_delta)?;
        let remote_text = target_text(&remote_diffs);

        let local_diffs = from_delta(base_text, local_delta)?;
        let patches = self.text.patch_make_from_diffs(base_text, &local_diffs);
        let (rebased_text, _) = self.text.patch_apply(&patches, &remote_text);

        if rebased_text == remote_text {
            return Ok(None);
        }
        Ok(Some(DiffEntry::TextDelta(
            self.text_delta(&remote_text, &rebased_text),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jd() -> JsonDiff {
        JsonDiff::new()
    }

    fn diff_objects(a: &Value, b: &Value) -> ObjectDiff {
        jd().object_diff(a.as_object().unwrap(), b.as_object().unwrap())
    }

    /// Applies remote then rebased-local, and local then rebased-remote;
    /// both compositions must converge on the same value.
    fn assert_converges(base: &Value, local_target: &Value, remote_target: &Value) -> Value {
        let jd = jd();
        let local = diff_objects(base, local_target);
        let remote = diff_objects(base, remote_target);

        let local_rebased = jd.transform_object_diff(&local, &remote, base).unwrap();
        let remote_rebased = jd.transform_object_diff(&remote, &local, base).unwrap();

        let s1 = jd
            .apply_object_diff(
                &jd.apply_object_diff(base, &remote).unwrap(),
                &local_rebased,
            )
            .unwrap();
        let s2 = jd
            .apply_object_diff(
                &jd.apply_object_diff(base, &local).unwrap(),
                &remote_rebased,
            )
            .unwrap();
        assert_eq!(s1, s2, "compositions diverged");
        s1
    }

    #[test]
    fn disjoint_edits_merge() {
        let base = json!({"a": 1, "b": 2});
        let merged = assert_converges(&base, &json!({"a": 9, "b": 2}), &json!({"a": 1, "b": 7}));
        assert_eq!(merged, json!({"a": 9, "b": 7}));
    }

    #[test]
    fn remove_remove_collapses() {
        let base = json!({"a": 1, "b": 2});
        let merged = assert_converges(&base, &json!({"b": 2}), &json!({"b": 2}));
        assert_eq!(merged, json!({"b": 2}));
    }

    #[test]
    fn insert_insert_equal_drops() {
        let base = json!({});
        let merged = assert_converges(&base, &json!({"x": 5}), &json!({"x": 5}));
        assert_eq!(merged, json!({"x": 5}));
    }

    #[test]
    fn insert_insert_conflict_last_writer_wins() {
        let jd = jd();
        let base = json!({});
        let local = diff_objects(&base, &json!({"x": "mine"}));
        let remote = diff_objects(&base, &json!({"x": "theirs"}));
        let rebased = jd.transform_object_diff(&local, &remote, &base).unwrap();
        let after_remote = jd.apply_object_diff(&base, &remote).unwrap();
        let merged = jd.apply_object_diff(&after_remote, &rebased).unwrap();
        assert_eq!(merged, json!({"x": "mine"}));
    }

    #[test]
    fn edit_versus_remove_resurrects() {
        let jd = jd();
        let base = json!({"note": {"text": "abc"}});
        // Local edits the nested object, remote removes the whole key.
        let local = diff_objects(&base, &json!({"note": {"text": "abcd"}}));
        let remote = diff_objects(&base, &json!({}));
        let rebased = jd.transform_object_diff(&local, &remote, &base).unwrap();

        let after_remote = jd.apply_object_diff(&base, &remote).unwrap();
        let merged = jd.apply_object_diff(&after_remote, &rebased).unwrap();
        assert_eq!(merged, json!({"note": {"text": "abcd"}}));
    }

    #[test]
    fn concurrent_text_edits_converge() {
        // Local "abc" -> "aXbc", remote "abc" -> "abcY": both orders must
        // produce "aXbcY".
        let base = json!({"t": "abc"});
        let merged = assert_converges(&base, &json!({"t": "aXbc"}), &json!({"t": "abcY"}));
        assert_eq!(merged, json!({"t": "aXbcY"}));
    }

    #[test]
    fn identical_text_deletions_dissolve() {
        // Both sides deleting the same span: the fuzzy patch maps the
        // local deletion onto already-deleted text, so the rebased diff
        // vanishes.
        let jd = jd();
        let base = json!({"t": "hello world"});
        let local = diff_objects(&base, &json!({"t": "hello"}));
        let remote = diff_objects(&base, &json!({"t": "hello"}));
        let rebased = jd.transform_object_diff(&local, &remote, &base).unwrap();
        assert!(rebased.is_empty());
    }

    #[test]
    fn nested_object_diffs_recurse() {
        let base = json!({"meta": {"a": 1, "b": 2}});
        let merged = assert_converges(
            &base,
            &json!({"meta": {"a": 10, "b": 2}}),
            &json!({"meta": {"a": 1, "b": 20}}),
        );
        assert_eq!(merged, json!({"meta": {"a": 10, "b": 20}}));
    }

    #[test]
    fn untouched_remote_keys_pass_through() {
        let jd = jd();
        let base = json!({"a": 1});
        let local = diff_objects(&base, &json!({"a": 2}));
        let remote = ObjectDiff::new();
        let rebased = jd.transform_object_diff(&local, &remote, &base).unwrap();
        assert_eq!(rebased, local);
    }

    #[test]
    fn list_transform_shifts_for_remote_deletes() {
        let jd = jd();
        let base = json!(["a", "b", "c", "d"]);
        let base_array = base.as_array().unwrap();

        // Local replaces index 3; remote removes index 1.
        let mut local = ListDiff::new();
        local.insert(3, DiffEntry::Replace(json!("D")));
        let mut remote = ListDiff::new();
        remote.insert(1, DiffEntry::Remove);

        let rebased = jd.transform_list_diff(&local, &remote, base_array).unwrap();
        assert_eq!(rebased[&2], DiffEntry::Replace(json!("D")));

        let after_remote = jd.apply_list_diff(&base, &remote).unwrap();
        let merged = jd.apply_list_diff(&after_remote, &rebased).unwrap();
        assert_eq!(merged, json!(["a", "c", "D"]));
    }

    #[test]
    fn list_transform_shifts_for_remote_inserts() {
        let jd = jd();
        let base = json!(["a", "b"]);
        let base_array = base.as_array().unwrap();

        let mut local = ListDiff::new();
        local.insert(1, DiffEntry::Replace(json!("B")));
        let mut remote = ListDiff::new();
        remote.insert(0, DiffEntry::Insert(json!("z")));

        let rebased = jd.transform_list_diff(&local, &remote, base_array).unwrap();
        assert_eq!(rebased[&2], DiffEntry::Replace(json!("B")));

        let after_remote = jd.apply_list_diff(&base, &remote).unwrap();
        let merged = jd.apply_list_diff(&after_remote, &rebased).unwrap();
        assert_eq!(merged, json!(["z", "a", "B"]));
    }

    #[test]
    fn list_same_index_delete_delete_drops() {
        let jd = jd();
        let base = json!(["a", "b", "c"]);
        let mut local = ListDiff::new();
        local.insert(1, DiffEntry::Remove);
        let mut remote = ListDiff::new();
        remote.insert(1, DiffEntry::Remove);
        let rebased = jd
            .transform_list_diff(&local, &remote, base.as_array().unwrap())
            .unwrap();
        assert!(rebased.is_empty());
    }

    #[test]
    fn list_edit_versus_delete_resurrects() {
        let jd = jd();
        let base = json!(["a", "hello", "c"]);
        let mut local = ListDiff::new();
        local.insert(1, DiffEntry::TextDelta("=5\t+!".into()));
        let mut remote = ListDiff::new();
        remote.insert(1, DiffEntry::Remove);

        let rebased = jd
            .transform_list_diff(&local, &remote, base.as_array().unwrap())
            .unwrap();
        assert_eq!(rebased[&1], DiffEntry::Insert(json!("hello!")));

        let after_remote = jd.apply_list_diff(&base, &remote).unwrap();
        let merged = jd.apply_list_diff(&after_remote, &rebased).unwrap();
        assert_eq!(merged, json!(["a", "hello!", "c"]));
    }
}
