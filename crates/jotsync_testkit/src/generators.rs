//! Property-based test strategies.
//!
//! Provides proptest strategies for the data the sync core actually sees:
//! short prose-like strings (including astral-plane characters), arbitrary
//! JSON scalars and bounded JSON documents.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for text in the shapes note syncing encounters: words,
/// whitespace, punctuation, some multi-byte and astral characters.
pub fn text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~\u{00e9}\u{4e16}\u{1f600}\n\t]{0,40}")
        .expect("valid text regex")
}

/// Strategy for a pair of related texts: a base and an edited variant that
/// shares material with it, which exercises diff paths better than two
/// independent strings.
pub fn text_pair_strategy() -> impl Strategy<Value = (String, String)> {
    (text_strategy(), text_strategy(), text_strategy()).prop_map(|(head, mid, tail)| {
        let base = format!("{head}{mid}{tail}");
        let edited = format!("{head}{tail}{mid}");
        (base, edited)
    })
}

/// Strategy for JSON scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for arbitrary JSON values of bounded depth and size.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-d]", inner, 0..4).prop_map(|m| {
                Value::Object(m.into_iter().collect::<Map<String, Value>>())
            }),
        ]
    })
}

/// Strategy for top-level JSON documents (always objects, as entities are).
pub fn document_strategy() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-e]", value_strategy(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn documents_are_objects(doc in document_strategy()) {
            prop_assert!(doc.is_object());
        }

        #[test]
        fn text_pairs_share_material(pair in text_pair_strategy()) {
            let (base, edited) = pair;
            prop_assert_eq!(base.len(), edited.len());
        }
    }
}
