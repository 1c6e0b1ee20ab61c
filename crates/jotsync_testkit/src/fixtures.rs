//! Canonical fixture documents and wire payloads.

use serde_json::{json, Value};

/// A small note document as the sync client stores it.
pub fn note_document() -> Value {
    json!({
        "content": "Lorem ipsum dolor sit amet",
        "tags": ["inbox", "drafts"],
        "pinned": false,
        "revision": 7
    })
}

/// The same note after a local edit to its content and tags.
pub fn edited_note_document() -> Value {
    json!({
        "content": "Lorem ipsum dolor sit amet, consectetur",
        "tags": ["inbox"],
        "pinned": false,
        "revision": 7
    })
}

/// A server change line acknowledging a client modification.
///
/// Substitutes the given client id so tests can match it against their own.
pub fn ack_change_line(clientid: &str, id: &str, ccid: &str, ev: i64, cv: &str) -> String {
    format!(
        "c:[{{\"clientid\":\"{clientid}\",\"id\":\"{id}\",\"ccid\":\"{ccid}\",\"o\":\"M\",\"ev\":{ev},\"cv\":\"{cv}\",\"v\":{{}}}}]"
    )
}

/// A paginated index page line with a single row.
pub fn index_page_line(id: &str, version: i64, data: &Value, current: &str) -> String {
    format!(
        "ix:{{\"index\":[{{\"id\":\"{id}\",\"v\":{version},\"d\":{data}}}],\"current\":\"{current}\"}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_documents_differ() {
        assert_ne!(note_document(), edited_note_document());
    }

    #[test]
    fn wire_lines_have_prefixes() {
        assert!(ack_change_line("c0ffee", "note-1", "1", 2, "X").starts_with("c:["));
        assert!(index_page_line("note-1", 1, &note_document(), "abc").starts_with("ix:{"));
    }
}
