//! Index payloads: full and paginated entity listings.

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// One row of a paginated index page.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    /// Entity id.
    pub id: String,
    /// Entity version.
    pub version: i64,
    /// Entity data, present when the index was requested with data.
    pub data: Option<Value>,
}

/// A paginated index page (`ix:` message).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexPage {
    /// Rows in this page.
    pub index: Vec<IndexRow>,
    /// Continuation mark for the next page, absent on the last page.
    pub mark: Option<String>,
    /// The change version cursor as of this index snapshot, sent on the
    /// last page.
    pub current: Option<String>,
}

impl IndexPage {
    /// Decodes a page from its JSON payload.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("ix", "page is not an object"))?;
        let rows = map
            .get("index")
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::malformed("ix", "page has no index array"))?;
        let mut index = Vec::with_capacity(rows.len());
        for row in rows {
            let row_map = row
                .as_object()
                .ok_or_else(|| ProtocolError::malformed("ix", "row is not an object"))?;
            let id = row_map
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| ProtocolError::malformed("ix", "row has no id"))?
                .to_string();
            let version = row_map
                .get("v")
                .and_then(Value::as_i64)
                .ok_or_else(|| ProtocolError::malformed("ix", "row has no version"))?;
            index.push(IndexRow {
                id,
                version,
                data: row_map.get("d").cloned(),
            });
        }
        Ok(Self {
            index,
            mark: map.get("mark").and_then(Value::as_str).map(str::to_string),
            current: map
                .get("current")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// A full index listing (`i:` response): id to version, plus the cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullIndex {
    /// Entity versions by id.
    pub index: Vec<(String, i64)>,
    /// The change version cursor as of this snapshot.
    pub cv: Option<String>,
}

impl FullIndex {
    /// Decodes a listing from its JSON payload.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("i", "index is not an object"))?;
        let entries = map
            .get("index")
            .and_then(Value::as_object)
            .ok_or_else(|| ProtocolError::malformed("i", "listing has no index map"))?;
        let mut index = Vec::with_capacity(entries.len());
        for (id, version) in entries {
            let version = version
                .as_i64()
                .ok_or_else(|| ProtocolError::malformed("i", "non-integer version"))?;
            index.push((id.clone(), version));
        }
        Ok(Self {
            index,
            cv: map.get("cv").and_then(Value::as_str).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn index_page_decodes() {
        let payload = json!({
            "index": [
                {"id": "note-1", "v": 3, "d": {"content": "hi"}},
                {"id": "note-2", "v": 1},
            ],
            "mark": "next-page",
        });
        let page = IndexPage::from_value(&payload).unwrap();
        assert_eq!(page.index.len(), 2);
        assert_eq!(page.index[0].id, "note-1");
        assert_eq!(page.index[0].data, Some(json!({"content": "hi"})));
        assert_eq!(page.index[1].data, None);
        assert_eq!(page.mark.as_deref(), Some("next-page"));
        assert_eq!(page.current, None);
    }

    #[test]
    fn last_page_carries_current() {
        let payload = json!({"index": [], "current": "5219dd"});
        let page = IndexPage::from_value(&payload).unwrap();
        assert!(page.index.is_empty());
        assert_eq!(page.current.as_deref(), Some("5219dd"));
    }

    #[test]
    fn full_index_decodes() {
        let payload = json!({"index": {"note-1": 3, "note-2": 1}, "cv": "abc"});
        let full = FullIndex::from_value(&payload).unwrap();
        assert_eq!(full.index.len(), 2);
        assert_eq!(full.cv.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_malformed_pages() {
        assert!(IndexPage::from_value(&json!([])).is_err());
        assert!(IndexPage::from_value(&json!({"index": [{"v": 1}]})).is_err());
        assert!(FullIndex::from_value(&json!({"index": []})).is_err());
    }
}
