//! Change records: the unit of replication.

use serde_json::{Map, Value};

use jotsync_jsondiff::{object_diff_from_value, object_diff_to_value, ObjectDiff};

use crate::error::{ProtocolError, ProtocolResult};

/// Change error code: the change was already applied.
pub const ERROR_DUPLICATE: i64 = 409;
/// Change error code: the source version does not match the server's.
pub const ERROR_BAD_VERSION: i64 = 405;

/// The operation a change performs on its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    /// Modify the entity by a structural diff.
    Modify,
    /// Remove the entity.
    Remove,
}

impl ChangeOp {
    /// The wire tag for this operation.
    pub fn tag(&self) -> &'static str {
        match self {
            ChangeOp::Modify => "M",
            ChangeOp::Remove => "-",
        }
    }

    /// Parses a wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "M" => Some(ChangeOp::Modify),
            "-" => Some(ChangeOp::Remove),
            _ => None,
        }
    }
}

/// A change record as carried on the wire.
///
/// Outbound changes carry `id`, `ccid`, `sv` and the operation. Inbound
/// records additionally carry the originating `clientid`, the resulting
/// entity version `ev`, the change version cursor `cv`, and possibly an
/// `error` code or a `ccids` batch-acknowledgement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeRecord {
    /// Entity id.
    pub id: String,
    /// Client change id, unique per client.
    pub ccid: String,
    /// Originating client id (inbound only).
    pub clientid: Option<String>,
    /// Source entity version the change is based on.
    pub source_version: Option<i64>,
    /// Resulting entity version (inbound only).
    pub end_version: Option<i64>,
    /// Change version cursor after this change (inbound only).
    pub cv: Option<String>,
    /// The operation.
    pub op: Option<ChangeOp>,
    /// Structural diff for modifications.
    pub value: Option<ObjectDiff>,
    /// Error code when the server rejected the change.
    pub error: Option<i64>,
    /// All ccids acknowledged by this record.
    pub ccids: Option<Vec<String>>,
}

impl ChangeRecord {
    /// Creates an outbound modification change.
    pub fn modify(
        id: impl Into<String>,
        ccid: impl Into<String>,
        source_version: Option<i64>,
        value: ObjectDiff,
    ) -> Self {
        Self {
            id: id.into(),
            ccid: ccid.into(),
            source_version,
            op: Some(ChangeOp::Modify),
            value: Some(value),
            ..Self::default()
        }
    }

    /// Creates an outbound removal change.
    pub fn remove(
        id: impl Into<String>,
        ccid: impl Into<String>,
        source_version: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            ccid: ccid.into(),
            source_version,
            op: Some(ChangeOp::Remove),
            ..Self::default()
        }
    }

    /// Returns true when this record acknowledges the given ccid.
    pub fn acknowledges(&self, ccid: &str) -> bool {
        if self.ccid == ccid {
            return true;
        }
        self.ccids
            .as_ref()
            .is_some_and(|list| list.iter().any(|c| c == ccid))
    }

    /// Encodes to wire JSON.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.id.clone()));
        map.insert("ccid".into(), Value::String(self.ccid.clone()));
        if let Some(ref clientid) = self.clientid {
            map.insert("clientid".into(), Value::String(clientid.clone()));
        }
        if let Some(sv) = self.source_version {
            map.insert("sv".into(), Value::from(sv));
        }
        if let Some(ev) = self.end_version {
            map.insert("ev".into(), Value::from(ev));
        }
        if let Some(ref cv) = self.cv {
            map.insert("cv".into(), Value::String(cv.clone()));
        }
        if let Some(op) = self.op {
            map.insert("o".into(), Value::String(op.tag().into()));
        }
        if let Some(ref value) = self.value {
            map.insert("v".into(), object_diff_to_value(value));
        }
        if let Some(error) = self.error {
            map.insert("error".into(), Value::from(error));
        }
        if let Some(ref ccids) = self.ccids {
            map.insert(
                "ccids".into(),
                Value::Array(ccids.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }

    /// Decodes from wire JSON.
    pub fn from_value(value: &Value) -> ProtocolResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("c", "change is not an object"))?;
        let get_str = |name: &str| map.get(name).and_then(Value::as_str).map(str::to_string);

        let id = get_str("id")
            .ok_or_else(|| ProtocolError::malformed("c", "change has no id"))?;
        // Error records may omit the ccid when a ccids list is present.
        let ccid = get_str("ccid").unwrap_or_default();
        let op = match map.get("o").and_then(Value::as_str) {
            None => None,
            Some(tag) => Some(ChangeOp::from_tag(tag).ok_or_else(|| {
                ProtocolError::malformed("c", format!("unknown change op {tag:?}"))
            })?),
        };
        let value = match map.get("v") {
            None => None,
            Some(v) => Some(object_diff_from_value(v)?),
        };
        let ccids = map.get("ccids").and_then(Value::as_array).map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });

        Ok(Self {
            id,
            ccid,
            clientid: get_str("clientid"),
            source_version: map.get("sv").and_then(Value::as_i64),
            end_version: map.get("ev").and_then(Value::as_i64),
            cv: get_str("cv"),
            op,
            value,
            error: map.get("error").and_then(Value::as_i64),
            ccids,
        })
    }
}
