//! Line-framed protocol messages.
//!
//! Every message is one line of text with a short prefix. The entity
//! version response is the one exception: its payload follows the header
//! after a newline, but the transport still delivers it as a single
//! framed message.

use serde_json::Value;

use crate::change::ChangeRecord;
use crate::error::{ProtocolError, ProtocolResult};
use crate::index::{FullIndex, IndexPage};

/// The result of authentication, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Authenticated as the given user.
    User(String),
    /// The token has expired; the client must reauthorize.
    Expired,
}

/// A message from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `auth:` authentication outcome.
    Auth(AuthResult),
    /// `i:` full index listing.
    Index(FullIndex),
    /// `ix:` paginated index page.
    IndexPage(IndexPage),
    /// `c:` batch of change records.
    Changes(Vec<ChangeRecord>),
    /// `cv:?` the requested cursor is unknown; re-index.
    CvUnknown,
    /// `e:` entity version response; `data` is `None` when the server
    /// answered `?` (version not available).
    EntityVersion {
        /// Entity id.
        id: String,
        /// Entity version.
        version: i64,
        /// Entity payload, if available.
        data: Option<Value>,
    },
    /// `u:` bucket metadata.
    BucketMeta(Value),
}

/// Parses one server line.
pub fn parse_server_line(line: &str) -> ProtocolResult<ServerMessage> {
    if let Some(rest) = line.strip_prefix("auth:") {
        let result = if rest == "expired" {
            AuthResult::Expired
        } else {
            AuthResult::User(rest.to_string())
        };
        return Ok(ServerMessage::Auth(result));
    }
    if let Some(rest) = line.strip_prefix("ix:") {
        let payload: Value = serde_json::from_str(rest)?;
        return Ok(ServerMessage::IndexPage(IndexPage::from_value(&payload)?));
    }
    if let Some(rest) = line.strip_prefix("i:") {
        let payload: Value = serde_json::from_str(rest)?;
        return Ok(ServerMessage::Index(FullIndex::from_value(&payload)?));
    }
    if let Some(rest) = line.strip_prefix("cv:") {
        if rest == "?" {
            return Ok(ServerMessage::CvUnknown);
        }
        return Err(ProtocolError::malformed(
            "cv",
            format!("unexpected cv response {rest:?}"),
        ));
    }
    if let Some(rest) = line.strip_prefix("c:") {
        let payload: Value = serde_json::from_str(rest)?;
        let records = payload
            .as_array()
            .ok_or_else(|| ProtocolError::malformed("c", "payload is not an array"))?;
        let changes = records
            .iter()
            .map(ChangeRecord::from_value)
            .collect::<ProtocolResult<Vec<_>>>()?;
        return Ok(ServerMessage::Changes(changes));
    }
    if let Some(rest) = line.strip_prefix("e:") {
        return parse_entity_version(rest);
    }
    if let Some(rest) = line.strip_prefix("u:") {
        let payload: Value = serde_json::from_str(rest)?;
        return Ok(ServerMessage::BucketMeta(payload));
    }
    Err(ProtocolError::UnknownPrefix(line.to_string()))
}

/// Parses an `e:<id>.<version>\n<json-or-?>` response body.
fn parse_entity_version(rest: &str) -> ProtocolResult<ServerMessage> {
    let (header, body) = rest
        .split_once('\n')
        .ok_or_else(|| ProtocolError::malformed("e", "missing payload line"))?;
    // The id itself may contain dots; the version is after the last one.
    let (id, version) = header
        .rsplit_once('.')
        .ok_or_else(|| ProtocolError::malformed("e", "missing version in header"))?;
    let version: i64 = version
        .parse()
        .map_err(|_| ProtocolError::malformed("e", format!("bad version {version:?}")))?;
    let data = if body == "?" {
        None
    } else {
        Some(serde_json::from_str(body)?)
    };
    Ok(ServerMessage::EntityVersion {
        id: id.to_string(),
        version,
        data,
    })
}

/// A message from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `i:` index page request.
    Index {
        /// Whether entity data should be included in rows.
        include_data: bool,
        /// Continuation mark from the previous page.
        mark: Option<String>,
        /// Only include entities changed since this version.
        since: Option<String>,
        /// Page size.
        limit: u32,
    },
    /// `cv:` request changes since the given cursor.
    ChangesSince {
        /// The client's last change version cursor.
        cv: String,
    },
    /// `c:` transmit change records.
    Changes(Vec<ChangeRecord>),
    /// `e:` request a specific entity version.
    EntityVersion {
        /// Entity id.
        id: String,
        /// Entity version.
        version: i64,
    },
}

impl ClientMessage {
    /// Encodes this message as its wire line.
    pub fn encode(&self) -> String {
        match self {
            ClientMessage::Index {
                include_data,
                mark,
                since,
                limit,
            } => {
                format!(
                    "i:{}:{}:{}:{}",
                    if *include_data { "1" } else { "0" },
                    mark.as_deref().unwrap_or(""),
                    since.as_deref().unwrap_or(""),
                    limit
                )
            }
            ClientMessage::ChangesSince { cv } => format!("cv:{cv}"),
            ClientMessage::Changes(records) => {
                let values: Vec<Value> = records.iter().map(ChangeRecord::to_value).collect();
                format!("c:{}", Value::Array(values))
            }
            ClientMessage::EntityVersion { id, version } => format!("e:{id}.{version}"),
        }
    }

    /// Creates the first-page index request the client sends on re-index.
    pub fn index_request(limit: u32) -> Self {
        ClientMessage::Index {
            include_data: true,
            mark: None,
            since: None,
            limit,
        }
    }
}
