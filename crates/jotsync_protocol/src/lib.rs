//! # JotSync Protocol
//!
//! Wire message types and codecs for the JotSync change-number protocol.
//!
//! This crate provides:
//! - `ChangeRecord` for replication records and their acknowledgements
//! - Line-framed message parsing (`auth:`, `i:`, `ix:`, `cv:`, `c:`,
//!   `e:`, `u:`) and client message encoding
//! - Index payloads (full and paginated)
//!
//! This is a pure protocol crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
mod index;
mod messages;

pub use change::{ChangeOp, ChangeRecord, ERROR_BAD_VERSION, ERROR_DUPLICATE};
pub use error::{ProtocolError, ProtocolResult};
pub use index::{FullIndex, IndexPage, IndexRow};
pub use messages::{parse_server_line, AuthResult, ClientMessage, ServerMessage};
