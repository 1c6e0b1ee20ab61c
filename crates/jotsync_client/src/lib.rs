//! # JotSync Client
//!
//! The per-bucket sync state machine.
//!
//! This crate provides:
//! - [`BucketClient`]: entity store, client change counter, server
//!   cursor, outbound queue and reconciliation logic
//! - Trait seams for the transport, the UI adapter and the clock, with
//!   mock implementations for tests
//! - Timer-driven edit coalescing and unacknowledged-change resends
//!
//! The client is single-threaded and cooperative: the host feeds it
//! transport lines, connectivity transitions and local edits, and calls
//! [`BucketClient::tick`] to run due timers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod bucket;
mod clock;
mod config;
mod error;
mod identity;
mod queue;
mod store;
mod timers;
mod transport;

pub use adapter::{AdapterEvent, ClientAdapter, LocalData, MockAdapter};
pub use bucket::{BucketClient, ClientState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use identity::generate_client_id;
pub use store::{EntityRecord, EntityStore};
pub use timers::TimerId;
pub use transport::{MockTransport, Transport};
