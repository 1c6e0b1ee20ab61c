//! # JotSync Testkit
//!
//! Test utilities shared by the JotSync crates.
//!
//! This crate provides:
//! - Property-based strategies for JSON documents and edit-heavy text
//! - Canonical fixture documents and wire payloads for client tests
//!
//! It is consumed as a dev-dependency only.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;
