//! # JotSync JsonDiff
//!
//! Recursive structural diff, patch and operational transformation over
//! JSON values.
//!
//! This crate provides:
//! - `diff`/`object_diff`/`list_diff` producing compact per-key
//!   operations, with string fields delegated to the text diff kernel
//! - `apply_*` functions reproducing the target value from a source and a
//!   diff, including a cursor-offset-tracking variant
//! - `transform_*` functions rebasing one diff over another against a
//!   common ancestor so concurrent edits converge
//!
//! This is a pure crate with no I/O; the sync client drives it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod diff;
mod error;
mod transform;
mod types;

pub use error::{JsonDiffError, JsonDiffResult};
pub use types::{
    list_diff_from_value, list_diff_to_value, object_diff_from_value, object_diff_to_value,
    DiffEntry, ListDiff, ObjectDiff,
};

use jotsync_textdiff::TextDiff;

/// The structural diff engine.
///
/// Wraps a [`TextDiff`] engine for string fields; stateless otherwise.
#[derive(Debug, Clone, Default)]
pub struct JsonDiff {
    text: TextDiff,
}

impl JsonDiff {
    /// Creates an engine with the default text diff configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine over a custom text diff engine.
    pub fn with_text_engine(text: TextDiff) -> Self {
        Self { text }
    }

    /// Returns the underlying text diff engine.
    pub fn text_engine(&self) -> &TextDiff {
        &self.text
    }
}
