//! # JotSync Storage
//!
//! Key/value persistence adapters for sync clients.
//!
//! Stores are **opaque text stores**: the client owns all value
//! interpretation, backends only move strings. Operations are synchronous
//! and each write is crash-atomic per key.
//!
//! ## Available backends
//!
//! - [`MemoryStore`] - for testing and ephemeral clients
//! - [`FileStore`] - one file per key under a directory
//!
//! ## Example
//!
//! ```
//! use jotsync_storage::{KvStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.write("app/notes/last_cv", "0").unwrap();
//! assert_eq!(store.read("app/notes/last_cv").unwrap().as_deref(), Some("0"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// A synchronous key/value store.
///
/// # Invariants
///
/// - `read` returns exactly what the last `write` for that key stored
/// - `write` is atomic per key: a crash leaves either the old or the new
///   value, never a mix
/// - `delete` of a missing key is not an error
pub trait KvStore: Send + Sync {
    /// Reads the value for a key, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails or the stored value is
    /// corrupt; callers treat corrupt rows as absent and refill them.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes the value for a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot persist the value.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes a key. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists all keys starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}
