//! UI adapter callbacks.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

/// The UI's current value for an entity, as returned by
/// [`ClientAdapter::get_data`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalData {
    /// The current local value.
    pub value: Value,
    /// The string field holding the focused text, when cursor positions
    /// should survive a rebase.
    pub field: Option<String>,
    /// Cursor offsets (UTF-16 code units) inside `field`.
    pub cursors: Vec<usize>,
}

impl LocalData {
    /// Wraps a bare value with no cursor tracking.
    pub fn value(value: Value) -> Self {
        Self {
            value,
            field: None,
            cursors: Vec::new(),
        }
    }

    /// Wraps a value with a focused field and cursor offsets.
    pub fn with_cursors(value: Value, field: impl Into<String>, cursors: Vec<usize>) -> Self {
        Self {
            value,
            field: Some(field.into()),
            cursors,
        }
    }
}

/// Callbacks through which the client drives the UI.
///
/// All callbacks run on the client's task; implementations should hand
/// work off rather than block.
pub trait ClientAdapter: Send + Sync {
    /// A remote change produced a new value (or `None` for a removal).
    /// When a cursor-tracked rebase happened, `cursors` carries the
    /// rewritten offsets for the focused field.
    fn notify(&self, id: &str, value: Option<&Value>, cursors: Option<&[usize]>);

    /// A historical version of an entity arrived.
    fn notify_version(&self, id: &str, value: &Value, version: i64);

    /// Fetch the user's current value for an entity, or `None` when the
    /// UI holds no newer state than the client store.
    fn get_data(&self, id: &str) -> Option<LocalData>;

    /// The initial index has fully loaded.
    fn initialized(&self);

    /// An unrecoverable error; traffic is halted until the host
    /// intervenes (e.g. reauthorizes).
    fn error(&self, message: &str);
}

/// A notification recorded by [`MockAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// `notify` was called.
    Notify {
        /// Entity id.
        id: String,
        /// New value, `None` for removal.
        value: Option<Value>,
        /// Rewritten cursor offsets, when tracked.
        cursors: Option<Vec<usize>>,
    },
    /// `notify_version` was called.
    NotifyVersion {
        /// Entity id.
        id: String,
        /// Historical value.
        value: Value,
        /// Historical version.
        version: i64,
    },
    /// `initialized` was called.
    Initialized,
    /// `error` was called.
    Error(String),
}

/// A scripted adapter for tests: records every callback and serves
/// configured local data.
#[derive(Debug, Default)]
pub struct MockAdapter {
    events: Mutex<Vec<AdapterEvent>>,
    data: Mutex<HashMap<String, LocalData>>,
}

impl MockAdapter {
    /// Creates an adapter with no local data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local data served for an entity.
    pub fn set_data(&self, id: impl Into<String>, data: LocalData) {
        self.data.lock().insert(id.into(), data);
    }

    /// Clears the local data for an entity.
    pub fn clear_data(&self, id: &str) {
        self.data.lock().remove(id);
    }

    /// Returns all recorded events.
    pub fn events(&self) -> Vec<AdapterEvent> {
        self.events.lock().clone()
    }

    /// Forgets recorded events.
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }
}

impl ClientAdapter for MockAdapter {
    fn notify(&self, id: &str, value: Option<&Value>, cursors: Option<&[usize]>) {
        self.events.lock().push(AdapterEvent::Notify {
            id: id.to_string(),
            value: value.cloned(),
            cursors: cursors.map(<[usize]>::to_vec),
        });
    }

    fn notify_version(&self, id: &str, value: &Value, version: i64) {
        self.events.lock().push(AdapterEvent::NotifyVersion {
            id: id.to_string(),
            value: value.clone(),
            version,
        });
    }

    fn get_data(&self, id: &str) -> Option<LocalData> {
        self.data.lock().get(id).cloned()
    }

    fn initialized(&self) {
        self.events.lock().push(AdapterEvent::Initialized);
    }

    fn error(&self, message: &str) {
        self.events
            .lock()
            .push(AdapterEvent::Error(message.to_string()));
    }
}
