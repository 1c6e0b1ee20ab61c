//! The local entity store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::warn;

use jotsync_protocol::ChangeRecord;
use jotsync_storage::KvStore;

use crate::error::ClientResult;
use crate::timers::TimerId;

/// Per-entity state.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    /// Last server-confirmed snapshot.
    pub object: Value,
    /// Server version; `None` for never-synced entities.
    pub version: Option<i64>,
    /// Local working copy pending flush.
    pub last: Option<Value>,
    /// The in-flight change, at most one per entity.
    pub change: Option<ChangeRecord>,
    /// Pending coalesce timer, if any.
    pub check: Option<TimerId>,
    /// Unix-milliseconds stamp of the last local update.
    pub modified: u64,
}

impl EntityRecord {
    /// Creates a never-synced skeleton record.
    pub fn skeleton() -> Self {
        Self {
            object: Value::Object(Map::new()),
            ..Self::default()
        }
    }
}

/// The in-memory entity store with its persistence prefix.
///
/// Entities persist as JSON of `{object, version, last?}` under
/// `<app>/<bucket>/e/<id>`; in-flight change state and timers are
/// runtime-only.
pub struct EntityStore {
    entities: HashMap<String, EntityRecord>,
    kv: Arc<dyn KvStore>,
    prefix: String,
}

impl EntityStore {
    /// Creates a store for one bucket.
    pub fn new(kv: Arc<dyn KvStore>, app_id: &str, bucket: &str) -> Self {
        Self {
            entities: HashMap::new(),
            kv,
            prefix: format!("{app_id}/{bucket}/e/"),
        }
    }

    fn key_for(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Loads every persisted entity. Corrupt rows are skipped; the next
    /// index pass refills them.
    pub fn load_all(&mut self) {
        let keys = match self.kv.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to list persisted entities");
                return;
            }
        };
        for key in keys {
            let id = key[self.prefix.len()..].to_string();
            match self.kv.read(&key) {
                Ok(Some(raw)) => match parse_entity(&raw) {
                    Some(record) => {
                        self.entities.insert(id, record);
                    }
                    None => warn!(%id, "skipping corrupt persisted entity"),
                },
                Ok(None) => {}
                Err(e) => warn!(%id, error = %e, "failed to read persisted entity"),
            }
        }
    }

    /// Returns the entity, if known.
    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    /// Returns the entity mutably, if known.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut EntityRecord> {
        self.entities.get_mut(id)
    }

    /// Returns the entity, creating a never-synced skeleton if unknown.
    pub fn entry(&mut self, id: &str) -> &mut EntityRecord {
        self.entities
            .entry(id.to_string())
            .or_insert_with(EntityRecord::skeleton)
    }

    /// Persists one entity. Write failures are logged and swallowed: the
    /// in-memory store plus the server log remain authoritative.
    pub fn persist(&self, id: &str) {
        let Some(record) = self.entities.get(id) else {
            return;
        };
        let mut body = json!({
            "object": record.object,
            "version": record.version,
        });
        if let Some(ref last) = record.last {
            body["last"] = last.clone();
        }
        if let Err(e) = self.kv.write(&self.key_for(id), &body.to_string()) {
            warn!(id, error = %e, "failed to persist entity");
        }
    }

    /// Removes an entity from memory and persistence.
    pub fn remove(&mut self, id: &str) -> ClientResult<()> {
        self.entities.remove(id);
        self.kv.delete(&self.key_for(id))?;
        Ok(())
    }

    /// Ids of entities with unflushed local edits and no change in
    /// flight.
    pub fn dirty_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entities
            .iter()
            .filter(|(_, e)| e.last.is_some() && e.change.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of known entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no entities are known.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn parse_entity(raw: &str) -> Option<EntityRecord> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let map = value.as_object()?;
    let object = map.get("object")?.clone();
    if !object.is_object() {
        return None;
    }
    let version = match map.get("version") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_i64()?),
    };
    Some(EntityRecord {
        object,
        version,
        last: map.get("last").cloned(),
        change: None,
        check: None,
        modified: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jotsync_storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, EntityStore) {
        let kv = Arc::new(MemoryStore::new());
        let store = EntityStore::new(kv.clone(), "app", "notes");
        (kv, store)
    }

    #[test]
    fn persist_and_reload() {
        let (kv, mut store) = store();
        {
            let entity = store.entry("note-1");
            entity.object = json!({"content": "hi"});
            entity.version = Some(3);
            entity.last = Some(json!({"content": "hi there"}));
        }
        store.persist("note-1");

        let mut reloaded = EntityStore::new(kv, "app", "notes");
        reloaded.load_all();
        let entity = reloaded.get("note-1").unwrap();
        assert_eq!(entity.object, json!({"content": "hi"}));
        assert_eq!(entity.version, Some(3));
        assert_eq!(entity.last, Some(json!({"content": "hi there"})));
        assert!(entity.change.is_none());
    }

    #[test]
    fn null_version_roundtrips_as_never_synced() {
        let (kv, mut store) = store();
        store.entry("note-1");
        store.persist("note-1");

        let mut reloaded = EntityStore::new(kv, "app", "notes");
        reloaded.load_all();
        assert_eq!(reloaded.get("note-1").unwrap().version, None);
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let (kv, _) = store();
        kv.write("app/notes/e/bad", "{not json").unwrap();
        kv.write("app/notes/e/worse", "{\"object\": 5}").unwrap();

        let mut reloaded = EntityStore::new(kv, "app", "notes");
        reloaded.load_all();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn remove_deletes_persistence() {
        let (kv, mut store) = store();
        store.entry("note-1");
        store.persist("note-1");
        assert!(kv.read("app/notes/e/note-1").unwrap().is_some());

        store.remove("note-1").unwrap();
        assert!(store.get("note-1").is_none());
        assert!(kv.read("app/notes/e/note-1").unwrap().is_none());
    }

    #[test]
    fn dirty_ids_lists_unflushed_edits() {
        let (_kv, mut store) = store();
        store.entry("clean");
        store.entry("dirty").last = Some(json!({"a": 1}));
        let mut in_flight = EntityRecord::skeleton();
        in_flight.last = Some(json!({"b": 2}));
        in_flight.change = Some(ChangeRecord::remove("flying", "1", None));
        store.entities.insert("flying".into(), in_flight);

        assert_eq!(store.dirty_ids(), vec!["dirty"]);
    }
}
