//! The per-bucket sync state machine.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use jotsync_jsondiff::{JsonDiff, ObjectDiff};
use jotsync_protocol::{
    parse_server_line, AuthResult, ChangeOp, ChangeRecord, ClientMessage, FullIndex, IndexPage,
    ServerMessage, ERROR_DUPLICATE,
};
use jotsync_storage::KvStore;

use crate::adapter::ClientAdapter;
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::identity::load_or_create_client_id;
use crate::queue::SendQueue;
use crate::store::EntityStore;
use crate::timers::{TimerId, TimerKind, TimerQueue};
use crate::transport::Transport;

/// Connection lifecycle of a bucket client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No transport.
    Disconnected,
    /// Transport requested, not yet established.
    Connecting,
    /// Transport up, waiting for the auth result.
    Authenticating,
    /// Walking index pages to rebuild the local store.
    Indexing,
    /// Quiescent: local edits and remote changes interleave.
    Streaming,
    /// Auth expired; traffic halted until the host reauthorizes.
    Unauthorized,
}

/// A per-bucket sync client.
///
/// Owns the local entity store, the client change counter, the server
/// cursor and the outbound queue. Single-threaded and time-driven: the
/// host feeds it transport lines via [`BucketClient::on_message`],
/// connectivity transitions, local edits, and periodic
/// [`BucketClient::tick`] calls against the injected clock.
pub struct BucketClient<T: Transport, A: ClientAdapter> {
    config: ClientConfig,
    state: ClientState,
    store: EntityStore,
    queue: SendQueue,
    timers: TimerQueue,
    transport: T,
    adapter: A,
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    differ: JsonDiff,

    client_id: String,
    ccid: u64,
    last_cv: String,
    username: Option<String>,
    bucket_meta: Option<Value>,
    initialized: bool,
    resend_timer: Option<TimerId>,
}

impl<T: Transport, A: ClientAdapter> BucketClient<T, A> {
    /// Creates a client, loading identity, counters and the entity store
    /// from persistence.
    pub fn new(
        config: ClientConfig,
        kv: Arc<dyn KvStore>,
        transport: T,
        adapter: A,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let client_id = load_or_create_client_id(kv.as_ref(), &config.app_id);
        let ccid = read_kv(kv.as_ref(), &key(&config, "ccid"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_cv = read_kv(kv.as_ref(), &key(&config, "last_cv")).unwrap_or_else(|| "0".into());
        let username = read_kv(kv.as_ref(), &key(&config, "username"));

        let mut store = EntityStore::new(kv.clone(), &config.app_id, &config.bucket);
        store.load_all();
        info!(
            bucket = %config.bucket,
            entities = store.len(),
            %last_cv,
            "bucket client loaded"
        );

        Self {
            config,
            state: ClientState::Disconnected,
            store,
            queue: SendQueue::new(),
            timers: TimerQueue::new(),
            transport,
            adapter,
            kv,
            clock,
            differ: JsonDiff::new(),
            client_id,
            ccid,
            last_cv,
            username,
            bucket_meta: None,
            initialized: false,
            resend_timer: None,
        }
    }

    /// The persistent client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The current change version cursor.
    pub fn last_cv(&self) -> &str {
        &self.last_cv
    }

    /// The authenticated username, if known.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The last bucket metadata the server sent.
    pub fn bucket_meta(&self) -> Option<&Value> {
        self.bucket_meta.as_ref()
    }

    /// The last server-confirmed snapshot of an entity.
    pub fn snapshot(&self, id: &str) -> Option<&Value> {
        self.store.get(id).map(|e| &e.object)
    }

    /// The server version of an entity.
    pub fn version(&self, id: &str) -> Option<i64> {
        self.store.get(id).and_then(|e| e.version)
    }

    /// Number of changes awaiting acknowledgement.
    pub fn pending_changes(&self) -> usize {
        self.queue.len()
    }

    /// The transport, for inspection.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The adapter, for inspection.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    // ----- connectivity -------------------------------------------------

    /// Marks the client as wanting a connection; the transport adapter
    /// establishes it and reports back.
    pub fn connect(&mut self) {
        if self.state == ClientState::Disconnected {
            self.state = ClientState::Connecting;
        }
    }

    /// The transport is up; authentication happens next.
    pub fn notify_connected(&mut self) {
        debug!(bucket = %self.config.bucket, "connected");
        self.state = ClientState::Authenticating;
    }

    /// The transport dropped. Timers for retransmission are suspended;
    /// the send queue survives for replay on reconnect.
    pub fn notify_disconnected(&mut self) {
        debug!(bucket = %self.config.bucket, "disconnected");
        self.state = ClientState::Disconnected;
        if let Some(timer) = self.resend_timer.take() {
            self.timers.cancel(timer);
        }
    }

    // ----- local edits --------------------------------------------------

    /// Records a local edit to an entity. Edits are coalesced for
    /// `update_delay` before a change is emitted.
    pub fn update(&mut self, id: &str, value: &Value) -> ClientResult<()> {
        if !value.is_object() {
            return Err(ClientError::NotAnObject { id: id.to_string() });
        }
        self.record_local(id, value.clone())
    }

    /// Records a local removal of an entity.
    pub fn remove(&mut self, id: &str) -> ClientResult<()> {
        self.record_local(id, Value::Null)
    }

    fn record_local(&mut self, id: &str, value: Value) -> ClientResult<()> {
        let now_millis = self.clock.unix_millis();
        let entity = self.store.entry(id);
        entity.last = Some(value);
        entity.modified = now_millis;
        let change_in_flight = entity.change.is_some();
        let check_pending = entity.check.is_some();
        self.store.persist(id);

        if self.state != ClientState::Streaming || change_in_flight {
            // The edit stays in `last`; it flushes after the in-flight
            // change is acknowledged or after reconnect.
            return Ok(());
        }
        if !check_pending {
            let at = self.clock.now() + self.config.update_delay;
            let timer = self.timers.schedule(
                at,
                TimerKind::Coalesce {
                    entity_id: id.to_string(),
                },
            );
            if let Some(entity) = self.store.get_mut(id) {
                entity.check = Some(timer);
            }
        }
        Ok(())
    }

    /// Requests a historical version of an entity (`e:` round-trip).
    pub fn request_version(&mut self, id: &str, version: i64) {
        self.send(
            &ClientMessage::EntityVersion {
                id: id.to_string(),
                version,
            }
            .encode(),
        );
    }

    // ----- timers -------------------------------------------------------

    /// Runs all due timers. Call periodically; cadence only bounds timer
    /// latency.
    pub fn tick(&mut self) -> ClientResult<()> {
        for kind in self.timers.due(self.clock.now()) {
            match kind {
                TimerKind::Coalesce { entity_id } => {
                    if let Some(entity) = self.store.get_mut(&entity_id) {
                        entity.check = None;
                    }
                    self.make_change(&entity_id)?;
                }
                TimerKind::Resend => {
                    self.resend_timer = None;
                    if !self.queue.is_empty() {
                        if self.state == ClientState::Streaming {
                            debug!(pending = self.queue.len(), "retransmitting send queue");
                            self.send(&ClientMessage::Changes(self.queue.records()).encode());
                        }
                        self.arm_resend_timer();
                    }
                }
            }
        }
        Ok(())
    }

    // ----- inbound ------------------------------------------------------

    /// Dispatches one framed line from the transport.
    pub fn on_message(&mut self, line: &str) -> ClientResult<()> {
        match parse_server_line(line)? {
            ServerMessage::Auth(result) => self.on_auth(result),
            ServerMessage::Index(index) => self.on_full_index(index),
            ServerMessage::IndexPage(page) => self.on_index_page(page),
            ServerMessage::Changes(changes) => self.on_changes(changes),
            ServerMessage::CvUnknown => {
                info!("server rejected cursor, re-indexing");
                self.start_index();
                Ok(())
            }
            ServerMessage::EntityVersion { id, version, data } => {
                match data {
                    Some(data) => self.on_entity_version(&id, version, data)?,
                    None => debug!(%id, version, "entity version unavailable"),
                }
                Ok(())
            }
            ServerMessage::BucketMeta(meta) => {
                debug!(%meta, "bucket metadata");
                self.bucket_meta = Some(meta);
                Ok(())
            }
        }
    }

    fn on_auth(&mut self, result: AuthResult) -> ClientResult<()> {
        match result {
            AuthResult::User(username) => {
                info!(%username, "authenticated");
                self.username = Some(username.clone());
                write_kv(self.kv.as_ref(), &key(&self.config, "username"), &username);
                if self.last_cv == "0" {
                    self.start_index();
                } else {
                    self.state = ClientState::Streaming;
                    self.send(
                        &ClientMessage::ChangesSince {
                            cv: self.last_cv.clone(),
                        }
                        .encode(),
                    );
                    self.flush_pending()?;
                }
                Ok(())
            }
            AuthResult::Expired => {
                warn!("authentication expired");
                self.state = ClientState::Unauthorized;
                self.adapter.error("auth:expired");
                Ok(())
            }
        }
    }

    fn start_index(&mut self) {
        self.state = ClientState::Indexing;
        self.send(&ClientMessage::index_request(self.config.index_page_size).encode());
    }

    fn on_index_page(&mut self, page: IndexPage) -> ClientResult<()> {
        for row in page.index {
            match row.data {
                Some(data) => self.on_entity_version(&row.id, row.version, data)?,
                // A data-less row still needs its payload.
                None => self.request_version(&row.id, row.version),
            }
        }
        match page.mark {
            Some(mark) => {
                self.send(
                    &ClientMessage::Index {
                        include_data: true,
                        mark: Some(mark),
                        since: None,
                        limit: self.config.index_page_size,
                    }
                    .encode(),
                );
            }
            None => {
                if let Some(current) = page.current {
                    self.set_last_cv(&current);
                }
                self.finish_index()?;
            }
        }
        Ok(())
    }

    fn on_full_index(&mut self, index: FullIndex) -> ClientResult<()> {
        for (id, version) in index.index {
            let stale = self
                .store
                .get(&id)
                .map_or(true, |e| e.version != Some(version));
            if stale {
                self.request_version(&id, version);
            }
        }
        if let Some(cv) = index.cv {
            self.set_last_cv(&cv);
        }
        self.finish_index()
    }

    fn finish_index(&mut self) -> ClientResult<()> {
        self.state = ClientState::Streaming;
        if !self.initialized {
            self.initialized = true;
            self.adapter.initialized();
        }
        self.flush_pending()
    }

    fn on_entity_version(&mut self, id: &str, version: i64, data: Value) -> ClientResult<()> {
        let held = self.store.get(id).and_then(|e| e.version);
        if held.is_some_and(|v| v > version) {
            // Older than what we hold: a history row for the UI.
            self.adapter.notify_version(id, &data, version);
            return Ok(());
        }
        let changed = {
            let entity = self.store.entry(id);
            let changed = entity.object != data || entity.version != Some(version);
            entity.object = data.clone();
            entity.version = Some(version);
            changed
        };
        self.store.persist(id);
        if changed {
            self.adapter.notify(id, Some(&data), None);
        }
        Ok(())
    }

    // ----- outbound pipeline --------------------------------------------

    fn next_ccid(&mut self) -> String {
        self.ccid += 1;
        write_kv(
            self.kv.as_ref(),
            &key(&self.config, "ccid"),
            &self.ccid.to_string(),
        );
        self.ccid.to_string()
    }

    /// Computes and enqueues a change for an entity's current value.
    fn make_change(&mut self, id: &str) -> ClientResult<()> {
        if self.queue.has_pending_for(id) {
            // Strict serialization: one change in flight per entity.
            return Ok(());
        }
        let Some(entity) = self.store.get(id) else {
            return Ok(());
        };
        let current = self
            .adapter
            .get_data(id)
            .map(|d| d.value)
            .or_else(|| entity.last.clone());
        let Some(current) = current else {
            return Ok(());
        };

        let change = if current.is_null() {
            if entity.version.is_none() {
                // Never synced and locally removed: just forget it.
                self.store.remove(id)?;
                return Ok(());
            }
            let sv = entity.version;
            ChangeRecord::remove(id, self.next_ccid(), sv)
        } else {
            let base = entity
                .object
                .as_object()
                .ok_or_else(|| ClientError::NotAnObject { id: id.to_string() })?;
            let target = current
                .as_object()
                .ok_or_else(|| ClientError::NotAnObject { id: id.to_string() })?;
            let diff = self.differ.object_diff(base, target);
            if diff.is_empty() {
                return Ok(());
            }
            let sv = entity.version;
            ChangeRecord::modify(id, self.next_ccid(), sv, diff)
        };

        if let Some(entity) = self.store.get_mut(id) {
            entity.change = Some(change.clone());
        }
        self.queue_change(change);
        Ok(())
    }

    fn queue_change(&mut self, change: ChangeRecord) {
        debug!(id = %change.id, ccid = %change.ccid, op = ?change.op, "queueing change");
        self.queue.push(change.clone());
        if self.state == ClientState::Streaming {
            self.send(&ClientMessage::Changes(vec![change]).encode());
        }
        self.arm_resend_timer();
    }

    fn arm_resend_timer(&mut self) {
        if self.resend_timer.is_none() {
            let at = self.clock.now() + self.config.resend_interval;
            self.resend_timer = Some(self.timers.schedule(at, TimerKind::Resend));
        }
    }

    /// Retransmits the queue and flushes entities with unsent local
    /// edits. Runs after auth and after each completed index.
    fn flush_pending(&mut self) -> ClientResult<()> {
        if !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "replaying send queue");
            self.send(&ClientMessage::Changes(self.queue.records()).encode());
            self.arm_resend_timer();
        }
        for id in self.store.dirty_ids() {
            self.make_change(&id)?;
        }
        Ok(())
    }

    // ----- change batches -----------------------------------------------

    fn on_changes(&mut self, changes: Vec<ChangeRecord>) -> ClientResult<()> {
        let mut reload_needed = false;
        let mut check_updates: Vec<String> = Vec::new();

        for change in changes {
            // Acknowledgements match before the change's effects apply,
            // so our own changes don't re-notify the UI.
            let mut local = false;
            if change.clientid.as_deref() == Some(self.client_id.as_str()) {
                if let Some(acked) = self.queue.take_acknowledged(&change) {
                    debug!(id = %acked.id, ccid = %acked.ccid, "change acknowledged");
                    local = true;
                    if let Some(entity) = self.store.get_mut(&change.id) {
                        entity.change = None;
                    }
                    // Error records dequeue but never re-enter the edit
                    // pipeline; only a real acknowledgement does.
                    if change.error.is_none() {
                        check_updates.push(change.id.clone());
                    }
                }
            }

            if let Some(code) = change.error {
                if code == ERROR_DUPLICATE {
                    debug!(id = %change.id, "duplicate change, already applied");
                } else {
                    warn!(id = %change.id, code, "change rejected, scheduling re-index");
                    if let Some(entity) = self.store.get_mut(&change.id) {
                        entity.version = None;
                        entity.change = None;
                    }
                    self.queue.drop_for_entity(&change.id);
                    reload_needed = true;
                }
                continue;
            }

            let applied = match change.op {
                Some(ChangeOp::Remove) => {
                    self.store.remove(&change.id)?;
                    if !local {
                        self.adapter.notify(&change.id, None, None);
                    }
                    true
                }
                Some(ChangeOp::Modify) => {
                    let ok = self.apply_modification(&change, local)?;
                    if !ok {
                        reload_needed = true;
                    }
                    ok
                }
                None => {
                    warn!(id = %change.id, "change without an operation");
                    false
                }
            };

            // The cursor checkpoints after each applied (or safely
            // skipped) change; a change that forces a re-index must stay
            // replayable.
            if applied {
                if let Some(ref cv) = change.cv {
                    self.set_last_cv(cv);
                }
            }
        }

        if reload_needed {
            self.start_index();
        } else {
            // Flush any edits the user made while a change was in flight.
            for id in check_updates {
                self.make_change(&id)?;
            }
        }
        Ok(())
    }

    /// Applies one modification change; returns false when the client
    /// needs a re-index.
    fn apply_modification(&mut self, change: &ChangeRecord, local: bool) -> ClientResult<bool> {
        let (current_version, orig) = {
            let entity = self.store.entry(&change.id);
            (entity.version, entity.object.clone())
        };

        let source_ok =
            change.source_version.is_none() || change.source_version == current_version;
        if !source_ok {
            let duplicate = match (change.end_version, current_version) {
                (Some(ev), Some(held)) => ev <= held,
                _ => false,
            };
            if duplicate {
                debug!(id = %change.id, "stale change, ignoring");
                return Ok(true);
            }
            warn!(
                id = %change.id,
                expected = ?change.source_version,
                held = ?current_version,
                "source version mismatch"
            );
            if let Some(entity) = self.store.get_mut(&change.id) {
                entity.version = None;
            }
            return Ok(false);
        }

        let Some(ref diff) = change.value else {
            warn!(id = %change.id, "modification without a diff");
            return Ok(false);
        };
        let new_value = match self.differ.apply_object_diff(&orig, diff) {
            Ok(value) => value,
            Err(e) => {
                warn!(id = %change.id, error = %e, "failed to apply change");
                if let Some(entity) = self.store.get_mut(&change.id) {
                    entity.version = None;
                }
                return Ok(false);
            }
        };

        {
            let entity = self.store.entry(&change.id);
            entity.object = new_value.clone();
            entity.version = change.end_version;
        }
        self.store.persist(&change.id);

        if !local {
            self.notify_client(&change.id, &new_value, &orig, diff)?;
        }
        Ok(true)
    }

    /// Delivers a remote change to the UI, rebasing any uncommitted local
    /// edits over it (and cursor offsets with them, when supplied).
    fn notify_client(
        &mut self,
        id: &str,
        new_value: &Value,
        orig: &Value,
        remote_diff: &ObjectDiff,
    ) -> ClientResult<()> {
        let Some(data) = self.adapter.get_data(id) else {
            self.adapter.notify(id, Some(new_value), None);
            return Ok(());
        };

        let uncommitted = match (orig.as_object(), data.value.as_object()) {
            (Some(base), Some(current)) => self.differ.object_diff(base, current),
            _ => ObjectDiff::new(),
        };
        if uncommitted.is_empty() {
            self.adapter.notify(id, Some(new_value), None);
            return Ok(());
        }

        let outcome = self
            .differ
            .transform_object_diff(&uncommitted, remote_diff, orig)
            .and_then(|rebased| match data.field {
                Some(ref field) if !data.cursors.is_empty() => {
                    let mut cursors = data.cursors.clone();
                    self.differ
                        .apply_object_diff_with_offsets(new_value, &rebased, field, &mut cursors)
                        .map(|value| (value, Some(cursors)))
                }
                _ => self
                    .differ
                    .apply_object_diff(new_value, &rebased)
                    .map(|value| (value, None)),
            });
        match outcome {
            Ok((value, cursors)) => {
                {
                    let entity = self.store.entry(id);
                    entity.last = Some(value.clone());
                }
                self.store.persist(id);
                self.adapter.notify(id, Some(&value), cursors.as_deref());
            }
            Err(e) => {
                // A failed rebase falls back to the remote value; the
                // user's uncommitted edits resurface on the next flush.
                warn!(id, error = %e, "rebase failed, notifying remote value");
                self.adapter.notify(id, Some(new_value), None);
            }
        }
        Ok(())
    }

    fn set_last_cv(&mut self, cv: &str) {
        self.last_cv = cv.to_string();
        write_kv(self.kv.as_ref(), &key(&self.config, "last_cv"), cv);
    }

    fn send(&mut self, line: &str) {
        self.transport.send(line);
    }
}

fn key(config: &ClientConfig, name: &str) -> String {
    format!("{}/{}/{}", config.app_id, config.bucket, name)
}

fn read_kv(kv: &dyn KvStore, key: &str) -> Option<String> {
    match kv.read(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted value");
            None
        }
    }
}

fn write_kv(kv: &dyn KvStore, key: &str, value: &str) {
    if let Err(e) = kv.write(key, value) {
        warn!(key, error = %e, "failed to persist value");
    }
}
