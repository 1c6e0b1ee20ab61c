//! End-to-end reconciliation scenarios for the bucket client, driven
//! through the mock transport, mock adapter and manual clock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use jotsync_client::{
    AdapterEvent, BucketClient, ClientConfig, ClientState, LocalData, ManualClock, MockAdapter,
    MockTransport,
};
use jotsync_storage::{KvStore, MemoryStore};
use jotsync_testkit::fixtures::{edited_note_document, note_document};

const UPDATE_DELAY: Duration = Duration::from_millis(500);
const RESEND_INTERVAL: Duration = Duration::from_secs(10);

struct Harness {
    kv: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    client: BucketClient<MockTransport, MockAdapter>,
}

fn harness() -> Harness {
    harness_with_seed(|_| {})
}

/// Builds a client over a seeded store and walks it to `Streaming`.
fn harness_with_seed(seed: impl FnOnce(&MemoryStore)) -> Harness {
    let kv = Arc::new(MemoryStore::new());
    seed(&kv);
    let clock = Arc::new(ManualClock::new());
    let config = ClientConfig::new("app", "notes")
        .with_update_delay(UPDATE_DELAY)
        .with_resend_interval(RESEND_INTERVAL);
    let client = BucketClient::new(
        config,
        kv.clone(),
        MockTransport::new(),
        MockAdapter::new(),
        clock.clone(),
    );
    Harness { kv, clock, client }
}

fn seed_entity(kv: &MemoryStore, id: &str, object: Value, version: i64) {
    kv.write(
        &format!("app/notes/e/{id}"),
        &json!({"object": object, "version": version}).to_string(),
    )
    .unwrap();
}

impl Harness {
    /// Connects and authenticates; with a non-zero cursor the client goes
    /// straight to streaming.
    fn go_online(&mut self) {
        self.client.connect();
        self.client.notify_connected();
        self.client.on_message("auth:user@example.com").unwrap();
    }

    fn outbound_changes(&self) -> Vec<Value> {
        self.client
            .transport()
            .sent()
            .iter()
            .filter(|line| line.starts_with("c:["))
            .map(|line| serde_json::from_str(&line[2..]).unwrap())
            .collect()
    }
}

#[test]
fn initial_index_populates_the_store() {
    let mut h = harness();
    h.go_online();

    assert_eq!(h.client.state(), ClientState::Indexing);
    assert_eq!(
        h.client.transport().sent(),
        vec!["i:1:::100".to_string()]
    );

    h.client
        .on_message(r#"ix:{"index":[{"id":"note-1","v":3,"d":{"content":"hi"}}],"mark":"m1"}"#)
        .unwrap();
    // A mark means more pages.
    assert_eq!(h.client.transport().last().as_deref(), Some("i:1:m1::100"));

    h.client
        .on_message(r#"ix:{"index":[{"id":"note-2","v":1,"d":{"content":"yo"}}],"current":"5219"}"#)
        .unwrap();

    assert_eq!(h.client.state(), ClientState::Streaming);
    assert_eq!(h.client.last_cv(), "5219");
    assert_eq!(h.client.snapshot("note-1"), Some(&json!({"content": "hi"})));
    assert_eq!(h.client.version("note-2"), Some(1));
    assert_eq!(
        h.kv.read("app/notes/last_cv").unwrap().as_deref(),
        Some("5219")
    );

    let events = h.client.adapter().events();
    assert!(events.contains(&AdapterEvent::Initialized));
    assert!(events.iter().any(|e| matches!(
        e,
        AdapterEvent::Notify { id, value: Some(_), .. } if id == "note-1"
    )));
}

#[test]
fn auth_with_cursor_resumes_streaming() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "77").unwrap();
    });
    h.go_online();

    assert_eq!(h.client.state(), ClientState::Streaming);
    assert_eq!(h.client.transport().sent(), vec!["cv:77".to_string()]);
    assert_eq!(h.client.username(), Some("user@example.com"));

    h.client.on_message(r#"u:{"name":"notes"}"#).unwrap();
    assert_eq!(h.client.bucket_meta(), Some(&json!({"name": "notes"})));
}

#[test]
fn auth_expiry_halts_traffic() {
    let mut h = harness();
    h.client.connect();
    h.client.notify_connected();
    h.client.on_message("auth:expired").unwrap();

    assert_eq!(h.client.state(), ClientState::Unauthorized);
    assert!(h
        .client
        .adapter()
        .events()
        .contains(&AdapterEvent::Error("auth:expired".into())));
    assert!(h.client.transport().sent().is_empty());
}

#[test]
fn local_edit_emits_a_change_after_the_coalesce_delay() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.transport().clear();

    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.client.tick().unwrap();
    // Nothing before the coalesce window closes.
    assert!(h.outbound_changes().is_empty());

    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 1);
    let change = &sent[0][0];
    assert_eq!(change["id"], json!("A"));
    assert_eq!(change["ccid"], json!("1"));
    assert_eq!(change["sv"], json!(1));
    assert_eq!(change["o"], json!("M"));
    assert_eq!(change["v"], json!({"t": {"o": "d", "v": "=5\t+!"}}));
    assert_eq!(h.client.pending_changes(), 1);
}

#[test]
fn acknowledgement_applies_without_notifying() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();
    h.client.adapter().clear_events();

    let clientid = h.client.client_id().to_string();
    let ack = format!(
        r#"c:[{{"clientid":"{clientid}","id":"A","ccid":"1","o":"M","ev":2,"cv":"X","v":{{"t":{{"o":"d","v":"=5\t+!"}}}}}}]"#
    );
    h.client.on_message(&ack).unwrap();

    assert_eq!(h.client.snapshot("A"), Some(&json!({"t": "hello!"})));
    assert_eq!(h.client.version("A"), Some(2));
    assert_eq!(h.client.last_cv(), "X");
    assert_eq!(h.client.pending_changes(), 0);
    // Our own change does not re-notify the UI.
    assert!(h.client.adapter().events().is_empty());
}

#[test]
fn edits_made_while_in_flight_are_flushed_after_the_ack() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    // A second edit lands while ccid 1 is in flight: no new change yet.
    h.client.update("A", &json!({"t": "hello!?"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();
    assert_eq!(h.outbound_changes().len(), 1);

    let clientid = h.client.client_id().to_string();
    let ack = format!(
        r#"c:[{{"clientid":"{clientid}","id":"A","ccid":"1","o":"M","ev":2,"cv":"X","v":{{"t":{{"o":"d","v":"=5\t+!"}}}}}}]"#
    );
    h.client.on_message(&ack).unwrap();

    // The ack triggers the follow-up change for the newer edit.
    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 2);
    let follow_up = &sent[1][0];
    assert_eq!(follow_up["ccid"], json!("2"));
    assert_eq!(follow_up["sv"], json!(2));
    assert_eq!(follow_up["v"], json!({"t": {"o": "d", "v": "=6\t+?"}}));
}

#[test]
fn remote_change_applies_and_notifies() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();

    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"M","sv":1,"ev":2,"cv":"Y","v":{"t":{"o":"d","v":"=5\t+!"}}}]"#;
    h.client.on_message(line).unwrap();

    assert_eq!(h.client.snapshot("A"), Some(&json!({"t": "hello!"})));
    assert_eq!(h.client.version("A"), Some(2));
    assert_eq!(h.client.last_cv(), "Y");
    assert!(h.client.adapter().events().contains(&AdapterEvent::Notify {
        id: "A".into(),
        value: Some(json!({"t": "hello!"})),
        cursors: None,
    }));
}

#[test]
fn remote_change_rebases_uncommitted_local_edits() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "abc"}), 1);
    });
    h.go_online();
    // The user has typed locally; the UI holds "aXbc".
    h.client
        .adapter()
        .set_data("A", LocalData::value(json!({"t": "aXbc"})));

    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"M","sv":1,"ev":2,"cv":"Y","v":{"t":{"o":"d","v":"=3\t+Y"}}}]"#;
    h.client.on_message(line).unwrap();

    // The remote edit and the local edit both survive.
    assert!(h.client.adapter().events().contains(&AdapterEvent::Notify {
        id: "A".into(),
        value: Some(json!({"t": "aXbcY"})),
        cursors: None,
    }));
    // The snapshot holds only the server-confirmed value.
    assert_eq!(h.client.snapshot("A"), Some(&json!({"t": "abcY"})));
}

#[test]
fn remote_change_rewrites_cursor_offsets() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello world"}), 1);
    });
    h.go_online();
    // The user inserted "X" at the start; cursor sits after it.
    h.client.adapter().set_data(
        "A",
        LocalData::with_cursors(json!({"t": "Xhello world"}), "t", vec![1]),
    );

    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"M","sv":1,"ev":2,"cv":"Y","v":{"t":{"o":"d","v":"=11\t+!"}}}]"#;
    h.client.on_message(line).unwrap();

    let events = h.client.adapter().events();
    let Some(AdapterEvent::Notify { value, cursors, .. }) = events
        .iter()
        .find(|e| matches!(e, AdapterEvent::Notify { .. }))
    else {
        panic!("expected a notify event");
    };
    assert_eq!(value, &Some(json!({"t": "Xhello world!"})));
    // The insertion before the cursor pushed it right.
    assert_eq!(cursors, &Some(vec![2]));
}

#[test]
fn remote_remove_drops_the_entity() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "bye"}), 1);
    });
    h.go_online();

    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"-","cv":"Z"}]"#;
    h.client.on_message(line).unwrap();

    assert_eq!(h.client.snapshot("A"), None);
    assert!(h.kv.read("app/notes/e/A").unwrap().is_none());
    assert!(h.client.adapter().events().contains(&AdapterEvent::Notify {
        id: "A".into(),
        value: None,
        cursors: None,
    }));
    assert_eq!(h.client.last_cv(), "Z");
}

#[test]
fn stale_duplicate_changes_are_ignored() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "new"}), 4);
    });
    h.go_online();

    // sv mismatch but ev is behind our version: a replayed change.
    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"M","sv":2,"ev":3,"cv":"Q","v":{"t":{"o":"r","v":"old"}}}]"#;
    h.client.on_message(line).unwrap();

    assert_eq!(h.client.snapshot("A"), Some(&json!({"t": "new"})));
    assert_eq!(h.client.version("A"), Some(4));
    // The batch still advances the cursor.
    assert_eq!(h.client.last_cv(), "Q");
    assert_ne!(h.client.state(), ClientState::Indexing);
}

#[test]
fn version_skew_triggers_a_reindex() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "x"}), 1);
    });
    h.go_online();

    // sv is ahead of what we hold: our snapshot is stale.
    let line = r#"c:[{"clientid":"other","id":"A","ccid":"9","o":"M","sv":3,"ev":4,"cv":"Q","v":{"t":{"o":"r","v":"y"}}}]"#;
    h.client.on_message(line).unwrap();

    assert_eq!(h.client.state(), ClientState::Indexing);
    assert_eq!(h.client.version("A"), None);
    assert_eq!(h.client.transport().last().as_deref(), Some("i:1:::100"));
    // An unapplied change must not advance the cursor.
    assert_eq!(h.client.last_cv(), "5");
}

#[test]
fn rejected_change_drops_pending_and_reindexes() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();
    assert_eq!(h.client.pending_changes(), 1);

    let clientid = h.client.client_id().to_string();
    let line = format!(r#"c:[{{"clientid":"{clientid}","id":"A","ccids":["1"],"error":405}}]"#);
    h.client.on_message(&line).unwrap();

    assert_eq!(h.client.pending_changes(), 0);
    assert_eq!(h.client.version("A"), None);
    assert_eq!(h.client.state(), ClientState::Indexing);
}

#[test]
fn duplicate_error_is_ignored() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    let clientid = h.client.client_id().to_string();
    let line = format!(r#"c:[{{"clientid":"{clientid}","id":"A","ccids":["1"],"error":409}}]"#);
    h.client.on_message(&line).unwrap();

    // Acknowledged and dequeued, no re-index.
    assert_eq!(h.client.pending_changes(), 0);
    assert_eq!(h.client.state(), ClientState::Streaming);
    assert_eq!(h.client.version("A"), Some(1));
}

#[test]
fn cursor_rejection_reindexes_but_preserves_the_queue() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();
    assert_eq!(h.client.pending_changes(), 1);

    h.client.on_message("cv:?").unwrap();
    assert_eq!(h.client.state(), ClientState::Indexing);
    assert_eq!(h.client.pending_changes(), 1);

    // The queue replays once the index completes.
    h.client.transport().clear();
    h.client
        .on_message(r#"ix:{"index":[],"current":"fresh"}"#)
        .unwrap();
    assert_eq!(h.outbound_changes().len(), 1);
    assert_eq!(h.client.last_cv(), "fresh");
}

#[test]
fn unacknowledged_changes_retransmit_on_the_resend_interval() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();
    assert_eq!(h.outbound_changes().len(), 1);

    h.clock.advance(RESEND_INTERVAL);
    h.client.tick().unwrap();
    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);

    // And again, until acknowledged.
    h.clock.advance(RESEND_INTERVAL);
    h.client.tick().unwrap();
    assert_eq!(h.outbound_changes().len(), 3);
}

#[test]
fn disconnect_suspends_resend_and_reconnect_replays() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "hello"}), 1);
    });
    h.go_online();
    h.client.update("A", &json!({"t": "hello!"})).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    h.client.notify_disconnected();
    assert_eq!(h.client.state(), ClientState::Disconnected);
    h.client.transport().clear();

    // No retransmission while offline.
    h.clock.advance(RESEND_INTERVAL);
    h.client.tick().unwrap();
    assert!(h.outbound_changes().is_empty());

    // Reconnect replays the queue with the same ccid.
    h.client.connect();
    h.client.notify_connected();
    h.client.on_message("auth:user@example.com").unwrap();
    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0]["ccid"], json!("1"));
}

#[test]
fn offline_edits_flush_after_the_first_index() {
    let mut h = harness();
    h.client.update("draft", &json!({"t": "offline note"})).unwrap();

    h.go_online();
    h.client
        .on_message(r#"ix:{"index":[],"current":"c0"}"#)
        .unwrap();

    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 1);
    let change = &sent[0][0];
    assert_eq!(change["id"], json!("draft"));
    assert_eq!(change["o"], json!("M"));
    assert_eq!(change["v"]["t"]["o"], json!("+"));
    assert!(change.get("sv").is_none());
}

#[test]
fn local_remove_emits_a_removal_change() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "bye"}), 3);
    });
    h.go_online();

    h.client.remove("A").unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 1);
    let change = &sent[0][0];
    assert_eq!(change["o"], json!("-"));
    assert_eq!(change["sv"], json!(3));
    assert!(change.get("v").is_none());
}

#[test]
fn entity_version_responses_feed_history() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "A", json!({"t": "now"}), 5);
    });
    h.go_online();

    h.client.request_version("A", 2);
    assert_eq!(h.client.transport().last().as_deref(), Some("e:A.2"));

    h.client.on_message("e:A.2\n{\"t\":\"then\"}").unwrap();
    assert!(h
        .client
        .adapter()
        .events()
        .contains(&AdapterEvent::NotifyVersion {
            id: "A".into(),
            value: json!({"t": "then"}),
            version: 2,
        }));
    // The snapshot is untouched by history rows.
    assert_eq!(h.client.snapshot("A"), Some(&json!({"t": "now"})));
}

#[test]
fn fixture_documents_flow_through_the_pipeline() {
    let mut h = harness_with_seed(|kv| {
        kv.write("app/notes/last_cv", "5").unwrap();
        seed_entity(kv, "N", note_document(), 1);
    });
    h.go_online();

    h.client.update("N", &edited_note_document()).unwrap();
    h.clock.advance(UPDATE_DELAY);
    h.client.tick().unwrap();

    let sent = h.outbound_changes();
    assert_eq!(sent.len(), 1);
    let diff = &sent[0][0]["v"];
    // The content edit travels as a text delta, the tag list wholesale.
    assert_eq!(diff["content"]["o"], json!("d"));
    assert_eq!(diff["tags"]["o"], json!("r"));
    assert_eq!(diff["tags"]["v"], json!(["inbox"]));
    assert!(diff.get("pinned").is_none());
    assert!(diff.get("revision").is_none());
}

#[test]
fn client_identity_and_counters_persist() {
    let kv = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new());
    let make = |kv: &Arc<MemoryStore>, clock: &Arc<ManualClock>| {
        BucketClient::new(
            ClientConfig::new("app", "notes").with_update_delay(UPDATE_DELAY),
            kv.clone(),
            MockTransport::new(),
            MockAdapter::new(),
            clock.clone(),
        )
    };

    let first_id = {
        let mut client = make(&kv, &clock);
        client.connect();
        client.notify_connected();
        client.on_message("auth:user@example.com").unwrap();
        client
            .on_message(r#"ix:{"index":[],"current":"c1"}"#)
            .unwrap();
        client.update("A", &json!({"t": "x"})).unwrap();
        clock.advance(UPDATE_DELAY);
        client.tick().unwrap();
        client.client_id().to_string()
    };

    // A fresh client over the same store resumes identity and counters.
    let client = make(&kv, &clock);
    assert_eq!(client.client_id(), first_id);
    assert_eq!(client.last_cv(), "c1");
    assert_eq!(kv.read("app/notes/ccid").unwrap().as_deref(), Some("1"));
    assert_eq!(client.snapshot("A"), Some(&json!({})));
}
