//! The outbound change queue.

use std::collections::VecDeque;

use jotsync_protocol::ChangeRecord;

/// Ordered queue of change records awaiting server acknowledgement.
///
/// At most one change per entity is in flight at a time; the queue is
/// replayed whole on reconnect and on the resend interval, which is
/// idempotent because every change carries a stable ccid.
#[derive(Debug, Default)]
pub struct SendQueue {
    queue: VecDeque<ChangeRecord>,
}

impl SendQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: ChangeRecord) {
        self.queue.push_back(change);
    }

    /// True when a change for the entity is already queued.
    pub fn has_pending_for(&self, id: &str) -> bool {
        self.queue.iter().any(|c| c.id == id)
    }

    /// Removes and returns the queued change acknowledged by `record`
    /// (matched by entity id plus ccid or the ccids list).
    pub fn take_acknowledged(&mut self, record: &ChangeRecord) -> Option<ChangeRecord> {
        let position = self
            .queue
            .iter()
            .position(|c| c.id == record.id && record.acknowledges(&c.ccid))?;
        self.queue.remove(position)
    }

    /// Drops every queued change for an entity (version-skew recovery).
    pub fn drop_for_entity(&mut self, id: &str) {
        self.queue.retain(|c| c.id != id);
    }

    /// All queued changes, oldest first, for retransmission.
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.queue.iter().cloned().collect()
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing awaits acknowledgement.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: &str, ccid: &str) -> ChangeRecord {
        ChangeRecord::remove(id, ccid, Some(1))
    }

    #[test]
    fn queue_order_and_lookup() {
        let mut queue = SendQueue::new();
        queue.push(change("a", "1"));
        queue.push(change("b", "2"));

        assert_eq!(queue.len(), 2);
        assert!(queue.has_pending_for("a"));
        assert!(!queue.has_pending_for("c"));
        assert_eq!(queue.records()[0].id, "a");
    }

    #[test]
    fn acknowledgement_by_ccid() {
        let mut queue = SendQueue::new();
        queue.push(change("a", "1"));

        let mut ack = change("a", "1");
        ack.clientid = Some("me".into());
        let taken = queue.take_acknowledged(&ack).unwrap();
        assert_eq!(taken.ccid, "1");
        assert!(queue.is_empty());
    }

    #[test]
    fn acknowledgement_by_ccids_list() {
        let mut queue = SendQueue::new();
        queue.push(change("a", "7"));

        let mut ack = change("a", "99");
        ack.ccids = Some(vec!["6".into(), "7".into()]);
        assert!(queue.take_acknowledged(&ack).is_some());
    }

    #[test]
    fn acknowledgement_requires_matching_entity() {
        let mut queue = SendQueue::new();
        queue.push(change("a", "1"));
        let ack = change("b", "1");
        assert!(queue.take_acknowledged(&ack).is_none());
    }

    #[test]
    fn drop_for_entity_clears_only_that_entity() {
        let mut queue = SendQueue::new();
        queue.push(change("a", "1"));
        queue.push(change("b", "2"));
        queue.drop_for_entity("a");
        assert!(!queue.has_pending_for("a"));
        assert!(queue.has_pending_for("b"));
    }
}
