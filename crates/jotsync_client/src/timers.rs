//! Deferred work for the single-threaded client.
//!
//! Timers never fire spontaneously: the host calls
//! [`crate::BucketClient::tick`] and due timers run there, keeping every
//! state mutation on the one logical task.

use std::time::Instant;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// What a timer does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Coalesce window for local edits to one entity elapsed.
    Coalesce {
        /// The edited entity.
        entity_id: String,
    },
    /// Retransmit the send queue if still unacknowledged.
    Resend,
}

#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    timers: Vec<(Instant, TimerId, TimerKind)>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a timer; returns its handle.
    pub fn schedule(&mut self, at: Instant, kind: TimerKind) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.push((at, id, kind));
        id
    }

    /// Cancels a timer if still pending.
    pub fn cancel(&mut self, id: TimerId) {
        self.timers.retain(|(_, t, _)| *t != id);
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut due: Vec<(Instant, TimerId, TimerKind)> = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].0 <= now {
                due.push(self.timers.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|(at, id, _)| (*at, id.0));
        due.into_iter().map(|(_, _, kind)| kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_in_order() {
        let base = Instant::now();
        let mut queue = TimerQueue::new();
        queue.schedule(base + Duration::from_secs(2), TimerKind::Resend);
        queue.schedule(
            base + Duration::from_secs(1),
            TimerKind::Coalesce {
                entity_id: "a".into(),
            },
        );

        assert!(queue.due(base).is_empty());
        let due = queue.due(base + Duration::from_secs(3));
        assert_eq!(
            due,
            vec![
                TimerKind::Coalesce {
                    entity_id: "a".into()
                },
                TimerKind::Resend
            ]
        );
        // Fired timers are gone.
        assert!(queue.due(base + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn cancel_removes_pending() {
        let base = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.schedule(base, TimerKind::Resend);
        queue.cancel(id);
        assert!(queue.due(base + Duration::from_secs(1)).is_empty());
    }
}
