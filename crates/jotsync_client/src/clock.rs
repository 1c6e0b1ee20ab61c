//! Time sources.
//!
//! The client never reads the system clock directly; a [`Clock`] is
//! injected so tests can drive timers deterministically.

use std::time::{Duration, Instant, SystemTime};

use parking_lot::RwLock;

/// A monotonic time source with a wall-clock sidecar for timestamps.
pub trait Clock: Send + Sync {
    /// The current instant, for timer scheduling.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, for modification stamps.
    fn unix_millis(&self) -> u64;
}

/// The real system clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A manually-advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    state: RwLock<(Instant, u64)>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            state: RwLock::new((Instant::now(), 0)),
        }
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.write();
        state.0 += by;
        state.1 += by.as_millis() as u64;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.read().0
    }

    fn unix_millis(&self) -> u64 {
        self.state.read().1
    }
}
