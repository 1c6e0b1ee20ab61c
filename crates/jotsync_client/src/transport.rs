//! Transport abstraction.
//!
//! The client only needs a fire-and-forget line sender; connection
//! management (reconnect, backoff, framing) lives in the transport
//! adapter, which reports connectivity transitions to the client via
//! [`crate::BucketClient::notify_connected`] and
//! [`crate::BucketClient::notify_disconnected`].

use parking_lot::Mutex;

/// A line-framed message sender.
pub trait Transport: Send + Sync {
    /// Sends one line. Fire-and-forget: errors are the transport's to
    /// handle (typically by dropping the connection, which the client
    /// learns about separately).
    fn send(&self, line: &str);
}

/// A transport that records every line, for tests.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all lines sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Returns the last line sent, if any.
    pub fn last(&self) -> Option<String> {
        self.sent.lock().last().cloned()
    }

    /// Forgets recorded lines.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MockTransport {
    fn send(&self, line: &str) {
        self.sent.lock().push(line.to_string());
    }
}
