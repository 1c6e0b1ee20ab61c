//! Configuration for the sync client.

use std::time::Duration;

/// Configuration for a per-bucket sync client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application id, the first segment of every persistence key.
    pub app_id: String,
    /// Bucket name.
    pub bucket: String,
    /// How long to coalesce local edits before emitting a change.
    pub update_delay: Duration,
    /// How often to retransmit the send queue while unacknowledged.
    pub resend_interval: Duration,
    /// Page size for index requests.
    pub index_page_size: u32,
}

impl ClientConfig {
    /// Creates a configuration with the default timings.
    pub fn new(app_id: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            bucket: bucket.into(),
            update_delay: Duration::from_millis(500),
            resend_interval: Duration::from_secs(10),
            index_page_size: 100,
        }
    }

    /// Sets the edit coalescing delay.
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }

    /// Sets the unacknowledged-change resend interval.
    pub fn with_resend_interval(mut self, interval: Duration) -> Self {
        self.resend_interval = interval;
        self
    }

    /// Sets the index page size.
    pub fn with_index_page_size(mut self, size: u32) -> Self {
        self.index_page_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = ClientConfig::new("app", "notes")
            .with_update_delay(Duration::from_millis(50))
            .with_resend_interval(Duration::from_secs(5))
            .with_index_page_size(10);
        assert_eq!(config.app_id, "app");
        assert_eq!(config.bucket, "notes");
        assert_eq!(config.update_delay, Duration::from_millis(50));
        assert_eq!(config.resend_interval, Duration::from_secs(5));
        assert_eq!(config.index_page_size, 10);
    }

    #[test]
    fn default_timings() {
        let config = ClientConfig::new("app", "notes");
        assert_eq!(config.update_delay, Duration::from_millis(500));
        assert_eq!(config.resend_interval, Duration::from_secs(10));
        assert_eq!(config.index_page_size, 100);
    }
}
