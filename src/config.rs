//! Konfigurasi endpoint blocking

use std::time::Duration;

/// Batas buffer lokal endpoint (jumlah pesan per refill)
pub const DEFAULT_MAX_BUFFERED: usize = 128;

/// Interval poll run loop saat menunggu close selesai
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Maksimum pesan yang ditarik dari inbox ke buffer lokal sekali refill
    pub max_buffered: usize,
    /// Timeout poll run loop selama `close`
    pub poll_interval: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_buffered: DEFAULT_MAX_BUFFERED,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl EndpointConfig {
    pub fn with_max_buffered(mut self, max_buffered: usize) -> Self {
        self.max_buffered = max_buffered.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
