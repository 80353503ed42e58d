use std::time::Duration;

/// Timing knobs shared by the socket adapters.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on how long a single `read` waits for data. Default: 50 ms.
    pub poll_interval: Duration,
    /// Timeout for establishing a TCP connection. Default: 1 s.
    pub connect_timeout: Duration,
    /// Pause between non-blocking `accept` attempts. Default: 100 ms.
    pub accept_retry_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(1),
            accept_retry_interval: Duration::from_millis(100),
        }
    }
}
