use std::time::Duration;

use commlink_frame::MAX_FRAME_SIZE;

/// Tuning for the receive and transmit loops of an [`Endpoint`](crate::Endpoint).
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Bounded wait on the outbound queue before the Tx loop re-checks the stop flag.
    pub tx_wait_timeout: Duration,
    /// Write attempts per frame while the transport reports "would block".
    pub tx_retry_count: u32,
    /// Sleep between would-block write attempts.
    pub tx_retry_backoff: Duration,
    /// Size of the per-endpoint receive buffer.
    pub rx_buffer_size: usize,
    /// How often [`Endpoint::drain`](crate::Endpoint::drain) re-checks the pending count.
    pub drain_poll_interval: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            tx_wait_timeout: Duration::from_secs(1),
            tx_retry_count: 3,
            tx_retry_backoff: Duration::from_micros(100),
            rx_buffer_size: MAX_FRAME_SIZE,
            drain_poll_interval: Duration::from_millis(5),
        }
    }
}
