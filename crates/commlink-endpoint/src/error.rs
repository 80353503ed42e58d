use std::time::Duration;

use crate::endpoint::EndpointState;

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] commlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] commlink_frame::FrameError),

    /// The endpoint has been stopped, or its transmit loop has exited.
    #[error("endpoint stopped")]
    Stopped,

    /// Lifecycle call made in the wrong state.
    #[error("endpoint is {actual}, expected {expected}")]
    InvalidState {
        expected: EndpointState,
        actual: EndpointState,
    },

    /// Worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, EndpointError>;
