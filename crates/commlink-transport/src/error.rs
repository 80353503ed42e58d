use std::net::SocketAddr;

/// Errors that can occur in transport operations.
///
/// Any error returned from [`Transport::read`](crate::Transport::read) or
/// [`Transport::write`](crate::Transport::write) is fatal for that transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The textual address is empty, malformed, or not usable as a peer.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// A required port was zero.
    #[error("invalid port: {0}")]
    InvalidPort(&'static str),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Failed to switch a socket into the required mode.
    #[error("failed to configure socket: {0}")]
    Configure(std::io::Error),

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote side closed the connection.
    #[error("transport closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
