//! Byte transport capability for commlink endpoints.
//!
//! An endpoint only needs four things from the layer below it: liveness
//! checks for each direction, a bounded non-blocking read, and a
//! non-blocking write. [`Transport`] captures exactly that. Adapters:
//! - [`TcpTransport`] / [`TcpServer`] for stream sockets (client and server roles)
//! - [`UdpPeer`] for one-to-one datagram links
//! - [`MemoryTransport`] for in-process loopback
//!
//! Socket creation, validation and non-blocking configuration live here so
//! the endpoint and codec stay platform-independent.

pub mod addr;
pub mod config;
pub mod error;
pub mod memory;
mod readiness;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use addr::parse_peer_ipv4;
pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use tcp::{TcpServer, TcpTransport};
pub use traits::Transport;
pub use udp::UdpPeer;
