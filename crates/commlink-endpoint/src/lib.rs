//! Threaded packet endpoint over a commlink transport.
//!
//! An [`Endpoint`] owns one transport and two worker threads. Callers queue
//! packets with [`Endpoint::send`] and collect decoded packets with
//! [`Endpoint::recv_all`]; framing, transaction ids and write retries are
//! handled inside.
//!
//! [`connect_tcp`], [`udp_peer`] and [`Listener`] build endpoints over the
//! socket adapters from `commlink-transport`.

pub mod config;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod listener;

pub use config::EndpointConfig;
pub use connector::{connect_tcp, connect_tcp_with_config, udp_peer, udp_peer_with_config};
pub use endpoint::{Endpoint, EndpointState};
pub use error::{EndpointError, Result};
pub use listener::Listener;
