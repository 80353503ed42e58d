use std::net::SocketAddr;
use std::time::Duration;

use commlink_transport::{TcpServer, TransportConfig};
use tracing::info;

use crate::config::EndpointConfig;
use crate::endpoint::Endpoint;
use crate::error::Result;

/// Accepts TCP clients and hands each one back as a running [`Endpoint`].
pub struct Listener {
    server: TcpServer,
    endpoint_config: EndpointConfig,
}

impl Listener {
    /// Listen on `0.0.0.0:port`.
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_with_config(port, &TransportConfig::default(), EndpointConfig::default())
    }

    /// Listen with explicit configuration.
    pub fn bind_with_config(
        port: u16,
        transport_config: &TransportConfig,
        endpoint_config: EndpointConfig,
    ) -> Result<Self> {
        let server = TcpServer::bind(port, transport_config)?;
        Ok(Self {
            server,
            endpoint_config,
        })
    }

    /// Listen on an explicit address, which may use port 0.
    pub fn bind_addr(
        addr: SocketAddr,
        transport_config: &TransportConfig,
        endpoint_config: EndpointConfig,
    ) -> Result<Self> {
        let server = TcpServer::bind_addr(addr, transport_config)?;
        Ok(Self {
            server,
            endpoint_config,
        })
    }

    /// Wait up to `timeout` for a client.
    ///
    /// `Ok(None)` means nobody connected in time.
    pub fn wait_for_client(&self, timeout: Duration) -> Result<Option<Endpoint>> {
        let Some(transport) = self.server.wait_for_client(timeout)? else {
            return Ok(None);
        };
        info!(peer = %transport.peer_addr(), "client connected");
        Endpoint::spawn(transport, self.endpoint_config.clone()).map(Some)
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr())
            .finish()
    }
}
