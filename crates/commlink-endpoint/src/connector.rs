use commlink_transport::{TcpTransport, TransportConfig, UdpPeer};

use crate::config::EndpointConfig;
use crate::endpoint::Endpoint;
use crate::error::Result;

/// Connect to a TCP server and start an endpoint over the stream.
pub fn connect_tcp(addr: &str, port: u16) -> Result<Endpoint> {
    connect_tcp_with_config(
        addr,
        port,
        &TransportConfig::default(),
        EndpointConfig::default(),
    )
}

/// Connect with explicit configuration.
pub fn connect_tcp_with_config(
    addr: &str,
    port: u16,
    transport_config: &TransportConfig,
    endpoint_config: EndpointConfig,
) -> Result<Endpoint> {
    let transport = TcpTransport::connect(addr, port, transport_config)?;
    Endpoint::spawn(transport, endpoint_config)
}

/// Bind a UDP socket on `local_port` talking to `peer_addr:peer_port` and
/// start an endpoint over it.
///
/// A `local_port` of 0 lets the OS pick one; `peer_port` must be non-zero.
pub fn udp_peer(local_port: u16, peer_addr: &str, peer_port: u16) -> Result<Endpoint> {
    udp_peer_with_config(
        local_port,
        peer_addr,
        peer_port,
        &TransportConfig::default(),
        EndpointConfig::default(),
    )
}

/// UDP peer with explicit configuration.
pub fn udp_peer_with_config(
    local_port: u16,
    peer_addr: &str,
    peer_port: u16,
    transport_config: &TransportConfig,
    endpoint_config: EndpointConfig,
) -> Result<Endpoint> {
    let transport = UdpPeer::bind(local_port, peer_addr, peer_port, transport_config)?;
    Endpoint::spawn(transport, endpoint_config)
}
