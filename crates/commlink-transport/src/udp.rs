use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::addr::parse_peer_ipv4;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::readiness::wait_readable;
use crate::traits::Transport;

/// Connectionless peer: one local UDP socket talking to one remote address.
///
/// Each frame travels as one datagram. Datagrams from any other source are
/// ignored.
pub struct UdpPeer {
    socket: UdpSocket,
    peer_addr: SocketAddr,
    config: TransportConfig,
    failed: AtomicBool,
}

impl UdpPeer {
    /// Bind `0.0.0.0:local_port` and target `peer_addr:peer_port`.
    pub fn bind(
        local_port: u16,
        peer_addr: &str,
        peer_port: u16,
        config: &TransportConfig,
    ) -> Result<Self> {
        if local_port == 0 && peer_port == 0 {
            return Err(TransportError::InvalidPort("udp ports must be positive"));
        }
        if peer_port == 0 {
            return Err(TransportError::InvalidPort("peer port must be positive"));
        }
        let ip = parse_peer_ipv4(peer_addr)?;

        Self::bind_addr(
            SocketAddr::from(([0, 0, 0, 0], local_port)),
            SocketAddr::from((ip, peer_port)),
            config,
        )
    }

    /// Bind an explicit local address and target an explicit peer.
    pub fn bind_addr(
        local: SocketAddr,
        peer_addr: SocketAddr,
        config: &TransportConfig,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;

        info!(local = %socket.local_addr()?, peer = %peer_addr, "udp peer bound");

        Ok(Self {
            socket,
            peer_addr,
            config: config.clone(),
            failed: AtomicBool::new(false),
        })
    }

    /// Address datagrams are sent to and accepted from.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address of the socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Into::into)
    }

    fn fail(&self, err: TransportError) -> TransportError {
        if !self.failed.swap(true, Ordering::SeqCst) {
            error!(peer = %self.peer_addr, error = %err, "udp transport failed");
        }
        err
    }
}

impl Transport for UdpPeer {
    fn is_readable(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }

    fn is_writable(&self) -> bool {
        !self.failed.load(Ordering::SeqCst)
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match wait_readable(&self.socket, self.config.poll_interval) {
            Ok(false) => return Ok(0),
            Ok(true) => {}
            Err(err) => return Err(self.fail(err.into())),
        }

        match self.socket.recv_from(buf) {
            Ok((0, _)) => {
                warn!("zero-length datagram");
                Ok(0)
            }
            Ok((_, source)) if source != self.peer_addr => {
                debug!(%source, expected = %self.peer_addr, "dropping datagram from unexpected source");
                Ok(0)
            }
            Ok((n, _)) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        match self.socket.send_to(data, self.peer_addr) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn transport_name(&self) -> &'static str {
        "udp"
    }
}

impl std::fmt::Debug for UdpPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpPeer")
            .field("peer_addr", &self.peer_addr)
            .field("failed", &self.failed.load(Ordering::SeqCst))
            .finish()
    }
}
