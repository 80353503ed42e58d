use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::addr::parse_peer_ipv4;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::readiness::wait_readable;
use crate::traits::Transport;

/// A connected, non-blocking TCP stream.
///
/// Produced either by [`TcpTransport::connect`] (client role) or by
/// [`TcpServer::wait_for_client`] (server role).
pub struct TcpTransport {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: TransportConfig,
    failed: AtomicBool,
}

impl TcpTransport {
    /// Connect to `addr:port` as a client.
    ///
    /// `addr` must be a dotted-quad IPv4 address other than `0.0.0.0` or
    /// `255.255.255.255`, and `port` must be non-zero.
    pub fn connect(addr: &str, port: u16, config: &TransportConfig) -> Result<Self> {
        if port == 0 {
            return Err(TransportError::InvalidPort("server port must be positive"));
        }
        let ip = parse_peer_ipv4(addr)?;
        Self::connect_addr(SocketAddr::from((ip, port)), config)
    }

    /// Connect to an already-resolved socket address.
    pub fn connect_addr(addr: SocketAddr, config: &TransportConfig) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
            .map_err(|source| TransportError::Connect { addr, source })?;
        info!(%addr, "connected to tcp server");
        Self::from_stream(stream, addr, config.clone())
    }

    pub(crate) fn from_stream(
        stream: TcpStream,
        peer_addr: SocketAddr,
        config: TransportConfig,
    ) -> Result<Self> {
        stream
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;
        stream.set_nodelay(true).map_err(TransportError::Configure)?;
        Ok(Self {
            stream,
            peer_addr,
            config,
            failed: AtomicBool::new(false),
        })
    }

    /// Address of the remote side.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local address of the stream.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Into::into)
    }

    fn fail(&self, err: TransportError) -> TransportError {
        if !self.failed.swap(true, Ordering::SeqCst) {
            error!(peer = %self.peer_addr, error = %err, "tcp transport failed");
        }
        err
    }
}

impl Transport for TcpTransport {
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

        match wait_readable(&self.stream, self.config.poll_interval) {
            Ok(false) => return Ok(0),
            Ok(true) => {}
            Err(err) => return Err(self.fail(err.into())),
        }

        match (&self.stream).read(buf) {
            Ok(0) => Err(self.fail(TransportError::Closed)),
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        match (&self.stream).write(data) {
            Ok(0) => Err(self.fail(TransportError::Closed)),
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer_addr", &self.peer_addr)
            .field("failed", &self.failed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Passive TCP socket that hands out one [`TcpTransport`] per accepted client.
pub struct TcpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: TransportConfig,
}

impl TcpServer {
    /// Listen on `0.0.0.0:port`. The port must be non-zero.
    pub fn bind(port: u16, config: &TransportConfig) -> Result<Self> {
        if port == 0 {
            return Err(TransportError::InvalidPort("local port must be positive"));
        }
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)), config)
    }

    /// Listen on an explicit address. Port 0 picks an ephemeral port.
    pub fn bind_addr(addr: SocketAddr, config: &TransportConfig) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "tcp server listening");

        Ok(Self {
            listener,
            local_addr,
            config: config.clone(),
        })
    }

    /// Wait up to `timeout` for a client to connect.
    ///
    /// Returns `Ok(None)` when no connection request arrived in time.
    pub fn wait_for_client(&self, timeout: Duration) -> Result<Option<TcpTransport>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted tcp client");
                    return TcpTransport::from_stream(stream, peer, self.config.clone()).map(Some);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!(local_addr = %self.local_addr, "no pending connection");
                        return Ok(None);
                    }
                    std::thread::sleep(self.config.accept_retry_interval.min(deadline - now));
                }
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    /// The address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}
