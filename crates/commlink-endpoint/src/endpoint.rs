use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use commlink_frame::{encode_frame, Decoder, Packet, SyncQueue, MAX_FRAME_SIZE};
use commlink_transport::Transport;
use tracing::{debug, error, info, trace, warn};

use crate::config::EndpointConfig;
use crate::error::{EndpointError, Result};

/// Lifecycle of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Constructed, threads not yet running.
    Created,
    /// Receive and transmit threads are running.
    Running,
    /// Stop requested, threads being joined.
    Stopping,
    /// Threads joined; the endpoint cannot be restarted.
    Stopped,
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// State shared between the caller and the two worker threads.
struct Shared {
    transport: Arc<dyn Transport>,
    outbound: SyncQueue<Packet>,
    inbound: Arc<SyncQueue<Packet>>,
    stop: AtomicBool,
    pending: AtomicUsize,
    rx_running: AtomicBool,
    tx_running: AtomicBool,
}

/// Bidirectional packet pipe over a [`Transport`].
///
/// Two dedicated threads run per endpoint. The receive thread reads bytes
/// from the transport and feeds them to a [`Decoder`]; the transmit thread
/// drains the outbound queue, stamps each packet with the next transaction
/// id (starting at 0, wrapping at 65536) and writes the encoded frame.
///
/// A fatal transport error ends the loop that saw it. The endpoint stays
/// usable locally afterwards: `send` still queues and `recv_all` still
/// returns whatever was decoded, but nothing more crosses the wire.
///
/// ```no_run
/// use commlink_endpoint::{Endpoint, EndpointConfig};
/// use commlink_transport::MemoryTransport;
///
/// let (near, far) = MemoryTransport::pair();
/// let a = Endpoint::spawn(near, EndpointConfig::default())?;
/// let b = Endpoint::spawn(far, EndpointConfig::default())?;
///
/// a.send_bytes(b"ping")?;
/// let packets = b.recv_all(true);
/// assert_eq!(packets[0].payload().as_ref(), b"ping");
/// # Ok::<(), commlink_endpoint::EndpointError>(())
/// ```
pub struct Endpoint {
    shared: Arc<Shared>,
    config: EndpointConfig,
    decoder: Option<Decoder>,
    state: EndpointState,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
}

impl Endpoint {
    /// Wrap `transport` without starting any threads.
    pub fn new<T>(transport: T, config: EndpointConfig) -> Self
    where
        T: Transport + 'static,
    {
        let decoder = Decoder::new();
        let shared = Arc::new(Shared {
            transport: Arc::new(transport),
            outbound: SyncQueue::new(),
            inbound: decoder.output(),
            stop: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            rx_running: AtomicBool::new(false),
            tx_running: AtomicBool::new(false),
        });

        Self {
            shared,
            config,
            decoder: Some(decoder),
            state: EndpointState::Created,
            rx_thread: None,
            tx_thread: None,
        }
    }

    /// Construct and start in one step.
    pub fn spawn<T>(transport: T, config: EndpointConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let mut endpoint = Self::new(transport, config);
        endpoint.start()?;
        Ok(endpoint)
    }

    /// Spawn the receive and transmit threads.
    pub fn start(&mut self) -> Result<()> {
        if self.state != EndpointState::Created {
            return Err(EndpointError::InvalidState {
                expected: EndpointState::Created,
                actual: self.state,
            });
        }
        let Some(decoder) = self.decoder.take() else {
            return Err(EndpointError::InvalidState {
                expected: EndpointState::Created,
                actual: self.state,
            });
        };

        self.shared.rx_running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let buffer_size = self.config.rx_buffer_size;
        let rx = thread::Builder::new()
            .name("commlink-rx".into())
            .spawn(move || {
                run_rx(&shared, decoder, buffer_size);
                shared.inbound.shutdown();
                shared.rx_running.store(false, Ordering::Release);
            });
        let rx = match rx {
            Ok(handle) => handle,
            Err(source) => {
                self.shared.rx_running.store(false, Ordering::Release);
                self.state = EndpointState::Stopped;
                return Err(EndpointError::Spawn { name: "rx", source });
            }
        };
        self.rx_thread = Some(rx);
        self.state = EndpointState::Running;

        self.shared.tx_running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let tx = thread::Builder::new()
            .name("commlink-tx".into())
            .spawn(move || {
                run_tx(&shared, &config);
                shared.tx_running.store(false, Ordering::Release);
            });
        match tx {
            Ok(handle) => self.tx_thread = Some(handle),
            Err(source) => {
                self.shared.tx_running.store(false, Ordering::Release);
                self.stop();
                return Err(EndpointError::Spawn { name: "tx", source });
            }
        }

        info!(
            transport = self.shared.transport.transport_name(),
            "endpoint started"
        );
        Ok(())
    }

    /// Signal both threads to exit and join them.
    ///
    /// Returns once both loops have observed the stop flag; each loop only
    /// blocks for a bounded interval, so this never hangs. Safe to call more
    /// than once.
    pub fn stop(&mut self) {
        match self.state {
            EndpointState::Stopped | EndpointState::Stopping => return,
            EndpointState::Created => {
                self.shared.stop.store(true, Ordering::Release);
                self.shared.outbound.shutdown();
                self.shared.inbound.shutdown();
                self.state = EndpointState::Stopped;
                return;
            }
            EndpointState::Running => {}
        }

        self.state = EndpointState::Stopping;
        self.shared.stop.store(true, Ordering::Release);
        self.shared.outbound.shutdown();
        self.shared.inbound.shutdown();

        for (name, handle) in [("rx", self.rx_thread.take()), ("tx", self.tx_thread.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!(thread = name, "endpoint thread panicked");
                }
            }
        }

        self.state = EndpointState::Stopped;
        info!(
            transport = self.shared.transport.transport_name(),
            "endpoint stopped"
        );
    }

    /// Queue `packet` for transmission. Never blocks.
    pub fn send(&self, packet: Packet) -> Result<()> {
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(EndpointError::Stopped);
        }
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared.outbound.enqueue(packet);
        Ok(())
    }

    /// Copy `payload` into a new packet and queue it.
    pub fn send_bytes(&self, payload: &[u8]) -> Result<()> {
        self.send(Packet::from_slice(payload)?)
    }

    /// Take every decoded packet.
    ///
    /// With `wait == true`, blocks until at least one packet arrives, the
    /// endpoint is stopped, or the receive loop exits.
    pub fn recv_all(&self, wait: bool) -> VecDeque<Packet> {
        self.shared.inbound.dequeue_all(wait)
    }

    /// Like `recv_all(true)` but gives up after `timeout`.
    pub fn recv_all_timeout(&self, timeout: Duration) -> VecDeque<Packet> {
        self.shared.inbound.dequeue_all_timeout(timeout)
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Whether both worker loops are still running.
    pub fn is_alive(&self) -> bool {
        self.shared.rx_running.load(Ordering::Acquire)
            && self.shared.tx_running.load(Ordering::Acquire)
    }

    /// Packets accepted by `send` that have not yet been written or dropped.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Wait until every queued packet has been handed to the transport.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        if self.state == EndpointState::Created {
            return Err(EndpointError::InvalidState {
                expected: EndpointState::Running,
                actual: self.state,
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.pending() == 0 {
                return Ok(());
            }
            if !self.shared.tx_running.load(Ordering::Acquire) {
                return Err(EndpointError::Stopped);
            }
            if Instant::now() >= deadline {
                return Err(EndpointError::Timeout(timeout));
            }
            thread::sleep(self.config.drain_poll_interval);
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.shared.transport.transport_name()
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("transport", &self.transport_name())
            .field("state", &self.state)
            .field("pending", &self.pending())
            .finish()
    }
}

fn run_rx(shared: &Shared, mut decoder: Decoder, buffer_size: usize) {
    let mut buf = vec![0u8; buffer_size.max(1)];

    while !shared.stop.load(Ordering::Acquire) {
        if !shared.transport.is_readable() {
            info!("receive pipe broken");
            break;
        }

        match shared.transport.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                trace!(bytes = n, "read from transport");
                decoder.feed(&buf[..n]);
            }
            Err(err) => {
                error!(error = %err, "could not read from transport");
                break;
            }
        }
    }

    let stats = decoder.stats();
    info!(
        accepted = stats.frames_accepted,
        duplicates = stats.duplicates_dropped,
        malformed = stats.malformed_dropped,
        oversized = stats.oversized_dropped,
        "receive loop exited"
    );
}

fn run_tx(shared: &Shared, config: &EndpointConfig) {
    let mut next_tid: u16 = 0;
    let mut frame = BytesMut::with_capacity(MAX_FRAME_SIZE);

    'outer: while !shared.stop.load(Ordering::Acquire) {
        if !shared.transport.is_writable() {
            info!("transmit pipe broken");
            break;
        }

        let mut batch = shared.outbound.dequeue_all_timeout(config.tx_wait_timeout);
        if batch.is_empty() {
            continue;
        }
        debug!(count = batch.len(), "packets in transmit queue");

        while let Some(packet) = batch.pop_front() {
            let tid = next_tid;
            next_tid = next_tid.wrapping_add(1);

            frame.clear();
            if let Err(err) = encode_frame(packet.payload(), tid, &mut frame) {
                warn!(tid, error = %err, "could not encode packet");
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                continue;
            }

            let written = write_frame(shared.transport.as_ref(), &frame, config, &shared.stop);
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            match written {
                Ok(true) => trace!(tid, bytes = frame.len(), "frame written"),
                Ok(false) => warn!(
                    tid,
                    attempts = config.tx_retry_count,
                    "transport kept blocking, frame dropped"
                ),
                Err(err) => {
                    error!(tid, error = %err, "could not write to transport");
                    shared.pending.fetch_sub(batch.len(), Ordering::AcqRel);
                    break 'outer;
                }
            }
        }
    }

    info!(next_tid, "transmit loop exited");
}

/// Write all of `frame`, advancing past partial writes.
///
/// Returns `Ok(false)` once the transport has reported "would block"
/// `tx_retry_count` times in a row before any byte of the frame went out.
/// Once any byte of the frame is out it is always finished; only `stop`
/// cuts that short.
fn write_frame(
    transport: &dyn Transport,
    frame: &[u8],
    config: &EndpointConfig,
    stop: &AtomicBool,
) -> commlink_transport::Result<bool> {
    let mut offset = 0;
    let mut attempts = 0;

    while offset < frame.len() {
        let n = transport.write(&frame[offset..])?;
        if n == 0 {
            attempts += 1;
            if offset == 0 && attempts >= config.tx_retry_count {
                return Ok(false);
            }
            if offset > 0 && stop.load(Ordering::Acquire) {
                return Ok(false);
            }
            thread::sleep(config.tx_retry_backoff);
            continue;
        }
        attempts = 0;
        offset += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use commlink_frame::{encode, HEADER_SIZE};
    use commlink_transport::{MemoryTransport, TransportError};

    use super::*;

    /// Transport that records writes and can be scripted to block or fail.
    #[derive(Default)]
    struct ScriptedTransport {
        written: Mutex<Vec<u8>>,
        block_next: AtomicUsize,
        first_write_limit: AtomicUsize,
        max_chunk: Option<usize>,
        fail_writes: AtomicBool,
    }

    impl ScriptedTransport {
        fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn is_readable(&self) -> bool {
            true
        }

        fn is_writable(&self) -> bool {
            true
        }

        fn read(&self, _buf: &mut [u8]) -> commlink_transport::Result<usize> {
            thread::sleep(Duration::from_millis(1));
            Ok(0)
        }

        fn write(&self, data: &[u8]) -> commlink_transport::Result<usize> {
            if self.fail_writes.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            let limit = self.first_write_limit.swap(0, Ordering::AcqRel);
            if limit > 0 {
                let n = limit.min(data.len());
                self.written.lock().unwrap().extend_from_slice(&data[..n]);
                return Ok(n);
            }
            if self
                .block_next
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(0);
            }
            let n = self.max_chunk.map_or(data.len(), |max| max.min(data.len()));
            self.written.lock().unwrap().extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn transport_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn decode_all(bytes: &[u8]) -> Vec<Packet> {
        let mut decoder = Decoder::new();
        decoder.feed(bytes);
        decoder.dequeue_all(false).into_iter().collect()
    }

    fn recv_n(endpoint: &Endpoint, n: usize) -> Vec<Packet> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut packets = Vec::new();
        while packets.len() < n && Instant::now() < deadline {
            packets.extend(endpoint.recv_all_timeout(Duration::from_millis(100)));
        }
        packets
    }

    #[test]
    fn first_frames_carry_tids_zero_then_one() {
        let transport = Arc::new(ScriptedTransport::default());
        let endpoint = Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default())
            .expect("endpoint should start");

        endpoint.send_bytes(b"P1").unwrap();
        endpoint.send_bytes(b"P2").unwrap();
        endpoint.drain(Duration::from_secs(5)).expect("drain");

        let mut expected = encode(b"P1", 0).unwrap().to_vec();
        expected.extend_from_slice(&encode(b"P2", 1).unwrap());
        assert_eq!(transport.written(), expected);
    }

    #[test]
    fn memory_pair_exchanges_packets_both_ways() {
        let (near, far) = MemoryTransport::pair();
        let a = Endpoint::spawn(near, EndpointConfig::default()).unwrap();
        let b = Endpoint::spawn(far, EndpointConfig::default()).unwrap();

        for i in 0..20u8 {
            a.send_bytes(&[i; 16]).unwrap();
        }
        b.send_bytes(b"reply").unwrap();

        let at_b = recv_n(&b, 20);
        assert_eq!(at_b.len(), 20);
        for (i, packet) in at_b.iter().enumerate() {
            assert_eq!(packet.payload().as_ref(), &[i as u8; 16]);
            assert_eq!(packet.transaction_id(), i as u16);
        }

        let at_a = recv_n(&a, 1);
        assert_eq!(at_a.len(), 1);
        assert_eq!(at_a[0].payload().as_ref(), b"reply");
        assert_eq!(at_a[0].transaction_id(), 0);
    }

    #[test]
    fn transaction_ids_wrap_after_u16_max() {
        let transport = Arc::new(ScriptedTransport::default());
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        let total = usize::from(u16::MAX) + 2;
        for _ in 0..total {
            endpoint.send(Packet::new(&b""[..]).unwrap()).unwrap();
        }
        endpoint.drain(Duration::from_secs(30)).expect("drain");

        let packets = decode_all(&transport.written());
        assert_eq!(packets.len(), total);
        assert_eq!(packets[total - 2].transaction_id(), u16::MAX);
        assert_eq!(packets[total - 1].transaction_id(), 0);
    }

    #[test]
    fn would_block_within_retry_budget_still_delivers() {
        let transport = Arc::new(ScriptedTransport {
            block_next: AtomicUsize::new(2),
            ..Default::default()
        });
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        endpoint.send_bytes(b"late").unwrap();
        endpoint.drain(Duration::from_secs(5)).unwrap();

        let packets = decode_all(&transport.written());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"late");
    }

    #[test]
    fn exhausted_retries_drop_frame_and_continue() {
        let transport = Arc::new(ScriptedTransport {
            block_next: AtomicUsize::new(3),
            ..Default::default()
        });
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        endpoint.send_bytes(b"dropped").unwrap();
        endpoint.send_bytes(b"kept").unwrap();
        endpoint.drain(Duration::from_secs(5)).unwrap();

        let packets = decode_all(&transport.written());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"kept");
        assert_eq!(packets[0].transaction_id(), 1);
        assert!(endpoint.is_alive());
    }

    #[test]
    fn blocking_after_partial_write_finishes_the_frame() {
        let transport = Arc::new(ScriptedTransport {
            first_write_limit: AtomicUsize::new(HEADER_SIZE),
            block_next: AtomicUsize::new(3),
            ..Default::default()
        });
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        endpoint.send_bytes(b"started").unwrap();
        endpoint.send_bytes(b"kept").unwrap();
        endpoint.drain(Duration::from_secs(5)).unwrap();

        let mut expected = encode(b"started", 0).unwrap().to_vec();
        expected.extend_from_slice(&encode(b"kept", 1).unwrap());
        assert_eq!(transport.written(), expected);

        let packets = decode_all(&transport.written());
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload().as_ref(), b"started");
        assert_eq!(packets[1].payload().as_ref(), b"kept");
    }

    #[test]
    fn partial_writes_are_resumed() {
        let transport = Arc::new(ScriptedTransport {
            max_chunk: Some(3),
            ..Default::default()
        });
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        let payload: Vec<u8> = (0..200).map(|i| i as u8).collect();
        endpoint.send_bytes(&payload).unwrap();
        endpoint.drain(Duration::from_secs(5)).unwrap();

        assert_eq!(transport.written(), encode(&payload, 0).unwrap().to_vec());
    }

    #[test]
    fn hard_write_error_ends_transmit_loop() {
        let transport = Arc::new(ScriptedTransport {
            fail_writes: AtomicBool::new(true),
            ..Default::default()
        });
        let endpoint =
            Endpoint::spawn(Arc::clone(&transport), EndpointConfig::default()).unwrap();

        endpoint.send_bytes(b"a").unwrap();
        endpoint.send_bytes(b"b").unwrap();

        let err = endpoint.drain(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, EndpointError::Stopped), "got {err:?}");
        assert!(!endpoint.is_alive());
        assert_eq!(endpoint.state(), EndpointState::Running);

        // Queueing still succeeds locally.
        endpoint.send_bytes(b"c").unwrap();
    }

    #[test]
    fn peer_close_ends_receive_loop_and_wakes_waiters() {
        let (near, far) = MemoryTransport::pair();
        let endpoint = Endpoint::spawn(near, EndpointConfig::default()).unwrap();

        far.close();
        let packets = endpoint.recv_all(true);
        assert!(packets.is_empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        while endpoint.is_alive() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!endpoint.is_alive());
    }

    #[test]
    fn stop_is_prompt_and_idempotent() {
        let (near, _far) = MemoryTransport::pair();
        let mut endpoint = Endpoint::spawn(near, EndpointConfig::default()).unwrap();
        assert_eq!(endpoint.state(), EndpointState::Running);
        assert!(endpoint.is_alive());

        let started = Instant::now();
        endpoint.stop();
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(endpoint.state(), EndpointState::Stopped);
        assert!(!endpoint.is_alive());

        endpoint.stop();
        assert_eq!(endpoint.state(), EndpointState::Stopped);
    }

    #[test]
    fn send_after_stop_is_rejected() {
        let (near, _far) = MemoryTransport::pair();
        let mut endpoint = Endpoint::spawn(near, EndpointConfig::default()).unwrap();
        endpoint.stop();

        let err = endpoint.send_bytes(b"late").unwrap_err();
        assert!(matches!(err, EndpointError::Stopped));
    }

    #[test]
    fn start_twice_is_invalid() {
        let (near, _far) = MemoryTransport::pair();
        let mut endpoint = Endpoint::new(near, EndpointConfig::default());
        assert_eq!(endpoint.state(), EndpointState::Created);
        endpoint.start().unwrap();

        let err = endpoint.start().unwrap_err();
        assert!(matches!(
            err,
            EndpointError::InvalidState {
                expected: EndpointState::Created,
                actual: EndpointState::Running,
            }
        ));
    }

    #[test]
    fn packets_sent_before_start_go_out_after_start() {
        let transport = Arc::new(ScriptedTransport::default());
        let mut endpoint = Endpoint::new(Arc::clone(&transport), EndpointConfig::default());
        endpoint.send_bytes(b"early").unwrap();
        assert_eq!(endpoint.pending(), 1);
        assert!(endpoint.drain(Duration::from_millis(10)).is_err());

        endpoint.start().unwrap();
        endpoint.drain(Duration::from_secs(5)).unwrap();
        assert_eq!(endpoint.pending(), 0);

        let packets = decode_all(&transport.written());
        assert_eq!(packets[0].payload().as_ref(), b"early");
    }

    #[test]
    fn recv_timeout_returns_empty_batch() {
        let (near, _far) = MemoryTransport::pair();
        let endpoint = Endpoint::spawn(near, EndpointConfig::default()).unwrap();
        assert!(endpoint
            .recv_all_timeout(Duration::from_millis(20))
            .is_empty());
        assert!(endpoint.recv_all(false).is_empty());
        assert_eq!(endpoint.transport_name(), "memory");
    }

    #[test]
    fn oversized_payload_is_rejected_at_send() {
        let (near, _far) = MemoryTransport::pair();
        let endpoint = Endpoint::spawn(near, EndpointConfig::default()).unwrap();
        let err = endpoint.send_bytes(&[0u8; 1025]).unwrap_err();
        assert!(matches!(err, EndpointError::Frame(_)));
        assert_eq!(endpoint.pending(), 0);
    }
}
