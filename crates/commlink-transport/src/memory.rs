use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    closed: bool,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    ready: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// One end of an in-process duplex byte pipe.
///
/// Behaves like a stream socket: writes on one end become readable on the
/// other, reads wait at most `poll_interval`, and once a side is closed its
/// peer reads [`TransportError::Closed`] after draining what was buffered.
pub struct MemoryTransport {
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
    poll_interval: Duration,
}

impl MemoryTransport {
    /// Create two connected ends with default timing.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_config(&TransportConfig::default())
    }

    /// Create two connected ends using `config.poll_interval` for reads.
    pub fn pair_with_config(config: &TransportConfig) -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());

        let a = Self {
            incoming: Arc::clone(&b_to_a),
            outgoing: Arc::clone(&a_to_b),
            poll_interval: config.poll_interval,
        };
        let b = Self {
            incoming: a_to_b,
            outgoing: b_to_a,
            poll_interval: config.poll_interval,
        };
        (a, b)
    }

    /// Close both directions of this end.
    pub fn close(&self) {
        self.outgoing.close();
        self.incoming.close();
    }

    /// Number of bytes written by the peer and not yet read here.
    pub fn buffered(&self) -> usize {
        self.incoming.lock().bytes.len()
    }
}

impl Transport for MemoryTransport {
    fn is_readable(&self) -> bool {
        let state = self.incoming.lock();
        !(state.closed && state.bytes.is_empty())
    }

    fn is_writable(&self) -> bool {
        !self.outgoing.lock().closed
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.incoming.lock();
        if state.bytes.is_empty() && !state.closed {
            state = self
                .incoming
                .ready
                .wait_timeout_while(state, self.poll_interval, |s| {
                    s.bytes.is_empty() && !s.closed
                })
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        if state.bytes.is_empty() {
            return if state.closed {
                Err(TransportError::Closed)
            } else {
                Ok(0)
            };
        }

        let n = buf.len().min(state.bytes.len());
        for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.outgoing.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.bytes.extend(data);
        drop(state);
        self.outgoing.ready.notify_all();
        Ok(data.len())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("buffered", &self.buffered())
            .finish()
    }
}
