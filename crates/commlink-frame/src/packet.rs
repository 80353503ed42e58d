use bytes::Bytes;

use crate::clock::monotonic_us;
use crate::codec::MAX_PAYLOAD_SIZE;
use crate::error::{FrameError, Result};

/// An immutable application packet.
///
/// Outbound packets carry transaction id 0 until the transmit loop assigns
/// one on the wire; inbound packets carry the id found in their frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Bytes,
    transaction_id: u16,
    timestamp_us: u64,
}

impl Packet {
    /// Create an outbound packet, taking ownership of `payload`.
    ///
    /// Fails with [`FrameError::PayloadTooLarge`] above [`MAX_PAYLOAD_SIZE`].
    pub fn new(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        check_payload_size(payload.len())?;
        Ok(Self {
            payload,
            transaction_id: 0,
            timestamp_us: monotonic_us(),
        })
    }

    /// Create an outbound packet by copying a caller-owned buffer.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        check_payload_size(payload.len())?;
        Self::new(Bytes::copy_from_slice(payload))
    }

    /// Packet produced by the decoder for a validated frame.
    pub(crate) fn received(payload: Bytes, transaction_id: u16) -> Self {
        Self {
            payload,
            transaction_id,
            timestamp_us: monotonic_us(),
        }
    }

    /// Read-only view of the payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Transaction id carried on the wire.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Monotonic creation time, see [`monotonic_us`].
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Consume the packet and return its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

fn check_payload_size(size: usize) -> Result<()> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}
