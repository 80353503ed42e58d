//! START/END delimited packet framing.
//!
//! Every packet travels on the wire as:
//! - a `0xF0` start marker
//! - a 2-byte little-endian transaction id
//! - a 4-byte little-endian payload length (at most 1024)
//! - the payload bytes, unescaped
//! - a `0x0F` end marker
//!
//! [`Decoder`] consumes bytes as they arrive, resynchronizes after garbage or
//! broken frames, and drops immediate retransmissions of the last accepted
//! transaction id. Decoded packets land in a [`SyncQueue`].

mod clock;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod queue;

pub use clock::monotonic_us;
pub use codec::{
    encode, encode_frame, frame_size, END_BYTE, FRAME_OVERHEAD, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE, START_BYTE,
};
pub use decoder::{Decoder, DecoderState, DecoderStats};
pub use error::{FrameError, Result};
pub use packet::Packet;
pub use queue::SyncQueue;
