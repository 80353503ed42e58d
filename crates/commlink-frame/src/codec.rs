use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const START_BYTE: u8 = 0xF0;

/// End-of-frame marker.
pub const END_BYTE: u8 = 0x0F;

/// Transaction id field width (little-endian `u16`).
pub const TID_SIZE: usize = 2;

/// Payload length field width (little-endian `u32`).
pub const LEN_SIZE: usize = 4;

/// Start byte + transaction id + length = 7 bytes.
pub const HEADER_SIZE: usize = 1 + TID_SIZE + LEN_SIZE;

/// End byte.
pub const TRAILER_SIZE: usize = 1;

/// Bytes a frame adds around its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest payload a frame may carry. Keeps UDP frames below typical MTU.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Wire size of a frame carrying `payload_len` bytes.
pub const fn frame_size(payload_len: usize) -> usize {
    FRAME_OVERHEAD + payload_len
}

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────┬──────────┬──────────┬──────────────────┬────────┐
/// │ Start  │ TID      │ Length   │ Payload          │ End    │
/// │ 0xF0   │ (2B LE)  │ (4B LE)  │ (Length bytes)   │ 0x0F   │
/// └────────┴──────────┴──────────┴──────────────────┴────────┘
/// ```
///
/// The payload is not escaped; the decoder consumes exactly `Length` bytes.
pub fn encode_frame(payload: &[u8], tid: u16, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    dst.reserve(frame_size(payload.len()));
    dst.put_u8(START_BYTE);
    dst.put_u16_le(tid);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    dst.put_u8(END_BYTE);
    Ok(())
}

/// Encode a payload into a freshly allocated frame.
pub fn encode(payload: &[u8], tid: u16) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(frame_size(payload.len()));
    encode_frame(payload, tid, &mut buf)?;
    Ok(buf.freeze())
}
