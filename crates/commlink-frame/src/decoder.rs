use std::collections::VecDeque;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::codec::{END_BYTE, LEN_SIZE, MAX_PAYLOAD_SIZE, START_BYTE, TID_SIZE};
use crate::packet::Packet;
use crate::queue::SyncQueue;

/// Position of the decoder within the frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Discarding bytes until a start marker.
    SeekStart,
    /// Collecting the 2-byte transaction id.
    ReadTid,
    /// Collecting the 4-byte payload length.
    ReadLen,
    /// Collecting exactly `length` payload bytes.
    ReadPayload,
    /// Expecting the end marker.
    ReadEnd,
}

/// Running counters of what the decoder has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames validated and emitted as packets.
    pub frames_accepted: u64,
    /// Well-formed frames dropped because their id matched the last accepted one.
    pub duplicates_dropped: u64,
    /// Frames dropped because the end marker was wrong.
    pub malformed_dropped: u64,
    /// Frames dropped because the length field exceeded the maximum payload.
    pub oversized_dropped: u64,
    /// Bytes skipped while searching for a start marker.
    pub bytes_discarded: u64,
}

/// Streaming frame decoder.
///
/// Bytes can arrive in arbitrary chunks; completed packets are pushed to an
/// internal [`SyncQueue`] that other threads may drain through
/// [`Decoder::output`] while one thread keeps feeding.
///
/// Any framing error drops the frame in progress and resumes scanning for
/// the next start marker. A well-formed frame whose transaction id equals
/// the most recently accepted one is treated as a retransmission and
/// dropped; only that single id is remembered.
pub struct Decoder {
    state: DecoderState,
    tid_buf: [u8; TID_SIZE],
    len_buf: [u8; LEN_SIZE],
    field_pos: usize,
    tid: u16,
    payload_len: usize,
    payload: BytesMut,
    last_accepted_tid: Option<u16>,
    output: Arc<SyncQueue<Packet>>,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::SeekStart,
            tid_buf: [0; TID_SIZE],
            len_buf: [0; LEN_SIZE],
            field_pos: 0,
            tid: 0,
            payload_len: 0,
            payload: BytesMut::with_capacity(MAX_PAYLOAD_SIZE),
            last_accepted_tid: None,
            output: Arc::new(SyncQueue::new()),
            stats: DecoderStats::default(),
        }
    }

    /// Consume `bytes`, emitting a packet for every frame completed.
    ///
    /// Never blocks.
    pub fn feed(&mut self, bytes: &[u8]) {
        let mut pos = 0;
        while pos < bytes.len() {
            if self.state == DecoderState::ReadPayload {
                let wanted = self.payload_len - self.payload.len();
                let take = wanted.min(bytes.len() - pos);
                self.payload.extend_from_slice(&bytes[pos..pos + take]);
                pos += take;
                if self.payload.len() == self.payload_len {
                    self.state = DecoderState::ReadEnd;
                }
                continue;
            }

            self.step(bytes[pos]);
            pos += 1;
        }
    }

    fn step(&mut self, byte: u8) {
        match self.state {
            DecoderState::SeekStart => {
                if byte == START_BYTE {
                    self.begin_frame();
                } else {
                    self.stats.bytes_discarded += 1;
                }
            }
            DecoderState::ReadTid => {
                self.tid_buf[self.field_pos] = byte;
                self.field_pos += 1;
                if self.field_pos == TID_SIZE {
                    self.tid = u16::from_le_bytes(self.tid_buf);
                    self.field_pos = 0;
                    self.state = DecoderState::ReadLen;
                }
            }
            DecoderState::ReadLen => {
                self.len_buf[self.field_pos] = byte;
                self.field_pos += 1;
                if self.field_pos == LEN_SIZE {
                    self.field_pos = 0;
                    self.on_length(u32::from_le_bytes(self.len_buf));
                }
            }
            DecoderState::ReadPayload => {
                self.payload.extend_from_slice(&[byte]);
                if self.payload.len() == self.payload_len {
                    self.state = DecoderState::ReadEnd;
                }
            }
            DecoderState::ReadEnd => {
                if byte == END_BYTE {
                    self.on_complete();
                } else {
                    self.stats.malformed_dropped += 1;
                    warn!(tid = self.tid, end = byte, "dropping frame with bad end byte");
                }
                self.reset();
            }
        }
    }

    fn begin_frame(&mut self) {
        self.field_pos = 0;
        self.tid = 0;
        self.payload_len = 0;
        self.payload.clear();
        self.state = DecoderState::ReadTid;
    }

    fn on_length(&mut self, len: u32) {
        let len = len as usize;
        if len > MAX_PAYLOAD_SIZE {
            self.stats.oversized_dropped += 1;
            warn!(
                tid = self.tid,
                len,
                max = MAX_PAYLOAD_SIZE,
                "dropping frame with oversized length"
            );
            self.reset();
            return;
        }

        self.payload_len = len;
        self.state = if len == 0 {
            DecoderState::ReadEnd
        } else {
            DecoderState::ReadPayload
        };
    }

    fn on_complete(&mut self) {
        if self.last_accepted_tid == Some(self.tid) {
            self.stats.duplicates_dropped += 1;
            debug!(tid = self.tid, "dropping duplicate frame");
            return;
        }

        let payload = self.payload.split().freeze();
        trace!(tid = self.tid, size = payload.len(), "frame accepted");
        self.output.enqueue(Packet::received(payload, self.tid));
        self.last_accepted_tid = Some(self.tid);
        self.stats.frames_accepted += 1;
    }

    /// Abandon any frame in progress and scan for the next start marker.
    ///
    /// The last accepted transaction id is kept.
    pub fn reset(&mut self) {
        self.field_pos = 0;
        self.payload_len = 0;
        self.payload.clear();
        self.state = DecoderState::SeekStart;
    }

    /// Drain decoded packets.
    ///
    /// With `wait == true`, blocks until at least one packet is available or
    /// the output queue is shut down.
    pub fn dequeue_all(&self, wait: bool) -> VecDeque<Packet> {
        self.output.dequeue_all(wait)
    }

    /// Shared handle to the output queue.
    pub fn output(&self) -> Arc<SyncQueue<Packet>> {
        Arc::clone(&self.output)
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Transaction id of the most recently accepted frame.
    pub fn last_accepted_tid(&self) -> Option<u16> {
        self.last_accepted_tid
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("state", &self.state)
            .field("last_accepted_tid", &self.last_accepted_tid)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode, FRAME_OVERHEAD};

    const HELLO_FRAME: [u8; 13] = [
        0xF0, 0x01, 0x00, 0x05, 0x00, 0x00, 0x00, 0x48, 0x45, 0x4C, 0x4C, 0x4F, 0x0F,
    ];

    fn drain(decoder: &Decoder) -> Vec<Packet> {
        decoder.dequeue_all(false).into_iter().collect()
    }

    #[test]
    fn decodes_single_frame() {
        let mut decoder = Decoder::new();
        decoder.feed(&HELLO_FRAME);

        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"HELLO");
        assert_eq!(packets[0].transaction_id(), 1);
        assert_eq!(decoder.state(), DecoderState::SeekStart);
        assert_eq!(decoder.last_accepted_tid(), Some(1));
    }

    #[test]
    fn frame_split_across_two_feeds() {
        let mut decoder = Decoder::new();
        decoder.feed(&HELLO_FRAME[..7]);
        assert!(drain(&decoder).is_empty());
        assert_eq!(decoder.state(), DecoderState::ReadPayload);

        decoder.feed(&HELLO_FRAME[7..]);
        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"HELLO");
        assert_eq!(packets[0].transaction_id(), 1);
    }

    #[test]
    fn every_split_point_yields_same_packet() {
        let frame = encode(b"split me anywhere", 42).unwrap();
        for cut in 0..=frame.len() {
            let mut decoder = Decoder::new();
            decoder.feed(&frame[..cut]);
            decoder.feed(&frame[cut..]);
            let packets = drain(&decoder);
            assert_eq!(packets.len(), 1, "cut at {cut}");
            assert_eq!(packets[0].payload().as_ref(), b"split me anywhere");
            assert_eq!(packets[0].transaction_id(), 42);
        }
    }

    #[test]
    fn byte_at_a_time_feed() {
        let frame = encode(&[9u8; 300], 1234).unwrap();
        let mut decoder = Decoder::new();
        for byte in frame.iter() {
            decoder.feed(std::slice::from_ref(byte));
        }
        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 300);
        assert_eq!(packets[0].transaction_id(), 1234);
    }

    #[test]
    fn consecutive_duplicate_is_suppressed() {
        let mut decoder = Decoder::new();
        decoder.feed(&HELLO_FRAME);
        assert_eq!(drain(&decoder).len(), 1);

        decoder.feed(&HELLO_FRAME);
        assert!(drain(&decoder).is_empty());
        assert_eq!(decoder.stats().duplicates_dropped, 1);
        assert_eq!(decoder.state(), DecoderState::SeekStart);
    }

    #[test]
    fn repeated_tid_after_other_tid_is_accepted() {
        let mut decoder = Decoder::new();
        decoder.feed(&encode(b"a", 5).unwrap());
        decoder.feed(&encode(b"b", 6).unwrap());
        decoder.feed(&encode(b"c", 5).unwrap());

        let tids: Vec<u16> = drain(&decoder).iter().map(Packet::transaction_id).collect();
        assert_eq!(tids, vec![5, 6, 5]);
    }

    #[test]
    fn garbage_before_frame_is_skipped() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0xAA, 0xBB]);
        decoder.feed(&HELLO_FRAME);

        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"HELLO");
        assert_eq!(decoder.stats().bytes_discarded, 2);
    }

    #[test]
    fn payload_with_marker_bytes_is_transparent() {
        let payload = [0xF0, 0x0F, 0xF0, 0xF0, 0x00, 0x0F, 0x0F, 0xF0];
        let mut decoder = Decoder::new();
        decoder.feed(&encode(&payload, 3).unwrap());

        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), &payload);
        assert_eq!(decoder.stats().malformed_dropped, 0);
    }

    #[test]
    fn oversized_length_is_dropped_and_decoder_recovers() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0xF0, 0x05, 0x00, 0xD0, 0x07, 0x00, 0x00, 0x11, 0x22]);
        assert!(drain(&decoder).is_empty());
        assert_eq!(decoder.stats().oversized_dropped, 1);
        assert_eq!(decoder.state(), DecoderState::SeekStart);

        decoder.feed(&HELLO_FRAME);
        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload().as_ref(), b"HELLO");
    }

    #[test]
    fn length_one_past_max_is_oversized() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0xF0, 0x05, 0x00, 0x01, 0x04, 0x00, 0x00]);
        assert!(drain(&decoder).is_empty());
        assert_eq!(decoder.stats().oversized_dropped, 1);
        assert_eq!(decoder.state(), DecoderState::SeekStart);

        decoder.feed(&HELLO_FRAME);
        assert_eq!(drain(&decoder).len(), 1);
    }

    #[test]
    fn bad_end_byte_drops_frame() {
        let mut bad = HELLO_FRAME;
        bad[12] = 0x00;

        let mut decoder = Decoder::new();
        decoder.feed(&bad);
        assert!(drain(&decoder).is_empty());
        assert_eq!(decoder.stats().malformed_dropped, 1);
        assert_eq!(decoder.last_accepted_tid(), None);

        decoder.feed(&HELLO_FRAME);
        assert_eq!(drain(&decoder).len(), 1);
    }

    #[test]
    fn empty_payload_frame_goes_straight_to_end() {
        let mut decoder = Decoder::new();
        decoder.feed(&[0xF0, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(decoder.state(), DecoderState::ReadEnd);

        decoder.feed(&[0x0F]);
        let packets = drain(&decoder);
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_empty());
        assert_eq!(packets[0].transaction_id(), 9);
    }

    #[test]
    fn many_frames_in_one_feed_keep_order() {
        let mut wire = BytesMut::new();
        for tid in 0..50u16 {
            crate::codec::encode_frame(format!("msg-{tid}").as_bytes(), tid, &mut wire).unwrap();
            wire.put_u8(0x55);
        }

        let mut decoder = Decoder::new();
        decoder.feed(&wire);
        let packets = drain(&decoder);
        assert_eq!(packets.len(), 50);
        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet.transaction_id(), i as u16);
            assert_eq!(packet.payload().as_ref(), format!("msg-{i}").as_bytes());
        }
        assert_eq!(decoder.stats().bytes_discarded, 50);
    }

    #[test]
    fn round_trip_across_sizes() {
        let mut decoder = Decoder::new();
        for (tid, size) in [0usize, 1, 2, 255, 256, 1023, 1024].into_iter().enumerate() {
            let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            decoder.feed(&encode(&payload, tid as u16).unwrap());
            let packets = drain(&decoder);
            assert_eq!(packets.len(), 1);
            assert_eq!(packets[0].payload().as_ref(), payload.as_slice());
            assert_eq!(packets[0].transaction_id(), tid as u16);
        }
    }

    #[test]
    fn output_handle_drains_from_another_thread() {
        let mut decoder = Decoder::new();
        let output = decoder.output();
        let reader = std::thread::spawn(move || output.dequeue_all(true));

        std::thread::sleep(std::time::Duration::from_millis(10));
        decoder.feed(&HELLO_FRAME);

        let packets = reader.join().unwrap();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn reset_abandons_partial_frame() {
        let mut decoder = Decoder::new();
        decoder.feed(&HELLO_FRAME[..FRAME_OVERHEAD]);
        decoder.reset();
        assert_eq!(decoder.state(), DecoderState::SeekStart);

        decoder.feed(&HELLO_FRAME[FRAME_OVERHEAD..]);
        assert!(drain(&decoder).is_empty());
    }
}
