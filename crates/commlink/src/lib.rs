//! Framed packet links over TCP and UDP.
//!
//! commlink moves discrete packets (up to 1024 bytes each) between two
//! peers over a byte transport. Each packet is wrapped in a START/END
//! delimited frame carrying a 16-bit transaction id; the receiver
//! resynchronizes after corruption and drops immediate retransmissions.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte transport capability and TCP/UDP/in-memory adapters
//! - [`frame`]: Packets, frame encoding, the streaming decoder and `SyncQueue`
//! - [`endpoint`]: Threaded send/receive endpoint (behind `endpoint` feature)

/// Re-export transport types.
pub mod transport {
    pub use commlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use commlink_frame::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use commlink_endpoint::*;
}
