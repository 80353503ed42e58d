//! Two endpoints joined by an in-memory pipe, no sockets involved.
//!
//! Run with:
//!   cargo run --example loopback

use std::time::Duration;

use commlink::endpoint::{Endpoint, EndpointConfig};
use commlink::transport::MemoryTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = MemoryTransport::pair();
    let alice = Endpoint::spawn(left, EndpointConfig::default())?;
    let bob = Endpoint::spawn(right, EndpointConfig::default())?;

    for word in ["one", "two", "three"] {
        alice.send_bytes(word.as_bytes())?;
    }
    alice.drain(Duration::from_secs(1))?;

    let mut received = 0;
    while received < 3 {
        for packet in bob.recv_all_timeout(Duration::from_secs(1)) {
            println!(
                "tid={} payload={}",
                packet.transaction_id(),
                String::from_utf8_lossy(packet.payload())
            );
            received += 1;
        }
    }

    Ok(())
}
