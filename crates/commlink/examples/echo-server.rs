//! Minimal echo server: accepts one TCP client and echoes packets back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send --to 127.0.0.1:7447 \
//!     --json '{"hello":"world"}' --wait --wait-timeout 3s

use std::time::Duration;

use commlink::endpoint::Listener;

const PORT: u16 = 7447;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind(PORT)?;
    eprintln!("Listening on {}", listener.local_addr());

    let endpoint = loop {
        if let Some(endpoint) = listener.wait_for_client(Duration::from_secs(1))? {
            break endpoint;
        }
    };
    eprintln!("Client connected");

    loop {
        let packets = endpoint.recv_all_timeout(Duration::from_millis(500));
        if packets.is_empty() && !endpoint.is_alive() {
            eprintln!("Client disconnected");
            break;
        }
        for packet in packets {
            eprintln!(
                "Received {} bytes (tid {})",
                packet.len(),
                packet.transaction_id()
            );
            endpoint.send(packet)?;
        }
    }

    Ok(())
}
