use std::sync::atomic::{AtomicBool, Ordering};

use commlink_endpoint::{Endpoint, Listener};
use tracing::{debug, info};

use crate::cmd::{accept_client, install_ctrlc_handler, EchoArgs, TICK};
use crate::exit::{endpoint_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let listener = Listener::bind(args.port).map_err(|err| endpoint_error("bind failed", err))?;
    info!(addr = %listener.local_addr(), "echo server listening");

    let running = install_ctrlc_handler()?;

    while running.load(Ordering::SeqCst) {
        let Some(endpoint) = accept_client(&listener, None, &running)? else {
            break;
        };
        info!("client connected");

        let echoed = echo_until_disconnect(&endpoint, &running)?;
        info!(echoed, "client disconnected");
    }

    Ok(SUCCESS)
}

/// Send every received packet straight back until the peer goes away.
fn echo_until_disconnect(endpoint: &Endpoint, running: &AtomicBool) -> CliResult<usize> {
    let mut echoed = 0usize;

    while running.load(Ordering::SeqCst) {
        let packets = endpoint.recv_all_timeout(TICK);
        if packets.is_empty() && !endpoint.is_alive() {
            break;
        }

        for packet in packets {
            debug!(
                tid = packet.transaction_id(),
                size = packet.len(),
                "echoing packet"
            );
            endpoint
                .send(packet)
                .map_err(|err| endpoint_error("echo send failed", err))?;
            echoed += 1;
        }
    }

    Ok(echoed)
}
