use std::sync::atomic::Ordering;

use commlink_endpoint::{udp_peer, Listener};
use tracing::info;

use crate::cmd::{accept_client, install_ctrlc_handler, parse_duration, parse_target, ListenArgs, TICK};
use crate::exit::{endpoint_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = install_ctrlc_handler()?;

    let (endpoint, peer) = match args.udp {
        Some(local_port) => {
            let target = args
                .peer
                .as_deref()
                .ok_or_else(|| CliError::new(USAGE, "--udp requires --peer"))?;
            let (addr, port) = parse_target(target)?;
            let endpoint = udp_peer(local_port, &addr, port)
                .map_err(|err| endpoint_error("udp bind failed", err))?;
            info!(local_port, peer = target, "udp peer ready");
            (endpoint, target.to_string())
        }
        None => {
            let port = args
                .port
                .ok_or_else(|| CliError::new(USAGE, "either --port or --udp is required"))?;
            let timeout = parse_duration(&args.accept_timeout)?;
            let listener =
                Listener::bind(port).map_err(|err| endpoint_error("bind failed", err))?;
            info!(addr = %listener.local_addr(), "listening");

            match accept_client(&listener, Some(timeout), &running)? {
                Some(endpoint) => (endpoint, format!("tcp:{port}")),
                None => return Ok(SUCCESS),
            }
        }
    };

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let packets = endpoint.recv_all_timeout(TICK);
        if packets.is_empty() && !endpoint.is_alive() {
            info!("peer disconnected");
            break;
        }

        for packet in &packets {
            print_packet(packet, &peer, format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}
