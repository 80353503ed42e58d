use std::fs;

use commlink_endpoint::{connect_tcp, udp_peer};
use commlink_frame::Packet;
use tracing::info;

use crate::cmd::{parse_duration, parse_target, SendArgs};
use crate::exit::{endpoint_error, frame_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let (addr, port) = parse_target(&args.to)?;
    let payload = resolve_payload(&args)?;
    let packet = Packet::from_slice(&payload).map_err(|err| frame_error("invalid payload", err))?;

    let endpoint = match args.udp {
        Some(local_port) => udp_peer(local_port, &addr, port),
        None => connect_tcp(&addr, port),
    }
    .map_err(|err| endpoint_error("connect failed", err))?;

    for _ in 0..args.repeat {
        endpoint
            .send(packet.clone())
            .map_err(|err| endpoint_error("send failed", err))?;
    }
    endpoint
        .drain(wait_timeout)
        .map_err(|err| endpoint_error("flush failed", err))?;
    info!(count = args.repeat, size = packet.len(), to = %args.to, "packets sent");

    if args.wait {
        let responses = endpoint.recv_all_timeout(wait_timeout);
        if responses.is_empty() {
            return Err(CliError::new(TIMEOUT, "no response before timeout"));
        }
        for response in &responses {
            print_packet(response, &args.to, format);
        }
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
