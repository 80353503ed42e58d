use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use commlink_endpoint::{Endpoint, Listener};

use crate::exit::{endpoint_error, CliError, CliResult, INTERNAL, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// How often long-running commands re-check Ctrl-C and peer liveness.
pub(crate) const TICK: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept TCP clients and echo every packet back.
    Echo(EchoArgs),
    /// Send packets to a TCP server or UDP peer.
    Send(SendArgs),
    /// Receive packets and print them.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// TCP port to listen on.
    #[arg(long)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination as ADDR:PORT.
    #[arg(long, value_name = "ADDR:PORT")]
    pub to: String,
    /// Send over UDP from this local port instead of connecting over TCP.
    #[arg(long, value_name = "LOCAL_PORT")]
    pub udp: Option<u16>,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Send the payload this many times.
    #[arg(long, default_value = "1")]
    pub repeat: usize,
    /// Wait for response packets and print them.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to flush and to wait for a response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// TCP port to accept one client on.
    #[arg(long, required_unless_present = "udp", conflicts_with = "udp")]
    pub port: Option<u16>,
    /// Listen as a UDP peer on this local port.
    #[arg(long, value_name = "LOCAL_PORT", requires = "peer")]
    pub udp: Option<u16>,
    /// UDP peer as ADDR:PORT.
    #[arg(long, value_name = "ADDR:PORT")]
    pub peer: Option<String>,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long to wait for a TCP client (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub accept_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Split `ADDR:PORT`.
pub(crate) fn parse_target(input: &str) -> CliResult<(String, u16)> {
    let (addr, port) = input
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("expected ADDR:PORT, got '{input}'")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| CliError::new(USAGE, format!("invalid port in '{input}'")))?;
    Ok((addr.to_string(), port))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Flag cleared when the user presses Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Wait for a TCP client until one arrives, `timeout` passes, or Ctrl-C.
///
/// `Ok(None)` means the wait was interrupted.
pub(crate) fn accept_client(
    listener: &Listener,
    timeout: Option<Duration>,
    running: &AtomicBool,
) -> CliResult<Option<Endpoint>> {
    let deadline = timeout.map(|t| Instant::now() + t);
    while running.load(Ordering::SeqCst) {
        let slice = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(CliError::new(TIMEOUT, "no client connected before timeout"));
                }
                remaining.min(TICK)
            }
            None => TICK,
        };

        if let Some(endpoint) = listener
            .wait_for_client(slice)
            .map_err(|err| endpoint_error("accept failed", err))?
        {
            return Ok(Some(endpoint));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_target_splits_on_last_colon() {
        assert_eq!(
            parse_target("127.0.0.1:9000").unwrap(),
            ("127.0.0.1".to_string(), 9000)
        );
        assert_eq!(parse_target("nope").unwrap_err().code, USAGE);
        assert_eq!(parse_target("127.0.0.1:99999").unwrap_err().code, USAGE);
    }
}
