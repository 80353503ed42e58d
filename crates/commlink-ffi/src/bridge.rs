//! Process-wide endpoint slots behind the `comm_*` C functions.
//!
//! One TCP server, one endpoint and a queue of received-but-undelivered
//! packets. The endpoint slot is always locked last: after the server slot
//! when accepting, after the pending queue when receiving.

use std::collections::VecDeque;
use std::os::raw::c_char;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use commlink_endpoint::{connect_tcp, udp_peer, Endpoint, Listener};
use commlink_frame::Packet;
use tracing::{debug, error, info};

use crate::args;
use crate::error;
use crate::types::CommStatus;

static SERVER: Mutex<Option<Listener>> = Mutex::new(None);
static ENDPOINT: Mutex<Option<Endpoint>> = Mutex::new(None);
static RX_PENDING: Mutex<VecDeque<Packet>> = Mutex::new(VecDeque::new());

fn lock<T>(slot: &'static Mutex<T>) -> MutexGuard<'static, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn already_initialized(what: &str) -> bool {
    error!("{what} was previously initialized");
    let _ = error::set_status(
        CommStatus::AlreadyInitialized,
        format!("{what} was previously initialized"),
    );
    false
}

fn install_endpoint(
    slot: &mut Option<Endpoint>,
    result: commlink_endpoint::Result<Endpoint>,
) -> bool {
    match result {
        Ok(endpoint) => {
            *slot = Some(endpoint);
            true
        }
        Err(err) => {
            error!(error = %err, "could not initialize endpoint");
            let _ = error::map_endpoint_error(&err);
            false
        }
    }
}

/// Pull everything the endpoint has decoded into the pending queue.
fn refill(pending: &mut VecDeque<Packet>) {
    if let Some(endpoint) = lock(&ENDPOINT).as_ref() {
        pending.extend(endpoint.recv_all(false));
    }
}

/// Connect to a TCP server and install the resulting endpoint.
///
/// # Safety
/// `server_addr` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn comm_tcp_client_init(server_addr: *const c_char, server_port: u16) -> bool {
    crate::ffi_boundary(false, || {
        error::clear_error_state();

        let addr = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(server_addr, "server_addr") } {
                Some(v) => v,
                None => return false,
            }
        };

        let mut slot = lock(&ENDPOINT);
        if slot.is_some() {
            return already_initialized("endpoint");
        }
        install_endpoint(&mut slot, connect_tcp(addr, server_port))
    })
}

/// Start listening on `0.0.0.0:port`. Clients are taken with
/// `comm_tcp_server_wait_for_client`.
#[no_mangle]
pub extern "C" fn comm_tcp_server_init(port: u16) -> bool {
    crate::ffi_boundary(false, || {
        error::clear_error_state();

        let mut server = lock(&SERVER);
        if server.is_some() {
            return already_initialized("TCP server");
        }
        match Listener::bind(port) {
            Ok(listener) => {
                info!(addr = %listener.local_addr(), "TCP server listening");
                *server = Some(listener);
                true
            }
            Err(err) => {
                error!(error = %err, "could not start TCP server");
                let _ = error::map_endpoint_error(&err);
                false
            }
        }
    })
}

/// Bind a UDP peer and install the resulting endpoint.
///
/// # Safety
/// `remote_addr` must be a non-null pointer to a valid UTF-8, NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn comm_udp_peer_init(
    local_port: u16,
    remote_addr: *const c_char,
    remote_port: u16,
) -> bool {
    crate::ffi_boundary(false, || {
        error::clear_error_state();

        let addr = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::required_str_arg(remote_addr, "remote_addr") } {
                Some(v) => v,
                None => return false,
            }
        };

        let mut slot = lock(&ENDPOINT);
        if slot.is_some() {
            return already_initialized("endpoint");
        }
        install_endpoint(&mut slot, udp_peer(local_port, addr, remote_port))
    })
}

/// Stop the endpoint, close the server and discard undelivered packets.
#[no_mangle]
pub extern "C" fn comm_deinit() {
    crate::ffi_boundary((), || {
        let server = lock(&SERVER).take();
        let endpoint = lock(&ENDPOINT).take();
        lock(&RX_PENDING).clear();
        drop(endpoint);
        drop(server);
        debug!("bridge state released");
    });
}

/// Wait up to `timeout_ms` for a client on the server started by
/// `comm_tcp_server_init` and install it as the endpoint.
///
/// `error_code`, when non-null, receives a [`CommStatus`] value:
/// `Ok` when a client was installed, `Timeout` when nobody connected.
///
/// # Safety
/// `error_code` must be null or a valid writable pointer.
#[no_mangle]
pub unsafe extern "C" fn comm_tcp_server_wait_for_client(
    error_code: *mut i32,
    timeout_ms: u32,
) -> bool {
    crate::ffi_boundary(false, || {
        error::clear_error_state();

        let status = wait_for_client(Duration::from_millis(u64::from(timeout_ms)));
        if !error_code.is_null() {
            // SAFETY: Non-null pointer validity is guaranteed by the caller.
            unsafe { *error_code = status as i32 };
        }
        status == CommStatus::Ok
    })
}

fn wait_for_client(timeout: Duration) -> CommStatus {
    let server = lock(&SERVER);
    let Some(listener) = server.as_ref() else {
        error!("TCP server has not been initialized");
        return error::set_status(
            CommStatus::NotInitialized,
            "TCP server has not been initialized",
        );
    };

    let mut endpoint = lock(&ENDPOINT);
    if endpoint.is_some() {
        let _ = already_initialized("endpoint");
        return CommStatus::AlreadyInitialized;
    }

    match listener.wait_for_client(timeout) {
        Ok(Some(accepted)) => {
            *endpoint = Some(accepted);
            CommStatus::Ok
        }
        Ok(None) => {
            info!("no pending connection");
            error::set_status(CommStatus::Timeout, "no client connected before timeout")
        }
        Err(err) => {
            error!(error = %err, "could not accept client");
            error::map_endpoint_error(&err)
        }
    }
}

/// Whether an endpoint is installed.
#[no_mangle]
pub extern "C" fn comm_endpoint_ready() -> bool {
    crate::ffi_boundary(false, || lock(&ENDPOINT).is_some())
}

/// Queue `buffer_size` bytes as one packet.
///
/// # Safety
/// If `buffer_size > 0`, `buffer` must be non-null and readable for that many bytes.
#[no_mangle]
pub unsafe extern "C" fn comm_p2p_endpoint_send(buffer: *const u8, buffer_size: usize) -> bool {
    crate::ffi_boundary(false, || {
        error::clear_error_state();

        let payload = {
            // SAFETY: We validate pointer and length in helper.
            match unsafe { args::bytes_arg(buffer, buffer_size, "buffer") } {
                Some(v) => v,
                None => return false,
            }
        };

        let endpoint = lock(&ENDPOINT);
        let Some(endpoint) = endpoint.as_ref() else {
            error!("endpoint has not been initialized");
            let _ = error::set_status(
                CommStatus::NotInitialized,
                "endpoint has not been initialized",
            );
            return false;
        };

        match endpoint.send_bytes(payload) {
            Ok(()) => true,
            Err(err) => {
                let _ = error::map_endpoint_error(&err);
                false
            }
        }
    })
}

/// Copy the next received packet into `buffer`.
///
/// Returns the payload size, or 0 when nothing is available. If the next
/// packet is larger than `buffer_size` it stays queued and 0 is returned.
///
/// # Safety
/// If `buffer_size > 0`, `buffer` must be non-null and writable for that many
/// bytes. `timestamp_us` must be null or a valid writable pointer.
#[no_mangle]
pub unsafe extern "C" fn comm_p2p_endpoint_recv_packet(
    buffer: *mut u8,
    buffer_size: usize,
    timestamp_us: *mut u64,
) -> usize {
    crate::ffi_boundary(0, || {
        error::clear_error_state();

        let out = {
            // SAFETY: We validate pointer and length in helper.
            match unsafe { args::out_slice_arg(buffer, buffer_size, "buffer") } {
                Some(v) => v,
                None => return 0,
            }
        };

        let mut pending = lock(&RX_PENDING);
        if pending.is_empty() {
            refill(&mut pending);
        }

        let Some(next) = pending.front() else {
            return 0;
        };
        let size = next.len();
        if size > out.len() {
            error!(buffer_size = out.len(), expected = size, "receive buffer too small");
            let _ = error::set_invalid_argument(format!(
                "buffer size ({}) is too small (expected: {size})",
                out.len()
            ));
            return 0;
        }

        out[..size].copy_from_slice(next.payload());
        if !timestamp_us.is_null() {
            // SAFETY: Non-null pointer validity is guaranteed by the caller.
            unsafe { *timestamp_us = next.timestamp_us() };
        }
        pending.pop_front();
        size
    })
}

/// Copy as many whole packets as fit into `buffer`, back to back.
///
/// Stops at `max_packets` packets or at the first packet that would not fit.
/// For each copied packet `i`, `packet_sizes[i]` and `timestamps_us[i]` are
/// filled in. Returns the number of bytes used in `buffer`.
///
/// # Safety
/// `buffer` must be writable for `buffer_size` bytes; `packet_sizes` and
/// `timestamps_us` must each be writable for `max_packets` elements.
#[no_mangle]
pub unsafe extern "C" fn comm_p2p_endpoint_recv_packets(
    buffer: *mut u8,
    buffer_size: usize,
    packet_sizes: *mut usize,
    timestamps_us: *mut u64,
    max_packets: usize,
) -> usize {
    crate::ffi_boundary(0, || {
        error::clear_error_state();
        if buffer_size == 0 || max_packets == 0 {
            return 0;
        }

        // SAFETY: We validate pointers and lengths in the helpers.
        let (out, sizes, timestamps) = unsafe {
            match (
                args::out_slice_arg(buffer, buffer_size, "buffer"),
                args::out_slice_arg(packet_sizes, max_packets, "packet_sizes"),
                args::out_slice_arg(timestamps_us, max_packets, "timestamps_us"),
            ) {
                (Some(out), Some(sizes), Some(timestamps)) => (out, sizes, timestamps),
                _ => return 0,
            }
        };

        let mut pending = lock(&RX_PENDING);
        refill(&mut pending);
        if !pending.is_empty() {
            debug!(count = pending.len(), "packets in receive queue");
        }

        pack_packets(&mut pending, out, sizes, timestamps)
    })
}

fn pack_packets(
    pending: &mut VecDeque<Packet>,
    out: &mut [u8],
    sizes: &mut [usize],
    timestamps: &mut [u64],
) -> usize {
    let mut used = 0;
    let mut count = 0;

    while count < sizes.len() {
        let Some(next) = pending.front() else {
            break;
        };
        let size = next.len();
        if used + size > out.len() {
            break;
        }

        out[used..used + size].copy_from_slice(next.payload());
        sizes[count] = size;
        timestamps[count] = next.timestamp_us();
        used += size;
        count += 1;
        pending.pop_front();
    }

    used
}
