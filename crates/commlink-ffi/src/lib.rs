//! commlink-ffi: C-ABI bridge over a single process-wide commlink endpoint.
//!
//! The `comm_*` functions keep one TCP server and one endpoint in global
//! slots so C callers never handle Rust objects. Failures return `false`
//! or 0 and leave a message readable through [`comm_last_error`].

mod args;
mod bridge;
mod error;
mod types;

use std::panic::AssertUnwindSafe;

pub use bridge::{
    comm_deinit, comm_endpoint_ready, comm_p2p_endpoint_recv_packet,
    comm_p2p_endpoint_recv_packets, comm_p2p_endpoint_send, comm_tcp_client_init,
    comm_tcp_server_init, comm_tcp_server_wait_for_client, comm_udp_peer_init,
};
pub use types::{
    CommStatus, COMM_ERR_ALREADY_INITIALIZED, COMM_ERR_FRAME, COMM_ERR_INTERNAL,
    COMM_ERR_INVALID_ARGUMENT, COMM_ERR_NOT_INITIALIZED, COMM_ERR_STOPPED, COMM_ERR_TIMEOUT,
    COMM_ERR_TRANSPORT, COMM_MAX_PAYLOAD_SIZE, COMM_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Message describing the most recent failure on the calling thread.
///
/// The pointer stays valid until the next `comm_*` call on the same thread.
#[no_mangle]
pub extern "C" fn comm_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}
